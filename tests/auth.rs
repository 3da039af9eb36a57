mod common;

use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use blogverse_client::{
    api::FileUpload,
    auth::{SignIn, SignUp, UpdateProfile},
    ApiClient, AuthStore, FileSessionStore, Session,
};
use serde_json::json;
use uuid::Uuid;

fn sign_in(email: &str) -> SignIn {
    SignIn {
        email: email.to_string(),
        password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn test_sign_in_persists_tokens_and_profile() {
    let user_id = Uuid::new_v4();
    let router = Router::new().route(
        "/auth/sign-in/",
        post(move |headers: HeaderMap| async move {
            assert!(headers.get("authorization").is_none());
            Json(json!({
                "success": true,
                "message": "Signed in",
                "data": {
                    "access": "access-token",
                    "refresh": "refresh-token",
                    "user": { "id": user_id, "username": "alice", "email": "alice@example.com" }
                }
            }))
        }),
    );
    let base = common::serve(router).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let session = Session::new(Box::new(FileSessionStore::new(&path)));
    let client = ApiClient::new(&common::settings(&base), Arc::new(session)).unwrap();
    let auth = AuthStore::new(client);

    let user = auth
        .sign_in(sign_in("alice@example.com"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(user.id, user_id);
    assert!(auth.is_authenticated());
    assert_eq!(auth.current_user().map(|u| u.username), Some("alice".to_string()));

    // A fresh session over the same file sees the tokens.
    let reopened = Session::new(Box::new(FileSessionStore::new(&path)));
    let tokens = reopened.tokens().unwrap();
    assert_eq!(tokens.access, "access-token");
    assert_eq!(tokens.refresh.as_deref(), Some("refresh-token"));

    auth.sign_out();
    assert!(!auth.is_authenticated());
    assert!(auth.current_user().is_none());
    assert!(Session::new(Box::new(FileSessionStore::new(&path)))
        .tokens()
        .is_none());
}

#[tokio::test]
async fn test_legacy_token_fetches_profile() {
    let user_id = Uuid::new_v4();
    let router = Router::new()
        .route(
            "/auth/sign-up/",
            post(|| async { Json(json!({ "token": "legacy-token" })) }),
        )
        .route(
            "/auth/me/",
            get(move |headers: HeaderMap| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer legacy-token")
                );
                Json(json!({ "id": user_id, "username": "bob" }))
            }),
        );
    let base = common::serve(router).await;
    let auth = AuthStore::new(common::client(&base));

    let user = auth
        .sign_up(SignUp {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: "correct horse".into(),
        })
        .await
        .into_result()
        .unwrap();

    assert_eq!(user.id, user_id);
    assert_eq!(auth.current_user().map(|u| u.id), Some(user_id));
}

#[tokio::test]
async fn test_invalid_credentials_never_reach_the_server() {
    let router = Router::new().route(
        "/auth/sign-in/",
        post(|| async { (StatusCode::IM_A_TEAPOT, Json(json!({}))) }),
    );
    let base = common::serve(router).await;
    let auth = AuthStore::new(common::client(&base));

    let response = auth.sign_in(sign_in("not-an-email")).await;
    assert!(!response.success);
    assert_eq!(response.status, None);
    assert!(auth.error().unwrap().contains("Invalid email format"));
}

#[tokio::test]
async fn test_rejected_sign_in_surfaces_detail() {
    let router = Router::new().route(
        "/auth/sign-in/",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Invalid email or password" })),
            )
        }),
    );
    let base = common::serve(router).await;
    let auth = AuthStore::new(common::client(&base));

    let response = auth.sign_in(sign_in("alice@example.com")).await;
    assert_eq!(response.status, Some(401));
    assert_eq!(
        response.error_message().as_deref(),
        Some("Invalid email or password")
    );
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn test_avatar_update_goes_up_as_multipart() {
    let user_id = Uuid::new_v4();
    let router = Router::new().route(
        "/auth/me/",
        patch(move |headers: HeaderMap| async move {
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            assert!(content_type.starts_with("multipart/form-data"));
            Json(json!({ "id": user_id, "username": "alice", "avatar": "new.png" }))
        }),
    );
    let base = common::serve(router).await;
    let auth = AuthStore::new(common::client(&base));

    let update = UpdateProfile {
        bio: Some("hello".into()),
        avatar: Some(FileUpload::new("me.png", "image/png", vec![0, 1])),
        ..UpdateProfile::default()
    };
    let user = auth.update_profile(update).await.into_result().unwrap();

    assert_eq!(user.image.as_deref(), Some("new.png"));
    assert_eq!(auth.current_user().unwrap().image.as_deref(), Some("new.png"));
}
