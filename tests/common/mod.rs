#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use blogverse_client::{ApiClient, Session, Settings};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn settings(base_url: &str) -> Settings {
    let mut settings = Settings::with_base_url(base_url);
    settings.retry_backoff = Duration::from_millis(5);
    settings.request_timeout = Duration::from_secs(5);
    settings
}

pub fn client(base_url: &str) -> ApiClient {
    ApiClient::new(&settings(base_url), Arc::new(Session::in_memory())).unwrap()
}

pub fn post_json(id: Uuid) -> Value {
    json!({
        "id": id,
        "author": { "id": Uuid::new_v4(), "username": "writer" },
        "content": format!("post {}", id),
        "reaction_counts": { "like": 3, "love": 1 },
        "user_reaction": "love",
        "comments_count": 0,
        "created_at": "2024-05-01T10:00:00Z",
        "visibility": "public"
    })
}

pub fn comment_json(id: Uuid, post_id: Uuid, author: Value, text: &str) -> Value {
    json!({
        "id": id,
        "post": post_id,
        "author": author,
        "text": text,
        "created_at": "2024-05-01T10:00:00Z"
    })
}

pub fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}
