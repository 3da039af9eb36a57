use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{ApiClient, MultipartBody, RequestBody, RequestConfig},
    auth::{AuthResponse, SignIn, SignUp, UpdateProfile, UserProfile},
    error::ApiError,
    response::ApiResponse,
    session::SessionTokens,
    status::MutationStatus,
};

const ME_PATH: &str = "/auth/me/";

/// Sign-in state and profile management. Tokens and the signed-in user's
/// profile live in the client's session.
#[derive(Clone)]
pub struct AuthStore {
    client: ApiClient,
    status: MutationStatus,
}

impl AuthStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            status: MutationStatus::default(),
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.client.session().current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.session().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.status.error()
    }

    pub async fn sign_in(&self, input: SignIn) -> ApiResponse<UserProfile> {
        self.authenticate("/auth/sign-in/", input).await
    }

    pub async fn sign_up(&self, input: SignUp) -> ApiResponse<UserProfile> {
        self.authenticate("/auth/sign-up/", input).await
    }

    /// Fetches the signed-in user and caches the profile in the session.
    pub async fn me(&self) -> ApiResponse<UserProfile> {
        self.status.start();
        let response: ApiResponse<UserProfile> = self.client.get(ME_PATH, vec![]).await;
        if let Some(user) = &response.data {
            self.client.session().set_current_user(Some(user.clone()));
        }
        self.status.finish(response)
    }

    pub fn sign_out(&self) {
        info!("signing out");
        self.client.session().clear();
    }

    pub async fn profile(&self, user_id: Uuid) -> ApiResponse<UserProfile> {
        self.status.start();
        let response = self
            .client
            .get(&format!("/users/{}/profile/", user_id), vec![])
            .await;
        self.status.finish(response)
    }

    /// Updates the signed-in user's profile. An avatar goes up as multipart.
    pub async fn update_profile(&self, input: UpdateProfile) -> ApiResponse<UserProfile> {
        if let Err(e) = input.validate() {
            return self.status.fail(ApiResponse::failure(e.into()));
        }

        let body = match &input.avatar {
            Some(avatar) => {
                let mut form = MultipartBody::new().file("avatar", avatar.clone());
                if let Some(username) = &input.username {
                    form = form.text("username", username.clone());
                }
                if let Some(bio) = &input.bio {
                    form = form.text("bio", bio.clone());
                }
                if let Some(is_private) = input.is_private {
                    form = form.text("is_private", is_private.to_string());
                }
                RequestBody::Multipart(form)
            }
            None => match RequestBody::json(&input) {
                Ok(body) => body,
                Err(err) => return self.status.fail(ApiResponse::failure(err)),
            },
        };

        self.status.start();
        let response: ApiResponse<UserProfile> = self
            .client
            .request(Method::PATCH, ME_PATH, Some(body), RequestConfig::default())
            .await;
        if let Some(user) = &response.data {
            self.client.session().set_current_user(Some(user.clone()));
        }
        self.status.finish(response)
    }

    async fn authenticate<B>(&self, path: &str, input: B) -> ApiResponse<UserProfile>
    where
        B: Serialize + Validate,
    {
        if let Err(e) = input.validate() {
            return self.status.fail(ApiResponse::failure(e.into()));
        }
        let body = match RequestBody::json(&input) {
            Ok(body) => body,
            Err(err) => return self.status.fail(ApiResponse::failure(err)),
        };

        self.status.start();
        let response: ApiResponse<AuthResponse> = self
            .client
            .request(
                Method::POST,
                path,
                Some(body),
                RequestConfig::default().without_auth(),
            )
            .await;

        let auth = match response.into_result() {
            Ok(auth) => auth,
            Err(err) => return self.status.finish(ApiResponse::failure(err)),
        };

        let session = self.client.session();
        session.set_tokens(SessionTokens::new(auth.access, auth.refresh));

        // Some deployments return only tokens; ask for the profile then.
        let user = match auth.user {
            Some(user) => Ok(user),
            None => self
                .client
                .get::<Value>(ME_PATH, vec![])
                .await
                .into_result()
                .and_then(|value| serde_json::from_value(value).map_err(ApiError::from)),
        };

        match user {
            Ok(user) => {
                info!("signed in as {}", user.username);
                session.set_current_user(Some(user.clone()));
                self.status.finish(ApiResponse::success(user))
            }
            Err(err) => {
                session.clear();
                self.status.finish(ApiResponse::failure(err))
            }
        }
    }
}
