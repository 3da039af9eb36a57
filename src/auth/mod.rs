use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::FileUpload;
use crate::pagination::Identified;

pub mod store;

/// A user as returned by the profile and auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, alias = "avatar", alias = "profile_picture")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub is_following: bool, // Whether the signed-in user follows this user
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Identified for UserProfile {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
impl UserProfile {
    pub(crate) fn named(username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: None,
            bio: None,
            image: None,
            is_private: false,
            followers_count: 0,
            following_count: 0,
            is_following: false,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct SignIn {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct SignUp {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3 and 50 characters"
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Tokens handed out on sign-in / sign-up. Older deployments send a single
/// `token` instead of an access/refresh pair.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "token")]
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3 and 50 characters"
    ))]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip)]
    pub avatar: Option<FileUpload>,
}
