use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::pagination::Identified;

pub mod store;

/// Most ids the bulk status check accepts in one call.
pub const MAX_BULK_CHECK: usize = 100;

/// State of a follow edge. Private accounts approve followers out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    #[serde(alias = "accepted")]
    Approved,
}

impl FollowStatus {
    /// What a fresh follow turns into when the server doesn't say.
    pub fn for_account(is_private: bool) -> Self {
        if is_private {
            FollowStatus::Pending
        } else {
            FollowStatus::Approved
        }
    }
}

/// A user in followers/following lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUser {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, alias = "avatar", alias = "profile_picture")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub followed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Identified for FollowUser {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Response for follow/unfollow actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowActionResponse {
    pub following: bool,
    #[serde(default)]
    pub status: Option<FollowStatus>,
    #[serde(default)]
    pub followers_count: Option<u64>,
}

/// An incoming follow request awaiting approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: Uuid,
    #[serde(alias = "follower", alias = "user")]
    pub requester: FollowUser,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Identified for FollowRequest {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Request payload for bulk follow status check
#[derive(Debug, Serialize, Validate)]
pub struct BulkFollowCheck {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Between 1 and 100 user ids can be checked at once"
    ))]
    pub user_ids: Vec<Uuid>,
}

/// Servers report follow state either as a flag or as a status string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireFollowState {
    Flag(bool),
    Status(FollowStatus),
}

impl WireFollowState {
    pub(crate) fn into_status(self) -> Option<FollowStatus> {
        match self {
            WireFollowState::Flag(true) => Some(FollowStatus::Approved),
            WireFollowState::Flag(false) => None,
            WireFollowState::Status(status) => Some(status),
        }
    }
}
