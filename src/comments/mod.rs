use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::pagination::Identified;
use crate::posts::Author;

pub mod store;

/// A comment or a reply. Replies nest one level deep and keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "crate::normalize::WireComment")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Option<Uuid>,
    /// Set on replies.
    pub parent_id: Option<Uuid>,
    pub author: Author,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub replies_count: u64,
    pub replies: Vec<Comment>,
}

impl Identified for Comment {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Request payload for creating a comment
#[derive(Debug, Serialize, Validate)]
pub struct CreateComment {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Comment must be between 1 and 10000 characters"
    ))]
    pub content: String,
    /// Parent comment when this is a reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

/// Request payload for updating a comment
#[derive(Debug, Serialize, Validate)]
pub struct UpdateComment {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Comment must be between 1 and 10000 characters"
    ))]
    pub content: String,
}
