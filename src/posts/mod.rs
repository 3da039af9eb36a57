use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::FileUpload;
use crate::pagination::Identified;
use crate::reactions::ReactionState;

pub mod store;

/// Author info embedded in posts and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(alias = "name")]
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, alias = "avatar", alias = "profile_picture")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Followers,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Followers => "followers",
            Visibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "crate::normalize::WirePost")]
pub struct Post {
    pub id: Uuid,
    pub author: Author,
    pub content: String,
    pub image: Option<String>,
    pub reactions: ReactionState,
    pub comments_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub visibility: Visibility,
}

impl Identified for Post {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct CreatePost {
    #[validate(length(max = 5000, message = "Post must be at most 5000 characters"))]
    pub content: String,
    pub visibility: Visibility,
    #[serde(skip)]
    pub image: Option<FileUpload>,
}

impl CreatePost {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct UpdatePost {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Post must be between 1 and 5000 characters"
    ))]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// Query parameters for the post feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub author: Option<Uuid>,
    pub visibility: Option<Visibility>,
    pub following_only: bool,
    pub search: Option<String>,
}

impl FeedFilter {
    /// The unfiltered home feed.
    pub fn is_top_level(&self) -> bool {
        *self == FeedFilter::default()
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(author) = self.author {
            params.push(("author".to_string(), author.to_string()));
        }
        if let Some(visibility) = self.visibility {
            params.push(("visibility".to_string(), visibility.as_str().to_string()));
        }
        if self.following_only {
            params.push(("following".to_string(), "true".to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search".to_string(), search.to_string()));
        }
        params
    }
}
