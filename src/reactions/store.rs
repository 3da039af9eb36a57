use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::ApiClient,
    auth::UserProfile,
    pagination::{Identified, LoadOptions, PageSummary, Paginator},
    reactions::ReactionKind,
    response::ApiResponse,
};

/// One user's reaction on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactor {
    pub user: UserProfile,
    pub reaction_type: ReactionKind,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Identified for Reactor {
    fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Who reacted to a post, optionally narrowed to one kind.
#[derive(Clone)]
pub struct ReactorList {
    post_id: Uuid,
    pages: Paginator<Reactor>,
}

impl ReactorList {
    pub fn new(client: ApiClient, post_id: Uuid, page_size: u32) -> Self {
        Self {
            post_id,
            pages: Paginator::new(client, format!("/posts/{}/reactions/", post_id), page_size),
        }
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    pub fn reactors(&self) -> Vec<Reactor> {
        self.pages.items()
    }

    pub fn has_more(&self) -> bool {
        self.pages.has_next()
    }

    pub fn error(&self) -> Option<String> {
        self.pages.error()
    }

    pub async fn load(&self, kind: Option<ReactionKind>) -> ApiResponse<PageSummary> {
        let params = kind
            .map(|kind| vec![("type".to_string(), kind.as_str().to_string())])
            .unwrap_or_default();
        let options = LoadOptions::first_page(self.pages.cursor().page_size);
        self.pages.load(params, options).await
    }

    pub async fn load_more(&self) -> ApiResponse<PageSummary> {
        self.pages.load_more().await
    }
}
