use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{ApiClient, MultipartBody, RequestBody, RequestConfig},
    error::ApiError,
    normalize,
    optimistic::PendingMutation,
    pagination::{LoadOptions, PageCursor, PageSummary, Paginator},
    posts::{CreatePost, FeedFilter, Post, UpdatePost},
    reactions::{ReactionKind, ReactionRequest, ReactionResponse},
    response::ApiResponse,
    status::MutationStatus,
};

const POSTS_PATH: &str = "/posts/";

fn post_path(id: Uuid) -> String {
    format!("/posts/{}/", id)
}

/// The post feed: paginated posts plus every mutation a user can make on
/// them. Clones share state.
#[derive(Clone)]
pub struct PostFeed {
    client: ApiClient,
    pages: Paginator<Post>,
    filter: Arc<Mutex<FeedFilter>>,
    status: MutationStatus,
}

impl PostFeed {
    pub fn new(client: ApiClient, page_size: u32) -> Self {
        Self {
            pages: Paginator::new(client.clone(), POSTS_PATH, page_size),
            client,
            filter: Arc::new(Mutex::new(FeedFilter::default())),
            status: MutationStatus::default(),
        }
    }

    pub fn posts(&self) -> Vec<Post> {
        self.pages.items()
    }

    pub fn post(&self, id: Uuid) -> Option<Post> {
        self.pages.get(id)
    }

    pub fn cursor(&self) -> PageCursor {
        self.pages.cursor()
    }

    pub fn has_more(&self) -> bool {
        self.pages.has_next()
    }

    pub fn filter(&self) -> FeedFilter {
        self.filter.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.pages.is_loading() || self.status.is_loading()
    }

    /// Last mutation error, else last load error.
    pub fn error(&self) -> Option<String> {
        self.status.error().or_else(|| self.pages.error())
    }

    /// Reloads page 1 for `filter`, replacing the list. The unfiltered home
    /// feed comes back shuffled. The filter is only adopted once its first
    /// page lands.
    pub async fn refresh(&self, filter: FeedFilter) -> ApiResponse<PageSummary> {
        let mut options = LoadOptions::first_page(self.pages.cursor().page_size);
        if filter.is_top_level() {
            options = options.shuffled();
        }

        let response = self.pages.load(filter.to_params(), options).await;
        if response.success {
            *self.filter.lock() = filter;
        }
        response
    }

    pub async fn load_more(&self) -> ApiResponse<PageSummary> {
        self.pages.load_more().await
    }

    /// Fetches one post and keeps it in local state so it can be reacted to.
    pub async fn fetch_post(&self, id: Uuid) -> ApiResponse<Post> {
        self.status.start();
        let response = self
            .client
            .get::<Value>(&post_path(id), vec![])
            .await
            .and_then(normalize::parse_post);

        if let Some(post) = &response.data {
            self.upsert(post.clone());
        }
        self.status.finish(response)
    }

    pub async fn create_post(&self, input: CreatePost) -> ApiResponse<Post> {
        if let Err(e) = input.validate() {
            return self.status.fail(ApiResponse::failure(e.into()));
        }
        if input.content.trim().is_empty() && input.image.is_none() {
            return self.status.fail(ApiResponse::failure(ApiError::Validation(
                "A post needs text or an image".to_string(),
            )));
        }

        let body = match &input.image {
            Some(image) => RequestBody::Multipart(
                MultipartBody::new()
                    .text("content", input.content.clone())
                    .text("visibility", input.visibility.as_str())
                    .file("image", image.clone()),
            ),
            None => match RequestBody::json(&input) {
                Ok(body) => body,
                Err(err) => return self.status.fail(ApiResponse::failure(err)),
            },
        };

        self.status.start();
        let response = self
            .client
            .request::<Value>(Method::POST, POSTS_PATH, Some(body), RequestConfig::default())
            .await
            .and_then(normalize::parse_post);

        if let Some(post) = &response.data {
            info!("post {} created", post.id);
            self.pages.update(|posts| posts.insert(0, post.clone()));
        }
        self.status.finish(response)
    }

    pub async fn update_post(&self, id: Uuid, input: UpdatePost) -> ApiResponse<Post> {
        if let Err(e) = input.validate() {
            return self.status.fail(ApiResponse::failure(e.into()));
        }

        self.status.start();
        let response = self
            .client
            .patch::<Value, _>(&post_path(id), &input)
            .await
            .and_then(normalize::parse_post);

        if let Some(post) = &response.data {
            self.upsert(post.clone());
        }
        self.status.finish(response)
    }

    pub async fn delete_post(&self, id: Uuid) -> ApiResponse<()> {
        self.status.start();
        let response = self.client.delete::<Value>(&post_path(id)).await.map(|_| ());

        if response.success {
            info!("post {} deleted", id);
            self.pages.update(|posts| posts.retain(|post| post.id != id));
        }
        self.status.finish(response)
    }

    /// Reacts to a loaded post. The tally and the user's reaction change
    /// immediately; the server's verdict then overwrites them, or the
    /// previous state is restored if the request fails.
    pub async fn react(&self, post_id: Uuid, kind: ReactionKind) -> ApiResponse<ReactionResponse> {
        let pending = self.pages.update_item(post_id, |post| {
            PendingMutation::begin(&mut post.reactions, |reactions| {
                reactions.select(kind);
            })
        });
        let Some(pending) = pending else {
            return self.status.fail(ApiResponse::failure(ApiError::NotFound(format!(
                "Post {} is not loaded",
                post_id
            ))));
        };

        self.status.start();
        let response: ApiResponse<ReactionResponse> = self
            .client
            .post(
                &format!("/posts/{}/react/", post_id),
                &ReactionRequest {
                    reaction_type: kind,
                },
            )
            .await;

        let settled = match response.data.as_ref().filter(|_| response.success) {
            Some(server) => self.pages.update_item(post_id, |post| {
                pending.commit(&mut post.reactions, |reactions| reactions.reconcile(server))
            }),
            None => {
                warn!(
                    "reaction on post {} failed, restoring previous state: {}",
                    post_id,
                    response.error_message().unwrap_or_default()
                );
                self.pages
                    .update_item(post_id, |post| pending.rollback(&mut post.reactions))
            }
        };
        if settled.is_none() {
            debug!("post {} left the feed before its reaction settled", post_id);
        }

        self.status.finish(response)
    }

    /// Shifts a post's comment counter, never below zero.
    pub fn adjust_comment_count(&self, post_id: Uuid, delta: i64) {
        self.pages.update_item(post_id, |post| {
            post.comments_count = if delta < 0 {
                post.comments_count.saturating_sub(delta.unsigned_abs())
            } else {
                post.comments_count + delta as u64
            };
        });
    }

    fn upsert(&self, post: Post) {
        self.pages.update(|posts| match posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) => *existing = post,
            None => posts.insert(0, post),
        });
    }
}
