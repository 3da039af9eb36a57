use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::ApiClient,
    comments::{Comment, CreateComment, UpdateComment},
    error::ApiError,
    normalize,
    pagination::{LoadOptions, Page, PageSummary, Paginator},
    posts::store::PostFeed,
    response::ApiResponse,
    status::MutationStatus,
};

fn comment_path(id: Uuid) -> String {
    format!("/comments/{}/", id)
}

/// Comments of one post. Mutations are applied once the server accepts
/// them, so there is nothing to roll back.
#[derive(Clone)]
pub struct CommentThread {
    client: ApiClient,
    post_id: Uuid,
    pages: Paginator<Comment>,
    comments_count: Arc<Mutex<u64>>,
    feed: Option<PostFeed>,
    status: MutationStatus,
}

impl CommentThread {
    pub fn new(client: ApiClient, post_id: Uuid, comments_count: u64, page_size: u32) -> Self {
        Self {
            pages: Paginator::new(
                client.clone(),
                format!("/posts/{}/comments/", post_id),
                page_size,
            ),
            client,
            post_id,
            comments_count: Arc::new(Mutex::new(comments_count)),
            feed: None,
            status: MutationStatus::default(),
        }
    }

    /// Keeps the post's counter in `feed` in step with this thread.
    pub fn with_feed(mut self, feed: PostFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.pages.items()
    }

    pub fn comment(&self, id: Uuid) -> Option<Comment> {
        self.pages.get(id)
    }

    pub fn comments_count(&self) -> u64 {
        *self.comments_count.lock()
    }

    pub fn has_more(&self) -> bool {
        self.pages.has_next()
    }

    pub fn is_loading(&self) -> bool {
        self.pages.is_loading() || self.status.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.status.error().or_else(|| self.pages.error())
    }

    pub async fn load(&self) -> ApiResponse<PageSummary> {
        let cursor = self.pages.cursor();
        let response = self
            .pages
            .load(vec![], LoadOptions::first_page(cursor.page_size))
            .await;
        // Bare arrays carry no count; keep the one the post reported.
        if let Some(count) = response.data.as_ref().and_then(|summary| summary.count) {
            *self.comments_count.lock() = count;
        }
        response
    }

    pub async fn load_more(&self) -> ApiResponse<PageSummary> {
        self.pages.load_more().await
    }

    /// Posts a top-level comment and puts it first.
    pub async fn add_comment(&self, content: impl Into<String>) -> ApiResponse<Comment> {
        let input = CreateComment {
            content: content.into(),
            parent_id: None,
        };
        let response = self.create(input).await;

        if let Some(comment) = &response.data {
            info!("comment {} added to post {}", comment.id, self.post_id);
            self.pages.update(|comments| comments.insert(0, comment.clone()));
            self.shift_count(1);
        }
        self.status.finish(response)
    }

    /// Posts a reply under `parent_id` and appends it to the parent's replies.
    pub async fn add_reply(
        &self,
        parent_id: Uuid,
        content: impl Into<String>,
    ) -> ApiResponse<Comment> {
        if self.pages.get(parent_id).is_none() {
            return self.status.fail(ApiResponse::failure(ApiError::NotFound(format!(
                "Comment {} is not loaded",
                parent_id
            ))));
        }

        let input = CreateComment {
            content: content.into(),
            parent_id: Some(parent_id),
        };
        let response = self.create(input).await;

        if let Some(reply) = &response.data {
            let mut reply = reply.clone();
            reply.parent_id = Some(parent_id);
            self.pages.update_item(parent_id, |parent| {
                parent.replies.push(reply);
                parent.replies_count += 1;
            });
        }
        self.status.finish(response)
    }

    pub async fn update_comment(
        &self,
        id: Uuid,
        content: impl Into<String>,
    ) -> ApiResponse<Comment> {
        let input = UpdateComment {
            content: content.into(),
        };
        if let Err(e) = input.validate() {
            return self.status.fail(ApiResponse::failure(e.into()));
        }

        self.status.start();
        let viewer = self.client.session().current_user();
        let response = self
            .client
            .put::<Value, _>(&comment_path(id), &input)
            .await
            .and_then(|value| normalize::parse_comment(value, viewer.as_ref()));

        if let Some(updated) = &response.data {
            self.replace(updated.clone());
        }
        self.status.finish(response)
    }

    /// Deletes a comment or a reply. A loaded reply lowers its parent's
    /// reply count; anything else lowers the post's counter, loaded or not.
    pub async fn delete_comment(&self, id: Uuid) -> ApiResponse<()> {
        self.status.start();
        let response = self
            .client
            .delete::<Value>(&comment_path(id))
            .await
            .map(|_| ());

        if response.success {
            let was_reply = self.pages.update(|comments| {
                comments.retain(|c| c.id != id);
                for parent in comments.iter_mut() {
                    let before = parent.replies.len();
                    parent.replies.retain(|r| r.id != id);
                    if parent.replies.len() != before {
                        parent.replies_count = parent.replies_count.saturating_sub(1);
                        return true;
                    }
                }
                false
            });

            if was_reply {
                debug!("reply {} removed", id);
            } else {
                self.shift_count(-1);
            }
        }
        self.status.finish(response)
    }

    /// Fetches the replies of a loaded comment and replaces its reply list.
    pub async fn load_replies(&self, parent_id: Uuid) -> ApiResponse<Vec<Comment>> {
        self.status.start();
        let response = self
            .client
            .get::<Value>(&format!("/comments/{}/replies/", parent_id), vec![])
            .await
            .and_then(|value| Page::<Comment>::from_value(value).map(|page| page.items));

        if let Some(replies) = &response.data {
            self.pages.update_item(parent_id, |parent| {
                parent.replies = replies.clone();
                parent.replies_count = parent.replies_count.max(replies.len() as u64);
            });
        }
        self.status.finish(response)
    }

    async fn create(&self, input: CreateComment) -> ApiResponse<Comment> {
        // The caller settles the status with finish().
        self.status.start();
        if let Err(e) = input.validate() {
            return ApiResponse::failure(e.into());
        }

        let viewer = self.client.session().current_user();
        let post_id = self.post_id;
        self.client
            .post::<Value, _>(&format!("/posts/{}/comments/", post_id), &input)
            .await
            .and_then(|value| normalize::parse_comment(value, viewer.as_ref()))
            .map(|mut comment| {
                comment.post_id.get_or_insert(post_id);
                comment
            })
    }

    fn replace(&self, updated: Comment) {
        self.pages.update(|comments| {
            for comment in comments.iter_mut() {
                if comment.id == updated.id {
                    let replies = std::mem::take(&mut comment.replies);
                    *comment = updated;
                    if comment.replies.is_empty() {
                        comment.replies = replies;
                    }
                    return;
                }
                if let Some(reply) = comment.replies.iter_mut().find(|r| r.id == updated.id) {
                    *reply = updated;
                    return;
                }
            }
        });
    }

    fn shift_count(&self, delta: i64) {
        {
            let mut count = self.comments_count.lock();
            *count = if delta < 0 {
                count.saturating_sub(delta.unsigned_abs())
            } else {
                *count + delta as u64
            };
        }
        if let Some(feed) = &self.feed {
            feed.adjust_comment_count(self.post_id, delta);
        }
    }
}
