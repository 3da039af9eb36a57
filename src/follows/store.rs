use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::ApiClient,
    error::ApiError,
    follows::{
        BulkFollowCheck, FollowActionResponse, FollowRequest, FollowStatus, FollowUser,
        WireFollowState, MAX_BULK_CHECK,
    },
    pagination::{LoadOptions, Page, PageSummary, Paginator},
    response::ApiResponse,
    status::MutationStatus,
};

fn follow_path(user_id: Uuid) -> String {
    format!("/users/{}/follow/", user_id)
}

/// Follow graph around one user: who they follow, who follows them, the
/// signed-in user's follow state towards others, and pending requests.
#[derive(Clone)]
pub struct Connections {
    client: ApiClient,
    user_id: Uuid,
    followers: Paginator<FollowUser>,
    following: Paginator<FollowUser>,
    statuses: Arc<Mutex<HashMap<Uuid, FollowStatus>>>,
    suggestions: Arc<Mutex<Vec<FollowUser>>>,
    requests: Arc<Mutex<Vec<FollowRequest>>>,
    status: MutationStatus,
}

impl Connections {
    pub fn new(client: ApiClient, user_id: Uuid, page_size: u32) -> Self {
        Self {
            followers: Paginator::new(
                client.clone(),
                format!("/users/{}/followers/", user_id),
                page_size,
            ),
            following: Paginator::new(
                client.clone(),
                format!("/users/{}/following/", user_id),
                page_size,
            ),
            client,
            user_id,
            statuses: Arc::new(Mutex::new(HashMap::new())),
            suggestions: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            status: MutationStatus::default(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn followers(&self) -> Vec<FollowUser> {
        self.followers.items()
    }

    pub fn following(&self) -> Vec<FollowUser> {
        self.following.items()
    }

    /// The signed-in user's follow state towards `user_id`, if known.
    pub fn status_of(&self, user_id: Uuid) -> Option<FollowStatus> {
        self.statuses.lock().get(&user_id).copied()
    }

    pub fn suggestions(&self) -> Vec<FollowUser> {
        self.suggestions.lock().clone()
    }

    pub fn requests(&self) -> Vec<FollowRequest> {
        self.requests.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading() || self.followers.is_loading() || self.following.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.status
            .error()
            .or_else(|| self.followers.error())
            .or_else(|| self.following.error())
    }

    pub async fn load_followers(&self) -> ApiResponse<PageSummary> {
        let options = LoadOptions::first_page(self.followers.cursor().page_size);
        self.followers.load(vec![], options).await
    }

    pub async fn load_more_followers(&self) -> ApiResponse<PageSummary> {
        self.followers.load_more().await
    }

    pub async fn load_following(&self) -> ApiResponse<PageSummary> {
        let options = LoadOptions::first_page(self.following.cursor().page_size);
        self.following.load(vec![], options).await
    }

    pub async fn load_more_following(&self) -> ApiResponse<PageSummary> {
        self.following.load_more().await
    }

    /// Follows `user_id`. A private account leaves the follow pending until
    /// its owner approves; when the server omits the state, `is_private`
    /// decides it.
    pub async fn follow(&self, user_id: Uuid, is_private: bool) -> ApiResponse<FollowStatus> {
        self.status.start();
        let response: ApiResponse<FollowActionResponse> =
            self.client.post(&follow_path(user_id), &json!({})).await;

        let response = response.map(|action| {
            action
                .status
                .unwrap_or_else(|| FollowStatus::for_account(is_private))
        });
        if let Some(status) = response.data {
            info!("follow of {} is {:?}", user_id, status);
            self.statuses.lock().insert(user_id, status);
            self.suggestions.lock().retain(|u| u.id != user_id);
        }
        self.status.finish(response)
    }

    pub async fn unfollow(&self, user_id: Uuid) -> ApiResponse<FollowActionResponse> {
        self.status.start();
        let response: ApiResponse<FollowActionResponse> =
            self.client.delete(&follow_path(user_id)).await;

        if response.success {
            self.statuses.lock().remove(&user_id);
            self.following.update(|users| users.retain(|u| u.id != user_id));
        }
        self.status.finish(response)
    }

    /// Asks for the follow state towards up to 100 users in one call.
    pub async fn check_bulk(
        &self,
        user_ids: Vec<Uuid>,
    ) -> ApiResponse<HashMap<Uuid, FollowStatus>> {
        let input = BulkFollowCheck { user_ids };
        if let Err(e) = input.validate() {
            return self.status.fail(ApiResponse::failure(e.into()));
        }

        self.status.start();
        let response = self
            .client
            .post::<Value, _>("/follows/status/", &input)
            .await
            .and_then(parse_statuses);

        if let Some(found) = &response.data {
            let mut statuses = self.statuses.lock();
            for id in &input.user_ids {
                match found.get(id) {
                    Some(status) => statuses.insert(*id, *status),
                    None => statuses.remove(id),
                };
            }
        }
        self.status.finish(response)
    }

    /// Like `check_bulk`, splitting `user_ids` into batches the server accepts.
    pub async fn check_all(
        &self,
        user_ids: Vec<Uuid>,
    ) -> ApiResponse<HashMap<Uuid, FollowStatus>> {
        let mut all = HashMap::new();
        for batch in user_ids.chunks(MAX_BULK_CHECK) {
            match self.check_bulk(batch.to_vec()).await.into_result() {
                Ok(found) => all.extend(found),
                Err(err) => return ApiResponse::failure(err),
            }
        }
        ApiResponse::success(all)
    }

    pub async fn load_suggestions(&self) -> ApiResponse<Vec<FollowUser>> {
        self.status.start();
        let response = self
            .client
            .get::<Value>("/follows/suggestions/", vec![])
            .await
            .and_then(|value| Page::<FollowUser>::from_value(value).map(|page| page.items));

        if let Some(users) = &response.data {
            *self.suggestions.lock() = users.clone();
        }
        self.status.finish(response)
    }

    /// Incoming follow requests for the signed-in user.
    pub async fn load_requests(&self) -> ApiResponse<Vec<FollowRequest>> {
        self.status.start();
        let response = self
            .client
            .get::<Value>("/follows/requests/", vec![])
            .await
            .and_then(|value| Page::<FollowRequest>::from_value(value).map(|page| page.items));

        if let Some(requests) = &response.data {
            *self.requests.lock() = requests.clone();
        }
        self.status.finish(response)
    }

    /// Approves a request; the requester becomes a follower.
    pub async fn approve_request(&self, request_id: Uuid) -> ApiResponse<()> {
        self.settle_request(request_id, "approve").await
    }

    pub async fn reject_request(&self, request_id: Uuid) -> ApiResponse<()> {
        self.settle_request(request_id, "reject").await
    }

    async fn settle_request(&self, request_id: Uuid, verdict: &str) -> ApiResponse<()> {
        let Some(request) = self.requests.lock().iter().find(|r| r.id == request_id).cloned()
        else {
            return self.status.fail(ApiResponse::failure(ApiError::NotFound(format!(
                "Follow request {} is not loaded",
                request_id
            ))));
        };

        self.status.start();
        let response = self
            .client
            .post::<Value, _>(
                &format!("/follows/requests/{}/{}/", request_id, verdict),
                &json!({}),
            )
            .await
            .map(|_| ());

        if response.success {
            debug!("follow request {} {}d", request_id, verdict);
            self.requests.lock().retain(|r| r.id != request_id);
            if verdict == "approve" {
                self.followers.update(|users| {
                    if !users.iter().any(|u| u.id == request.requester.id) {
                        users.insert(0, request.requester);
                    }
                });
            }
        }
        self.status.finish(response)
    }
}

/// Accepts `{statuses: {id: state}}` or a bare `{id: state}` map.
fn parse_statuses(value: Value) -> Result<HashMap<Uuid, FollowStatus>, ApiError> {
    let map = match value {
        Value::Object(mut obj) => match obj.remove("statuses") {
            Some(inner) => inner,
            None => Value::Object(obj),
        },
        Value::Null => return Ok(HashMap::new()),
        other => {
            return Err(ApiError::Payload(format!(
                "expected follow statuses, got {}",
                other
            )))
        }
    };

    let raw: HashMap<Uuid, WireFollowState> = serde_json::from_value(map)?;
    Ok(raw
        .into_iter()
        .filter_map(|(id, state)| state.into_status().map(|status| (id, status)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_statuses_mixed_shapes() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let parsed = parse_statuses(json!({
            "statuses": { a.to_string(): true, b.to_string(): "pending", c.to_string(): false }
        }))
        .unwrap();

        assert_eq!(parsed.get(&a), Some(&FollowStatus::Approved));
        assert_eq!(parsed.get(&b), Some(&FollowStatus::Pending));
        assert_eq!(parsed.get(&c), None);
    }

    #[test]
    fn test_parse_statuses_bare_map() {
        let a = Uuid::new_v4();
        let parsed = parse_statuses(json!({ a.to_string(): "approved" })).unwrap();
        assert_eq!(parsed.get(&a), Some(&FollowStatus::Approved));
    }
}
