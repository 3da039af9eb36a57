//! Page bookkeeping for list endpoints: replace-or-append loading,
//! duplicate-free merging, and last-request-wins cancellation.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::api::{ApiClient, RequestConfig};
use crate::error::ApiError;
use crate::response::ApiResponse;

/// Anything with a stable server identifier.
pub trait Identified {
    fn id(&self) -> Uuid;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    /// Last page committed, 0 before the first load.
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub has_next: bool,
}

impl PageCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 0,
            page_size,
            total_count: 0,
            has_next: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub page: u32,
    pub append: bool,
    pub shuffle: bool,
    pub page_size: u32,
}

impl LoadOptions {
    /// Page 1, replacing whatever is loaded.
    pub fn first_page(page_size: u32) -> Self {
        Self {
            page: 1,
            append: false,
            shuffle: false,
            page_size,
        }
    }

    /// The page after `cursor`, merged into what is loaded.
    pub fn next_page(cursor: &PageCursor) -> Self {
        Self {
            page: cursor.page + 1,
            append: true,
            shuffle: false,
            page_size: cursor.page_size,
        }
    }

    pub fn shuffled(mut self) -> Self {
        self.shuffle = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextPage {
    Cursor,
    End,
    /// Bare array responses say nothing about further pages.
    Unknown,
}

/// One decoded page of a list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: Option<u64>,
    next: NextPage,
}

impl<T: DeserializeOwned> Page<T> {
    /// Accepts `{results, count, next}` or a bare array.
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        match value {
            Value::Array(items) => Ok(Self {
                items: serde_json::from_value(Value::Array(items))?,
                count: None,
                next: NextPage::Unknown,
            }),
            Value::Object(mut obj) => {
                let results = obj.remove("results").ok_or_else(|| {
                    ApiError::Payload("paginated response without results".to_string())
                })?;
                let next = match obj.get("next") {
                    None | Some(Value::Null) | Some(Value::Bool(false)) => NextPage::End,
                    Some(Value::String(s)) if s.is_empty() => NextPage::End,
                    Some(_) => NextPage::Cursor,
                };
                Ok(Self {
                    items: serde_json::from_value(results)?,
                    count: obj.get("count").and_then(Value::as_u64),
                    next,
                })
            }
            Value::Null => Ok(Self {
                items: Vec::new(),
                count: Some(0),
                next: NextPage::End,
            }),
            other => Err(ApiError::Payload(format!(
                "expected a list response, got {}",
                other
            ))),
        }
    }
}

impl<T> Page<T> {
    /// A short page is the last page, whatever the server's cursor says.
    pub fn has_next(&self, page_size: u32) -> bool {
        let full = self.items.len() == page_size as usize;
        match self.next {
            NextPage::Cursor | NextPage::Unknown => full,
            NextPage::End => false,
        }
    }
}

/// Result of a committed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub page: u32,
    pub received: usize,
    pub total_count: u64,
    /// Count the server reported for this page, if any.
    pub count: Option<u64>,
    pub has_next: bool,
}

struct PageState<T> {
    items: Vec<T>,
    cursor: PageCursor,
    params: Vec<(String, String)>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

/// Clears the loading flag when a load future is dropped before it
/// commits. A newer load owns the flag once the generation moves on.
struct LoadGuard<'a, T> {
    state: &'a Mutex<PageState<T>>,
    generation: u64,
}

impl<T> Drop for LoadGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.generation == self.generation && state.loading {
            state.loading = false;
            state.in_flight = None;
        }
    }
}

/// Paginated list of `T` loaded from one endpoint.
pub struct Paginator<T> {
    client: ApiClient,
    path: String,
    state: Arc<Mutex<PageState<T>>>,
}

impl<T> Clone for Paginator<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Paginator<T>
where
    T: DeserializeOwned + Identified + Clone,
{
    pub fn new(client: ApiClient, path: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            path: path.into(),
            state: Arc::new(Mutex::new(PageState {
                items: Vec::new(),
                cursor: PageCursor::new(page_size),
                params: Vec::new(),
                loading: false,
                error: None,
                generation: 0,
                in_flight: None,
            })),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.state
            .lock()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> PageCursor {
        self.state.lock().cursor.clone()
    }

    pub fn has_next(&self) -> bool {
        self.state.lock().cursor.has_next
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Mutates the loaded list in place (local inserts and removals).
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        f(&mut self.state.lock().items)
    }

    /// Mutates one loaded item; `None` when it isn't loaded.
    pub fn update_item<R>(&self, id: Uuid, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.state.lock();
        state.items.iter_mut().find(|item| item.id() == id).map(f)
    }

    /// Drops everything and aborts any load in flight.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if let Some(token) = state.in_flight.take() {
            token.cancel();
        }
        state.generation += 1;
        state.items.clear();
        state.cursor = PageCursor::new(state.cursor.page_size);
        state.params.clear();
        state.loading = false;
        state.error = None;
    }

    /// Loads one page. A newer call cancels this one; only the latest
    /// call's result is committed. A failure leaves the loaded list and its
    /// params in place, so `load_more` keeps following the old list.
    pub async fn load(
        &self,
        params: Vec<(String, String)>,
        options: LoadOptions,
    ) -> ApiResponse<PageSummary> {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.in_flight.replace(token.clone()) {
                debug!("superseding in-flight load of {}", self.path);
                previous.cancel();
            }
            state.generation += 1;
            state.loading = true;
            state.error = None;
            state.generation
        };
        let _guard = LoadGuard {
            state: &self.state,
            generation,
        };

        let mut query = params.clone();
        query.push(("page".to_string(), options.page.to_string()));
        query.push(("page_size".to_string(), options.page_size.to_string()));
        let config = RequestConfig::default().query(query);
        let request = self
            .client
            .request::<Value>(Method::GET, &self.path, None, config);

        let response = tokio::select! {
            _ = token.cancelled() => return ApiResponse::failure(ApiError::Cancelled),
            response = request => response,
        };
        let status = response.status;

        let mut state = self.state.lock();
        if state.generation != generation {
            return ApiResponse::failure(ApiError::Cancelled);
        }
        state.in_flight = None;
        state.loading = false;

        let page = match response.into_result().and_then(Page::<T>::from_value) {
            Ok(page) => page,
            Err(err) => {
                debug!("load of {} page {} failed: {}", self.path, options.page, err);
                state.error = Some(err.to_string());
                return ApiResponse::failure(err);
            }
        };

        let has_next = page.has_next(options.page_size);
        let received = page.items.len();

        if options.append {
            let mut seen: HashSet<Uuid> = state.items.iter().map(Identified::id).collect();
            let fresh: Vec<T> = page
                .items
                .into_iter()
                .filter(|item| seen.insert(item.id()))
                .collect();
            state.items.extend(fresh);
        } else {
            state.items = page.items;
            if options.shuffle {
                state.items.shuffle(&mut rand::thread_rng());
            }
        }

        let total_count = page.count.unwrap_or(state.items.len() as u64);
        state.params = params;
        state.cursor = PageCursor {
            page: options.page,
            page_size: options.page_size,
            total_count,
            has_next,
        };

        debug!(
            "committed {} page {} ({} items, has_next={})",
            self.path, options.page, received, has_next
        );

        let summary = PageSummary {
            page: options.page,
            received,
            total_count,
            count: page.count,
            has_next,
        };
        match status {
            Some(status) => ApiResponse::success(summary).with_status(status),
            None => ApiResponse::success(summary),
        }
    }

    /// Appends the next page with the last-used params. Does nothing when
    /// there is no next page or a load is already running.
    pub async fn load_more(&self) -> ApiResponse<PageSummary> {
        let (cursor, params, loading) = {
            let state = self.state.lock();
            (state.cursor.clone(), state.params.clone(), state.loading)
        };

        if loading || !cursor.has_next {
            return ApiResponse::success(PageSummary {
                page: cursor.page,
                received: 0,
                total_count: cursor.total_count,
                count: None,
                has_next: cursor.has_next,
            });
        }

        self.load(params, LoadOptions::next_page(&cursor)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Deserialize)]
    struct Item {
        id: Uuid,
    }

    impl Identified for Item {
        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn items(n: usize) -> Vec<Value> {
        (0..n).map(|_| json!({ "id": Uuid::new_v4() })).collect()
    }

    #[test]
    fn test_short_page_ends_pagination_despite_cursor() {
        let page: Page<Item> = Page::from_value(json!({
            "results": items(5),
            "count": 25,
            "next": "http://api/posts/?page=3"
        }))
        .unwrap();
        assert!(!page.has_next(20));
    }

    #[test]
    fn test_full_page_with_cursor_has_next() {
        let page: Page<Item> = Page::from_value(json!({
            "results": items(20),
            "count": 40,
            "next": "http://api/posts/?page=2"
        }))
        .unwrap();
        assert!(page.has_next(20));
        assert_eq!(page.count, Some(40));
    }

    #[test]
    fn test_full_page_without_cursor_is_last() {
        let page: Page<Item> =
            Page::from_value(json!({ "results": items(20), "count": 20, "next": null })).unwrap();
        assert!(!page.has_next(20));
    }

    #[test]
    fn test_bare_array_fallback() {
        let full: Page<Item> = Page::from_value(Value::Array(items(10))).unwrap();
        assert!(full.has_next(10));
        assert_eq!(full.count, None);

        let short: Page<Item> = Page::from_value(Value::Array(items(3))).unwrap();
        assert!(!short.has_next(10));
    }

    #[test]
    fn test_object_without_results_is_rejected() {
        let result: Result<Page<Item>, _> = Page::from_value(json!({ "users": [] }));
        assert!(matches!(result, Err(ApiError::Payload(_))));
    }

    #[test]
    fn test_next_page_options_follow_cursor() {
        let cursor = PageCursor {
            page: 2,
            page_size: 20,
            total_count: 60,
            has_next: true,
        };
        let options = LoadOptions::next_page(&cursor);
        assert_eq!(options.page, 3);
        assert!(options.append);
        assert!(!options.shuffle);
    }
}
