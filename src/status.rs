use std::sync::Arc;

use parking_lot::Mutex;

use crate::response::ApiResponse;

#[derive(Debug, Default)]
struct StatusInner {
    pending: usize,
    error: Option<String>,
}

/// Loading flag and last error of a store's mutations, for UI gating.
#[derive(Debug, Clone, Default)]
pub struct MutationStatus {
    inner: Arc<Mutex<StatusInner>>,
}

impl MutationStatus {
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.pending += 1;
        inner.error = None;
    }

    /// Records the outcome and hands the response back.
    pub fn finish<T>(&self, response: ApiResponse<T>) -> ApiResponse<T> {
        let mut inner = self.inner.lock();
        inner.pending = inner.pending.saturating_sub(1);
        if let Some(err) = response.error.as_ref().filter(|e| !e.is_cancelled()) {
            inner.error = Some(err.to_string());
        }
        response
    }

    /// Records a failure that never reached the network.
    pub fn fail<T>(&self, response: ApiResponse<T>) -> ApiResponse<T> {
        self.start();
        self.finish(response)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().pending > 0
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.lock().error = None;
    }
}
