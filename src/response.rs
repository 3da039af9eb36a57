use serde_json::Value;

use crate::error::{extract_message, ApiError, GENERIC_ERROR_MESSAGE};

/// The uniform result every request and store operation hands back.
/// Failures never escape as `Err`; use `into_result` to chain with `?`.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// Indicates if the operation succeeded.
    pub success: bool,
    /// The payload, present on success.
    pub data: Option<T>,
    /// What went wrong, present on failure.
    pub error: Option<ApiError>,
    /// HTTP status of the final attempt, when a response was received.
    pub status: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            status: error.status(),
            error: Some(error),
        }
    }

    /// Attaches the HTTP status code.
    /// Usage: `ApiResponse::success(data).with_status(201)`
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Human-readable error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (_, Some(err)) => Err(err),
            (Some(data), None) => Ok(data),
            (None, None) => Err(ApiError::Payload("response carried no data".to_string())),
        }
    }

    /// Feeds the payload through a fallible conversion, keeping the status.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, ApiError>) -> ApiResponse<U> {
        let status = self.status;
        let mut next = ApiResponse::from(self.into_result().and_then(f));
        if next.status.is_none() {
            next.status = status;
        }
        next
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            status: self.status,
        }
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => ApiResponse::success(data),
            Err(err) => ApiResponse::failure(err),
        }
    }
}

/// Strips the `{success, message, data}` envelope the BlogVerse API wraps
/// payloads in. Bodies without the envelope pass through untouched.
pub(crate) fn unwrap_envelope(body: Value, status: u16) -> Result<Value, ApiError> {
    let is_envelope = body
        .as_object()
        .map(|obj| obj.get("success").map_or(false, Value::is_boolean))
        .unwrap_or(false);

    if !is_envelope {
        return Ok(body);
    }

    if body["success"].as_bool() == Some(false) {
        return Err(ApiError::Server {
            status,
            message: extract_message(&body).unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
        });
    }

    match body {
        Value::Object(mut obj) => Ok(obj.remove("data").unwrap_or(Value::Null)),
        other => Ok(other),
    }
}
