use serde_json::Value;

/// Shown when the server gives us nothing we can put in front of a user.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Every failure the client can report. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Unable to reach the server: {0}")]
    Network(String),
    #[error("The request timed out. Please try again.")]
    Timeout(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("Unexpected response from the server: {0}")]
    Payload(String),
    #[error("Request was superseded by a newer one")]
    Cancelled,
}

impl ApiError {
    /// HTTP status associated with the failure, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Builds the error for a non-2xx response from whatever body came back.
    pub fn from_status(status: u16, body: &Value) -> Self {
        let message = extract_message(body);
        match status {
            401 => ApiError::Unauthorized(
                message.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            ),
            408 | 504 => ApiError::Timeout(
                message.unwrap_or_else(|| format!("server answered with status {}", status)),
            ),
            _ => ApiError::Server {
                status,
                message: message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::Payload(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Payload(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// First non-empty string among `detail`, `message` and `error`.
pub fn extract_message(body: &Value) -> Option<String> {
    ["detail", "message", "error"].iter().find_map(|key| {
        body.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_message_prefers_detail() {
        let body = json!({ "error": "e", "message": "m", "detail": "d" });
        assert_eq!(extract_message(&body).as_deref(), Some("d"));
    }

    #[test]
    fn test_extract_message_falls_through_empty_fields() {
        let body = json!({ "detail": "", "error": "Post not found" });
        assert_eq!(extract_message(&body).as_deref(), Some("Post not found"));
    }

    #[test]
    fn test_unstructured_body_gets_generic_message() {
        let err = ApiError::from_status(500, &json!({ "content": ["too long"] }));
        assert_eq!(err.to_string(), GENERIC_ERROR_MESSAGE);
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(401, &Value::Null),
            ApiError::Unauthorized(_)
        ));
        assert!(ApiError::from_status(504, &Value::Null).is_timeout());
        assert_eq!(
            ApiError::from_status(422, &json!({ "message": "Comment must not be empty" }))
                .to_string(),
            "Comment must not be empty"
        );
    }
}
