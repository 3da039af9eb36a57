use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::request::{RequestBody, RequestConfig};
use crate::api::retry::{with_retry, RetryConfig};
use crate::config::settings::Settings;
use crate::error::{ApiError, SESSION_EXPIRED_MESSAGE};
use crate::response::{unwrap_envelope, ApiResponse};
use crate::session::Session;

/// HTTP client for the BlogVerse REST API. Cheap to clone; clones share the
/// connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    retry: RetryConfig,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(settings: &Settings, session: Arc<Session>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::from_settings(settings),
            session,
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a request and decodes the payload into `T`.
    /// Never fails outright: every problem comes back inside the response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        config: RequestConfig,
    ) -> ApiResponse<T> {
        match self.execute(method, path, body.as_ref(), &config).await {
            Ok((status, value)) => match serde_json::from_value::<T>(value) {
                Ok(data) => ApiResponse::success(data).with_status(status),
                Err(e) => {
                    warn!("Failed to decode response from {}: {}", path, e);
                    ApiResponse::failure(ApiError::from(e)).with_status(status)
                }
            },
            Err(err) => ApiResponse::failure(err),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> ApiResponse<T> {
        self.request(Method::GET, path, None, RequestConfig::default().query(query))
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.request(Method::DELETE, path, None, RequestConfig::default())
            .await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        match RequestBody::json(body) {
            Ok(body) => {
                self.request(method, path, Some(body), RequestConfig::default())
                    .await
            }
            Err(err) => ApiResponse::failure(err),
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&RequestBody>,
        config: &RequestConfig,
    ) -> Result<(u16, Value), ApiError> {
        let token = if config.skip_auth {
            None
        } else {
            self.access_token()?
        };
        let url = self.url(path);

        debug!("{} {}", method, url);

        let result = with_retry(&self.retry, ApiError::is_timeout, || {
            self.send_once(method.clone(), &url, body, config, token.as_deref())
        })
        .await;

        if let Err(ApiError::Unauthorized(_)) = &result {
            info!("Authentication rejected for {}, clearing session", path);
            self.session.clear();
        }

        result
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&RequestBody>,
        config: &RequestConfig,
        token: Option<&str>,
    ) -> Result<(u16, Value), ApiError> {
        let mut builder = self.http.request(method, url);

        if !config.query.is_empty() {
            builder = builder.query(&config.query);
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        // The multipart boundary must come from the form itself.
        let multipart = body.map_or(false, RequestBody::is_multipart);
        for (name, value) in &config.headers {
            if multipart && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match body {
            Some(RequestBody::Json(payload)) => builder.json(payload),
            Some(RequestBody::Multipart(parts)) => builder.multipart(parts.to_form()?),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !(200..300).contains(&status) {
            let err = ApiError::from_status(status, &value);
            warn!("{} returned {}: {}", url, status, err);
            return Err(err);
        }

        unwrap_envelope(value, status).map(|data| (status, data))
    }

    /// The session's access token, or an auth error when it has visibly
    /// expired. An expired session is cleared on the spot.
    fn access_token(&self) -> Result<Option<String>, ApiError> {
        match self.session.tokens() {
            None => Ok(None),
            Some(tokens) if tokens.access_expired() => {
                info!("Access token expired, clearing session");
                self.session.clear();
                Err(ApiError::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string()))
            }
            Some(tokens) => Ok(Some(tokens.access)),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
