use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub page_size: u32,
    pub session_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff: Duration::from_millis(300),
            page_size: 20,
            session_file: None,
        }
    }
}

impl Settings {
    /// Reads settings from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn new() -> Self {
        let defaults = Self::default();

        let api_base_url = env::var("API_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_base_url);

        let request_timeout = parse_var::<u64>("API_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let max_retries = parse_var("API_MAX_RETRIES").unwrap_or(defaults.max_retries);

        let retry_backoff = parse_var::<u64>("API_RETRY_BACKOFF_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);

        let page_size = parse_var("FEED_PAGE_SIZE")
            .filter(|size: &u32| *size > 0)
            .unwrap_or(defaults.page_size);

        let session_file = env::var("SESSION_FILE").ok().map(PathBuf::from);

        Self {
            api_base_url,
            request_timeout,
            max_retries,
            retry_backoff,
            page_size,
            session_file,
        }
    }

    /// Settings pointed at a specific API root, everything else default.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
