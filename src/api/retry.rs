//! Bounded retries for requests that time out.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::settings::Settings;

/// How often and how patiently a timed-out request is resent.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Resends after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    /// Wait before the first resend.
    pub initial_backoff: Duration,
    /// Cap on any single wait.
    pub max_backoff: Duration,
    /// Growth factor between consecutive waits.
    pub backoff_multiplier: f64,
    /// Spread each wait by up to 30% either way so clients don't resend in lockstep.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: settings.retry_backoff,
            ..Self::default()
        }
    }

    /// Wait before resend number `retry` (1-based), before jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(self.max_backoff.as_millis() as f64) as u64)
    }
}

/// Sends with `send`, resending while `is_retryable` accepts the failure and
/// the budget lasts. The failure of the final attempt is what comes back.
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut send: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        let err = match send().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retryable(&err) {
            return Err(err);
        }
        if retry == config.max_retries {
            warn!("request failed after {} resends: {}", retry, err);
            return Err(err);
        }

        retry += 1;
        let delay = spread(config.delay_for(retry), config.jitter);
        warn!(
            "request failed ({}), resend {}/{} in {:?}",
            err, retry, config.max_retries, delay
        );
        tokio::time::sleep(delay).await;
    }
}

fn spread(delay: Duration, jitter: bool) -> Duration {
    if !jitter {
        return delay;
    }
    let factor = rand::thread_rng().gen_range(0.7..=1.3);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(5),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    fn timeout() -> ApiError {
        ApiError::Timeout("gateway timed out".into())
    }

    #[test]
    fn test_delays_double_up_to_the_cap() {
        let config = RetryConfig {
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(1),
            ..RetryConfig::default()
        };
        let delays: Vec<u64> = (1..=4)
            .map(|n| config.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![300, 600, 1000, 1000]);
    }

    #[test]
    fn test_jitter_stays_within_thirty_percent() {
        for _ in 0..100 {
            let delay = spread(Duration::from_millis(1000), true).as_millis();
            assert!((700..=1300).contains(&delay), "{}", delay);
        }
        assert_eq!(
            spread(Duration::from_millis(1000), false),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test]
    async fn test_timeouts_resend_until_an_answer() {
        let sends = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&sends);

        let result = with_retry(&quick(3), ApiError::is_timeout, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(timeout())
                } else {
                    Ok("feed page")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("feed page"));
        assert_eq!(sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted_returns_the_timeout() {
        let sends = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&sends);

        let result: Result<(), _> = with_retry(&quick(2), ApiError::is_timeout, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Timeout(_))));
        assert_eq!(sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_errors_are_sent_once() {
        let sends = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&sends);

        let result: Result<(), _> = with_retry(&quick(5), ApiError::is_timeout, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Server {
                    status: 500,
                    message: "boom".into(),
                })
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_never_resends() {
        let sends = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&sends);

        let result: Result<(), _> = with_retry(&quick(0), ApiError::is_timeout, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }
}
