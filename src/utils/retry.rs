//! Retry utilities with exponential backoff for idempotent API calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::client::{is_retryable_status, Error};

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of retries
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff factor
    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Delay before retry number `retry` (1-based): `factor * 2^(retry - 1)`, capped
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as i32;
        let secs = self.backoff_factor.max(0.0) * 2f64.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Delay for a transient failure, preferring the server's hint
    pub fn delay_for(&self, retry: u32, transient: &TransientError) -> Duration {
        match transient.retry_after() {
            Some(hint) => hint.min(self.max_delay),
            None => self.backoff(retry),
        }
    }
}

/// Transient failures that should trigger a retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientError {
    /// Too many requests (429), with optional retry-after seconds
    RateLimit(Option<u64>),
    /// Service unavailable (503), with optional retry-after seconds
    ServiceUnavailable(Option<u64>),
    /// Gateway timeout (504)
    GatewayTimeout,
    /// Other retryable server error (500, 502)
    ServerError(u16),
}

impl TransientError {
    /// Classify a status as transient, if it is
    pub fn from_status(status: u16, retry_after: Option<u64>) -> Option<Self> {
        if !is_retryable_status(status) {
            return None;
        }
        Some(match status {
            429 => TransientError::RateLimit(retry_after),
            503 => TransientError::ServiceUnavailable(retry_after),
            504 => TransientError::GatewayTimeout,
            other => TransientError::ServerError(other),
        })
    }

    /// Server-provided delay hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(secs))
            | TransientError::ServiceUnavailable(Some(secs)) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Failure of a single attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Worth repeating; `error` is returned once retries are exhausted
    Transient { error: Error, kind: TransientError },
    /// Fails the whole operation immediately
    Permanent(Error),
}

impl From<Error> for AttemptError {
    fn from(err: Error) -> Self {
        AttemptError::Permanent(err)
    }
}

/// Execute an async operation, retrying transient failures with backoff
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation` - The async operation to execute; called once per attempt
///
/// # Returns
///
/// The result of the operation, or the last error after all retries are exhausted
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if retries > 0 {
                    tracing::info!("Request succeeded after {} retries", retries);
                }
                return Ok(result);
            }
            Err(AttemptError::Permanent(error)) => return Err(error),
            Err(AttemptError::Transient { error, kind }) => {
                if retries >= config.max_retries {
                    tracing::warn!(
                        "Request failed after {} attempts: {}",
                        retries + 1,
                        error
                    );
                    return Err(error);
                }

                retries += 1;
                let delay = config.delay_for(retries, &kind);
                tracing::debug!(
                    "Transient error {:?}, retry {}/{} in {:?}",
                    kind,
                    retries,
                    config.max_retries,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, ApiErrorKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::default()
            .max_retries(max_retries)
            .backoff_factor(0.0)
    }

    fn transient(status: u16) -> AttemptError {
        AttemptError::Transient {
            error: ApiError::from_status(status).into(),
            kind: TransientError::from_status(status, None).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(3), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(4), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    let count = *call_count.borrow();
                    if count < 3 {
                        Err(transient(503))
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_last_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, Error> = {
            let call_count = call_count.clone();
            with_retry(fast_config(2), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(transient(429))
                }
            })
        }
        .await;

        assert_eq!(result.unwrap_err().api_kind(), Some(ApiErrorKind::RateLimit));
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, Error> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(AttemptError::Permanent(ApiError::from_status(404).into()))
                }
            })
        }
        .await;

        assert_eq!(result.unwrap_err().api_kind(), Some(ApiErrorKind::NotFound));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_status(429, Some(3)),
            Some(TransientError::RateLimit(Some(3)))
        );
        assert_eq!(
            TransientError::from_status(502, None),
            Some(TransientError::ServerError(502))
        );
        assert_eq!(
            TransientError::from_status(504, None),
            Some(TransientError::GatewayTimeout)
        );
        assert!(TransientError::from_status(404, None).is_none());
        assert!(TransientError::from_status(501, None).is_none());
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(3), Duration::from_secs(8));
        assert_eq!(config.backoff(10), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_hint_wins_but_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(
            config.delay_for(1, &TransientError::RateLimit(Some(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            config.delay_for(1, &TransientError::ServiceUnavailable(Some(600))),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.delay_for(2, &TransientError::GatewayTimeout),
            Duration::from_secs(4)
        );
    }
}
