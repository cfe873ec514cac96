//! Network transport: one GET with retry, backoff and timeout.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Response;
use std::fmt;
use std::time::Duration;

use super::classify::ApiError;
use super::error::{Error, Result};
use crate::config::RequestSettings;
use crate::utils::{with_retry, AttemptError, HttpClient, RetryConfig, TransientError};

/// Body and status of a successful (200) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// A 200 response carrying `body`
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Issues GET requests against the API
///
/// Implementations retry transient statuses themselves and return an
/// [`Error::Api`] for any terminal non-200 status. They never touch the cache.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send one GET request with the given query parameters
    async fn send(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Create a transport from an HTTP client and a retry policy
    pub fn new(client: HttpClient, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Create a transport from request settings
    pub fn from_settings(settings: &RequestSettings) -> Result<Self> {
        let client = HttpClient::new(Duration::from_secs(settings.timeout_secs))?;
        let retry = RetryConfig::default()
            .max_retries(settings.retries)
            .backoff_factor(settings.backoff_factor);
        Ok(Self::new(client, retry))
    }

    /// Retry policy in use
    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse> {
        let client = &self.client;

        with_retry(self.retry, move || async move {
            tracing::debug!("GET {}", url);

            let response = client
                .client()
                .get(url)
                .query(params)
                .timeout(client.timeout())
                .send()
                .await
                .map_err(|e| Error::Network(format!("Request to {} failed: {}", url, e)))?;

            let status = response.status().as_u16();
            if status == 200 {
                let body = response.text().await.map_err(Error::from)?;
                return Ok(RawResponse { status, body });
            }

            let retry_after = retry_after_secs(&response);
            let error = Error::from(ApiError::from_status(status));
            match TransientError::from_status(status, retry_after) {
                Some(kind) => Err(AttemptError::Transient { error, kind }),
                None => Err(AttemptError::Permanent(error)),
            }
        })
        .await
    }
}

/// Extract the `Retry-After` header, in seconds
fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_from_settings() {
        let settings = RequestSettings {
            timeout_secs: 5,
            retries: 2,
            backoff_factor: 0.5,
        };
        let transport = HttpTransport::from_settings(&settings).unwrap();
        assert_eq!(transport.retry_config().max_retries, 2);
        assert_eq!(transport.retry_config().backoff_factor, 0.5);
    }

    #[test]
    fn test_raw_response_ok() {
        let raw = RawResponse::ok("{}");
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, "{}");
    }
}
