//! Shared `reqwest` client for API requests.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::client::Error;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT_CAP: Duration = Duration::from_secs(10);

/// Cheaply clonable client carrying the per-request timeout
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Arc<Client>,
    timeout: Duration,
}

impl HttpClient {
    /// Client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        Self::with_user_agent(USER_AGENT, timeout)
    }

    /// Client sending a custom user agent
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, application/xml;q=0.9, */*;q=0.5"),
        );

        let inner = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout.min(CONNECT_TIMEOUT_CAP))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(inner),
            timeout,
        })
    }

    pub fn client(&self) -> &Client {
        &self.inner
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_the_crate() {
        assert!(USER_AGENT.starts_with("springer-client/"));
    }

    #[test]
    fn test_clones_share_the_client() {
        let http = HttpClient::new(Duration::from_secs(3)).unwrap();
        let copy = http.clone();
        assert!(Arc::ptr_eq(&http.inner, &copy.inner));
        assert_eq!(copy.timeout(), Duration::from_secs(3));
    }
}
