//! Utility modules supporting retrieval.
//!
//! - [`HttpClient`]: shared `reqwest` client with a user agent and timeout
//! - [`RetryConfig`]: configuration for retries with exponential backoff
//! - [`with_retry`]: execute an operation with automatic retry on transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use springer_client::utils::{with_retry, AttemptError, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, springer_client::Error> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default().max_retries(3);
//! let body = with_retry(config, || async { fetch_data().await.map_err(AttemptError::from) }).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod retry;

pub use http::{HttpClient, USER_AGENT};
pub use retry::{with_retry, AttemptError, RetryConfig, TransientError};
