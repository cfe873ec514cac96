//! Error type shared by the whole retrieval stack.

use super::classify::{ApiError, ApiErrorKind};
use crate::models::ResponseFormat;

/// Errors that can occur while retrieving from the Springer Nature API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API answered with a non-200 status
    #[error("API error ({kind}): {0}", kind = .0.kind)]
    Api(#[from] ApiError),

    /// No API key was configured at initialization
    #[error("No API key found. Provide an API key or set the environment variable API_KEY. To get an API key visit: https://dev.springernature.com/")]
    MissingApiKey,

    /// The query is unusable before any request is made
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// A payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The reported total could not be read; the endpoint mapping is wrong
    #[error("Cannot read total results of {format} response: {message}")]
    MissingTotal {
        format: ResponseFormat,
        message: String,
    },

    /// Two envelopes of different formats were merged
    #[error("Cannot merge a {right} response into a {left} response")]
    FormatMismatch {
        left: ResponseFormat,
        right: ResponseFormat,
    },

    /// Pages disagree with the window they were requested for
    #[error("Inconsistent pagination: {0}")]
    Pagination(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Kind of the underlying API error, if any
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Error::Api(err) => Some(err.kind),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Parse(format!("XML: {}", err))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result alias for retrieval operations
pub type Result<T> = std::result::Result<T, Error>;
