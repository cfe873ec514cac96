//! Mapping of HTTP failure statuses to API error kinds.

use std::fmt;

/// Closed set of request failure kinds reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 400
    InvalidRequest,
    /// 401 and 403
    Authentication,
    /// 404
    NotFound,
    /// 429
    RateLimit,
    /// 500
    Internal,
    /// Any other non-200 status
    Unclassified,
}

impl ApiErrorKind {
    /// Message used when the caller does not supply one
    pub fn default_message(&self) -> &'static str {
        match self {
            ApiErrorKind::InvalidRequest => "Invalid request format. Check your parameters.",
            ApiErrorKind::Authentication => "Authentication failed. Check your API key.",
            ApiErrorKind::NotFound => "Resource not found. Check your URL or query.",
            ApiErrorKind::RateLimit => "Rate limit exceeded. Try again later.",
            ApiErrorKind::Internal => "Internal server error. Try again later.",
            ApiErrorKind::Unclassified => "Unhandled error occurred",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::InvalidRequest => "invalid-request",
            ApiErrorKind::Authentication => "authentication",
            ApiErrorKind::NotFound => "not-found",
            ApiErrorKind::RateLimit => "rate-limit",
            ApiErrorKind::Internal => "internal",
            ApiErrorKind::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// A failed API request: its kind, the HTTP status and a human message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: u16,
    pub message: String,
}

impl ApiError {
    /// Classify `status` and attach the kind's default message
    pub fn from_status(status: u16) -> Self {
        let kind = classify(status);
        Self {
            kind,
            status,
            message: kind.default_message().to_string(),
        }
    }

    /// Replace the default message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Whether the transport may retry a request that failed with this status
    pub fn is_retryable(&self) -> bool {
        is_retryable_status(self.status)
    }
}

/// Map an HTTP status code to its error kind
pub fn classify(status: u16) -> ApiErrorKind {
    match status {
        400 => ApiErrorKind::InvalidRequest,
        401 | 403 => ApiErrorKind::Authentication,
        404 => ApiErrorKind::NotFound,
        429 => ApiErrorKind::RateLimit,
        500 => ApiErrorKind::Internal,
        _ => ApiErrorKind::Unclassified,
    }
}

/// Statuses retried with backoff before being classified
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
