use reqwest::StatusCode;
use thiserror::Error;

/// Failure reported by a list service, classified by how the caller should react.
///
/// Cloneable so that every caller waiting on the same in-flight operation can
/// receive the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// 429 or a service-specific throttling response
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Connection, timeout or 5xx failures
    #[error("network error: {0}")]
    Network(String),
    /// The service reports the action was already performed (409 and friends)
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    /// Local persistence failed
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    Other(String),
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        SourceError::Other(message.into())
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, body)
        };
        match status {
            StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited(message),
            StatusCode::CONFLICT => SourceError::Conflict(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized(message),
            StatusCode::NOT_FOUND => SourceError::NotFound(message),
            s if s.is_server_error() => SourceError::Network(message),
            s => SourceError::Api {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Worth retrying after a delay
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::RateLimited(_) | SourceError::Network(_))
    }

    /// The remote side already has what we tried to write
    pub fn is_conflict(&self) -> bool {
        matches!(self, SourceError::Conflict(_))
    }

    /// Short category used in logs
    pub fn category(&self) -> &'static str {
        match self {
            SourceError::RateLimited(_) => "rate_limited",
            SourceError::Network(_) => "network",
            SourceError::Conflict(_) => "conflict",
            SourceError::NotFound(_) => "not_found",
            SourceError::Unauthorized(_) => "unauthorized",
            SourceError::Api { .. } => "api",
            SourceError::Storage(_) => "storage",
            SourceError::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return SourceError::Network(err.to_string());
        }
        match err.status() {
            Some(status) => SourceError::from_status(status, ""),
            None if err.is_request() || err.is_body() => SourceError::Network(err.to_string()),
            None => SourceError::Other(err.to_string()),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Storage(err.to_string())
    }
}
