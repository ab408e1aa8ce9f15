//! Error taxonomy of the Instana REST API.

use thiserror::Error;

/// Errors returned by the REST client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The entity does not exist (HTTP 404).
    #[error("failed to get resource from Instana API. 404 - Resource not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
    },

    /// The request conflicts with the current state (HTTP 409).
    #[error("conflict while calling Instana API {path}: {body}")]
    Conflict {
        /// Request path.
        path: String,
        /// Response body.
        body: String,
    },

    /// Any other 4xx response. Never retried.
    #[error("Instana API rejected request to {path} with status {status}: {body}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
        /// Response body.
        body: String,
    },

    /// A 5xx response. Retried with backoff.
    #[error("Instana API failed to serve {path} with status {status}: {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
        /// Response body.
        body: String,
    },

    /// Connection failure or timeout. Retried with backoff.
    #[error("failed to send request to Instana API: {0}")]
    Transport(String),

    /// The response body is not valid JSON for the expected type.
    #[error("failed to decode Instana API response: {0}")]
    Decode(String),

    /// The operation was cancelled by the host.
    #[error("request to Instana API was cancelled")]
    Cancelled,

    /// The endpoint does not offer the operation.
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

impl ApiError {
    /// Whether the request may succeed when sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Transport(_))
    }

    /// Whether the entity was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify an unsuccessful HTTP status.
    pub fn from_status(status: u16, path: impl Into<String>, body: impl Into<String>) -> Self {
        let path = path.into();
        match status {
            404 => Self::NotFound { path },
            409 => Self::Conflict {
                path,
                body: body.into(),
            },
            500..=599 => Self::Server {
                status,
                path,
                body: body.into(),
            },
            _ => Self::Client {
                status,
                path,
                body: body.into(),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(ApiError::from_status(404, "/a", "").is_not_found());
        assert!(matches!(
            ApiError::from_status(409, "/a", "dup"),
            ApiError::Conflict { .. }
        ));
        assert!(matches!(
            ApiError::from_status(400, "/a", "bad"),
            ApiError::Client { status: 400, .. }
        ));
        assert!(matches!(
            ApiError::from_status(503, "/a", ""),
            ApiError::Server { status: 503, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::from_status(500, "/a", "").is_retryable());
        assert!(ApiError::Transport("reset".into()).is_retryable());
        assert!(!ApiError::from_status(404, "/a", "").is_retryable());
        assert!(!ApiError::from_status(409, "/a", "").is_retryable());
        assert!(!ApiError::from_status(422, "/a", "").is_retryable());
        assert!(!ApiError::Cancelled.is_retryable());
        assert!(!ApiError::Decode("eof".into()).is_retryable());
    }
}
