//! Error types for atlas-tools.

use thiserror::Error;

/// Main error type for atlas operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential could not be built or applied
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network or TLS failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream API returned a non-success status
    #[error("API error: {status_line}: {body}")]
    Api {
        status: u16,
        status_line: String,
        body: String,
    },

    /// Every retry attempt failed
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Tool arguments or client input were invalid
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller cancelled or the deadline passed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Operation not supported by this deployment flavor
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl Error {
    /// Build an API error from a status code and response body.
    pub fn from_status(status: u16, status_line: impl Into<String>, body: impl Into<String>) -> Self {
        Error::Api {
            status,
            status_line: status_line.into(),
            body: body.into(),
        }
    }

    /// Short machine-readable reason, used as the prefix of tool error results.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Auth(_) => "auth_error",
            Error::Transport(_) => "transport_error",
            Error::Api { .. } => "http_error",
            Error::RetriesExhausted { source, .. } => source.kind(),
            Error::Decode(_) => "decode_error",
            Error::InvalidInput(_) => "invalid_arguments",
            Error::Cancelled(_) => "cancelled",
            Error::Unsupported(_) => "unsupported",
            Error::Other(_) => "internal_error",
        }
    }

    /// Upstream HTTP status, looking through retry wrapping.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Upstream response body excerpt, looking through retry wrapping.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Api { body, .. } => Some(body.as_str()),
            Error::RetriesExhausted { source, .. } => source.body(),
            _ => None,
        }
    }

    /// Whether this error came from a cancelled context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

/// Result type alias for atlas operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_api_error() {
        let err = Error::from_status(404, "404 Not Found", "no such issue");
        assert_eq!(err.kind(), "http_error");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some("no such issue"));
    }

    #[test]
    fn test_retries_exhausted_reports_cause() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            source: Box::new(Error::from_status(503, "503 Service Unavailable", "")),
        };
        assert_eq!(err.kind(), "http_error");
        assert_eq!(err.status(), Some(503));
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("503 Service Unavailable"));
    }

    #[test]
    fn test_transport_retries_exhausted_kind() {
        let err = Error::RetriesExhausted {
            attempts: 2,
            source: Box::new(Error::Transport("connection refused".into())),
        };
        assert_eq!(err.kind(), "transport_error");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_serde_error_is_decode() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), "decode_error");
    }

    #[test]
    fn test_cancelled() {
        let err = Error::Cancelled("context canceled".into());
        assert!(err.is_cancelled());
        assert_eq!(err.kind(), "cancelled");
    }
}
