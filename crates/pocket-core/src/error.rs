//! Error types for Pocket Universe.

use thiserror::Error;

/// Result type alias using Pocket Universe's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Core error type for Pocket Universe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists or the operation would break a uniqueness rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uploaded media type is not accepted
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Uploaded payload exceeds the accepted size
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generative model call failed or returned an unusable answer
    #[error("Inference error: {0}")]
    Inference(String),

    /// Object storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error is a PostgreSQL unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("planet".to_string());
        assert_eq!(err.to_string(), "Not found: planet");
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("galaxy name taken".to_string());
        assert_eq!(err.to_string(), "Conflict: galaxy name taken");
    }

    #[test]
    fn test_error_display_media() {
        let err = Error::UnsupportedMediaType("image/gif".to_string());
        assert_eq!(err.to_string(), "Unsupported media type: image/gif");

        let err = Error::PayloadTooLarge("7340032 bytes".to_string());
        assert_eq!(err.to_string(), "Payload too large: 7340032 bytes");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("empty response".to_string());
        assert_eq!(err.to_string(), "Inference error: empty response");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!Error::Conflict("x".into()).is_unique_violation());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
