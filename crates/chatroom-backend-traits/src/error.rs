//! Error types for backend data service operations

use thiserror::Error;

/// Error returned by every [`ChatBackend`](crate::ChatBackend) operation.
///
/// The variants are deliberately coarse: the core only needs to tell
/// "nothing there" apart from transport and storage failures when it
/// decides what to log or surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Requested conversation, message or blob does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport-level failure talking to the hosted backend
    #[error("network error: {0}")]
    Network(String),

    /// Database or blob-store write/read failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Backend refused the request (permissions, validation)
    #[error("rejected: {0}")]
    Rejected(String),

    /// Other error
    #[error("error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::NotFound("conversation c1".to_string());
        assert_eq!(err.to_string(), "not found: conversation c1");

        let err = BackendError::Network("timed out".to_string());
        assert_eq!(err.to_string(), "network error: timed out");

        let err = BackendError::Storage("quota exceeded".to_string());
        assert_eq!(err.to_string(), "storage error: quota exceeded");

        let err = BackendError::Rejected("not a member".to_string());
        assert_eq!(err.to_string(), "rejected: not a member");

        let err = BackendError::Other("unexpected".to_string());
        assert_eq!(err.to_string(), "error: unexpected");
    }
}
