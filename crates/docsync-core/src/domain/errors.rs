//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions, and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid hash format (expected lowercase hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid knowledge base or multi-source knowledge base name
    #[error("Invalid KB name: {0}")]
    InvalidKbName(String),

    /// Invalid source_id (must match [A-Za-z0-9_]+ and be unique within its KB)
    #[error("Invalid source id: {0}")]
    InvalidSourceId(String),

    /// Invalid original_uri (empty or otherwise malformed)
    #[error("Invalid original uri: {0}")]
    InvalidOriginalUri(String),

    /// Invalid rag_uri (empty; a FileRecord must always carry a non-null rag_uri)
    #[error("Invalid rag uri: {0}")]
    InvalidRagUri(String),

    /// Invalid uuid_filename
    #[error("Invalid uuid filename: {0}")]
    InvalidUuidFilename(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Path is not within the configured sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Invalid delta token
    #[error("Invalid delta token: {0}")]
    InvalidDeltaToken(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("/bad/path".to_string());
        assert_eq!(err.to_string(), "Invalid path: /bad/path");

        let err = DomainError::InvalidKbName("".to_string());
        assert_eq!(err.to_string(), "Invalid KB name: ");

        let err = DomainError::InvalidState {
            from: "Pending".to_string(),
            to: "Completed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Pending to Completed"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidPath("/path".to_string());
        let err2 = DomainError::InvalidPath("/path".to_string());
        let err3 = DomainError::InvalidPath("/other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_error_clone() {
        let err = DomainError::ValidationFailed("test".to_string());
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
