//! Reason codes for audit log entries.
//!
//! Structured codes for categorizing why a per-file operation failed.
//! Used by `AuditLog` to enrich `file_error` details beyond a free-text
//! message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured reason codes for file-processing failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The source adapter reported itself unreachable (auth/transport).
    SourceUnavailable,
    /// A per-file operation exceeded its configured timeout.
    NetworkTimeout,
    /// The source's API rate limit was exceeded.
    ThrottlingExceeded,
    /// Insufficient permissions to read the source file.
    PermissionDenied,
    /// The RAG adapter's delta/update token or cursor is no longer valid.
    TokenInvalid,
    /// A RAG `update` targeted a `rag_uri` that no longer exists.
    RagConflict,
    /// File exceeds the maximum allowed size.
    FileTooLarge,
    /// File path exceeds the maximum allowed length.
    PathTooLong,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::SourceUnavailable => "source_unavailable",
            ReasonCode::NetworkTimeout => "network_timeout",
            ReasonCode::ThrottlingExceeded => "throttling_exceeded",
            ReasonCode::PermissionDenied => "permission_denied",
            ReasonCode::TokenInvalid => "token_invalid",
            ReasonCode::RagConflict => "rag_conflict",
            ReasonCode::FileTooLarge => "file_too_large",
            ReasonCode::PathTooLong => "path_too_long",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_display() {
        assert_eq!(ReasonCode::TokenInvalid.to_string(), "token_invalid");
        assert_eq!(ReasonCode::NetworkTimeout.to_string(), "network_timeout");
        assert_eq!(ReasonCode::FileTooLarge.to_string(), "file_too_large");
        assert_eq!(ReasonCode::PathTooLong.to_string(), "path_too_long");
    }

    #[test]
    fn reason_code_serialization() {
        let code = ReasonCode::ThrottlingExceeded;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"throttling_exceeded\"");

        let deserialized: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, code);
    }
}
