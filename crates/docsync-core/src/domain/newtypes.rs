//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for catalog identifiers and values. Each newtype
//! validates at construction so invalid values never enter the domain layer.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Row IDs (catalog primary keys)
// ============================================================================

/// Integer primary key of a `knowledge_base` or `multi_source_knowledge_base` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KbId(i64);

impl KbId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for KbId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for KbId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Integer primary key of a `sync_run` or `multi_source_sync_run` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(i64);

impl SyncRunId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for SyncRunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SyncRunId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Integer primary key of a `file_record` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRecordId(i64);

impl FileRecordId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for FileRecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FileRecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Integer primary key of an audit log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(i64);

impl AuditId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for AuditId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AuditId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Name / identifier types
// ============================================================================

/// A validated knowledge base name, unique across single- and multi-source KBs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KbName(String);

impl KbName {
    /// # Errors
    /// Returns `DomainError::InvalidKbName` if `name` is empty or all whitespace.
    pub fn new(name: String) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidKbName(
                "KB name cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The compatible-KB lookup pattern used by the schema bridge: `"<name>_%"`.
    #[must_use]
    pub fn compatible_prefix(&self) -> String {
        format!("{}_", self.0)
    }

    /// The placeholder single-source KB name created when no compatible KB exists.
    #[must_use]
    pub fn placeholder_name(&self) -> String {
        format!("{}_placeholder", self.0)
    }
}

impl Display for KbName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KbName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for KbName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<KbName> for String {
    fn from(name: KbName) -> Self {
        name.0
    }
}

/// A source identifier unique within its multi-source KB, matching `[A-Za-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// # Errors
    /// Returns `DomainError::InvalidSourceId` if `id` doesn't match `[A-Za-z0-9_]+`.
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DomainError::InvalidSourceId(format!(
                "source_id must match [A-Za-z0-9_]+: {id}"
            )));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for SourceId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

/// The canonical identifier of a file within its source: a URL for remote
/// sources, an absolute path for local sources. Opaque to the catalog beyond
/// non-emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OriginalUri(String);

impl OriginalUri {
    /// # Errors
    /// Returns `DomainError::InvalidOriginalUri` if `uri` is empty.
    pub fn new(uri: String) -> Result<Self, DomainError> {
        if uri.is_empty() {
            return Err(DomainError::InvalidOriginalUri(
                "original_uri cannot be empty".to_string(),
            ));
        }
        Ok(Self(uri))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OriginalUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OriginalUri {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for OriginalUri {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<OriginalUri> for String {
    fn from(uri: OriginalUri) -> Self {
        uri.0
    }
}

/// The identifier a RAG adapter returns for an uploaded artifact. Always
/// non-null on a `FileRecord`, including error rows, which use the sentinel
/// form `"<kb>/error-<unix-ts>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RagUri(String);

impl RagUri {
    /// # Errors
    /// Returns `DomainError::InvalidRagUri` if `uri` is empty.
    pub fn new(uri: String) -> Result<Self, DomainError> {
        if uri.is_empty() {
            return Err(DomainError::InvalidRagUri(
                "rag_uri cannot be empty".to_string(),
            ));
        }
        Ok(Self(uri))
    }

    /// Builds the sentinel error rag_uri: `"<kb>/error-<unix-ts>"`.
    #[must_use]
    pub fn error_sentinel(kb_name: &str, unix_ts: i64) -> Self {
        Self(format!("{kb_name}/error-{unix_ts}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_error_sentinel(&self) -> bool {
        self.0.contains("/error-")
    }
}

impl Display for RagUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RagUri {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RagUri {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RagUri> for String {
    fn from(uri: RagUri) -> Self {
        uri.0
    }
}

/// A UUID-v4-derived filename with the original file's extension, stable
/// across the whole lifetime of a logical (KB, original_uri) file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UuidFilename(String);

impl UuidFilename {
    /// Generates a fresh `UuidFilename` for the given (lowercased) extension.
    /// Pass an empty string when the source file has no extension.
    #[must_use]
    pub fn generate(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_lowercase();
        let id = Uuid::new_v4();
        if ext.is_empty() {
            Self(id.to_string())
        } else {
            Self(format!("{id}.{ext}"))
        }
    }

    /// # Errors
    /// Returns `DomainError::InvalidUuidFilename` if `name` is empty.
    pub fn new(name: String) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::InvalidUuidFilename(
                "uuid_filename cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UuidFilename {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UuidFilename {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for UuidFilename {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UuidFilename> for String {
    fn from(name: UuidFilename) -> Self {
        name.0
    }
}

/// A SHA-256 content hash, stored as 64 lowercase hex characters. The empty
/// string is accepted as a sentinel for error/deleted rows that never
/// acquired real content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileContentHash(String);

impl FileContentHash {
    /// # Errors
    /// Returns `DomainError::InvalidHash` if `hash` is non-empty and not 64
    /// lowercase hex characters.
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.is_empty() {
            return Ok(Self(hash));
        }
        if hash.len() != 64
            || !hash
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(DomainError::InvalidHash(format!(
                "expected 64 lowercase hex chars, got: {hash}"
            )));
        }
        Ok(Self(hash))
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(bytes);
        Self(format!("{digest:x}"))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for FileContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for FileContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FileContentHash> for String {
    fn from(hash: FileContentHash) -> Self {
        hash.0
    }
}

/// An opaque incremental-sync cursor returned by a Graph-like delta API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeltaToken(String);

impl DeltaToken {
    /// # Errors
    /// Returns `DomainError::InvalidDeltaToken` if `token` is empty.
    pub fn new(token: String) -> Result<Self, DomainError> {
        if token.is_empty() {
            return Err(DomainError::InvalidDeltaToken(
                "delta token cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeltaToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeltaToken {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for DeltaToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeltaToken> for String {
    fn from(token: DeltaToken) -> Self {
        token.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod kb_name_tests {
        use super::*;

        #[test]
        fn rejects_empty() {
            assert!(KbName::new(String::new()).is_err());
            assert!(KbName::new("   ".to_string()).is_err());
        }

        #[test]
        fn compatible_prefix_and_placeholder() {
            let name = KbName::new("docs".to_string()).unwrap();
            assert_eq!(name.compatible_prefix(), "docs_");
            assert_eq!(name.placeholder_name(), "docs_placeholder");
        }
    }

    mod source_id_tests {
        use super::*;

        #[test]
        fn accepts_alphanumeric_and_underscore() {
            assert!(SourceId::new("sp_1".to_string()).is_ok());
            assert!(SourceId::new("Source99".to_string()).is_ok());
        }

        #[test]
        fn rejects_invalid_chars() {
            assert!(SourceId::new("bad-id".to_string()).is_err());
            assert!(SourceId::new("bad id".to_string()).is_err());
            assert!(SourceId::new(String::new()).is_err());
        }
    }

    mod rag_uri_tests {
        use super::*;

        #[test]
        fn error_sentinel_format() {
            let uri = RagUri::error_sentinel("my-kb", 1_700_000_000);
            assert_eq!(uri.as_str(), "my-kb/error-1700000000");
            assert!(uri.is_error_sentinel());
        }

        #[test]
        fn rejects_empty() {
            assert!(RagUri::new(String::new()).is_err());
        }
    }

    mod uuid_filename_tests {
        use super::*;

        #[test]
        fn generate_preserves_extension() {
            let name = UuidFilename::generate(".PDF");
            assert!(name.as_str().ends_with(".pdf"));
        }

        #[test]
        fn generate_without_extension() {
            let name = UuidFilename::generate("");
            assert!(!name.as_str().contains('.'));
        }
    }

    mod file_content_hash_tests {
        use super::*;

        #[test]
        fn from_bytes_round_trips_through_new() {
            let hash = FileContentHash::from_bytes(b"hello world");
            let parsed = FileContentHash::new(hash.as_str().to_string()).unwrap();
            assert_eq!(hash, parsed);
            assert_eq!(hash.as_str().len(), 64);
        }

        #[test]
        fn empty_is_valid() {
            let hash = FileContentHash::empty();
            assert!(hash.is_empty());
        }

        #[test]
        fn rejects_wrong_length() {
            assert!(FileContentHash::new("abc".to_string()).is_err());
        }

        #[test]
        fn rejects_uppercase() {
            let upper = "A".repeat(64);
            assert!(FileContentHash::new(upper).is_err());
        }
    }

    mod delta_token_tests {
        use super::*;

        #[test]
        fn rejects_empty() {
            assert!(DeltaToken::new(String::new()).is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let token = DeltaToken::new("opaque-cursor".to_string()).unwrap();
            let json = serde_json::to_string(&token).unwrap();
            let parsed: DeltaToken = serde_json::from_str(&json).unwrap();
            assert_eq!(token, parsed);
        }
    }

    mod id_tests {
        use super::*;

        #[test]
        fn kb_id_display() {
            assert_eq!(KbId::new(42).to_string(), "42");
        }

        #[test]
        fn sync_run_id_from_i64() {
            let id: SyncRunId = 7i64.into();
            assert_eq!(id.as_i64(), 7);
        }
    }
}
