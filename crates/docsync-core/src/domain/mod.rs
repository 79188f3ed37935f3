//! Domain entities and business logic
//!
//! This module contains the core domain types for the document sync engine:
//! - Newtypes for type-safe identifiers and validated domain values
//! - Knowledge base and source definition entities
//! - Sync run lifecycle and counters
//! - File record entities (per-file sync outcomes)
//! - Domain-specific error types

pub mod errors;
pub mod file_record;
pub mod knowledge_base;
pub mod newtypes;
pub mod sync_run;

// Re-export commonly used types
pub use errors::DomainError;
pub use file_record::{FileRecord, FileRecordStatus};
pub use knowledge_base::{KnowledgeBase, MultiSourceKnowledgeBase, SourceDefinition};
pub use newtypes::*;
pub use sync_run::{MultiSourceSyncRun, SyncCounters, SyncMode, SyncRun, SyncRunStatus};
