//! Document Sync Audit - structured, queryable audit trail
//!
//! Distinct from `docsync_core::domain::FileRecord`: records engine-level
//! events (run start/finish, per-file actions, delta-token lifecycle,
//! schema-bridge resolution) feeding `status`/`info` and future
//! explain-style tooling.
//!
//! ## Modules
//!
//! - [`event`] - the `AuditEventKind`/`AuditEvent` taxonomy
//! - [`audit_log`] - the `AuditLog` service backed by its own SQLite table
//! - [`pool`] - connection pool management for the audit database
//! - [`reason`] - structured reason codes for `file_error` details

pub mod audit_log;
pub mod event;
pub mod pool;
pub mod reason;

pub use audit_log::AuditLog;
pub use event::{AuditEvent, AuditEventKind};
pub use pool::{AuditPool, AuditStoreError};
pub use reason::ReasonCode;
