//! Document Sync Engine - orchestration core
//!
//! Drives the sync lifecycle for single-source and multi-source knowledge
//! bases: classifies a source listing against the catalog's history, fetches
//! and hashes changed content, writes through to the RAG backend, and
//! records the outcome as an auditable `FileRecord` per URI.
//!
//! - [`change_detector`] classifies a listing against the catalog (§4.5).
//! - [`file_processor`] performs the per-file fetch/hash/RAG-call work (§4.6).
//! - [`orchestrator`] drives one source's `INIT..FAILED` state machine (§4.8),
//!   including the delta-token contract (§4.7) and scan mode (§4.10).
//! - [`multi_source`] fans a multi-source KB's sync across its sources and
//!   resolves the schema-bridge compatible KB id (§4.9).
//! - [`retry`] is the shared exponential-backoff helper used by both the
//!   orchestrator and the file processor for transient source/RAG errors.

pub mod change_detector;
pub mod error;
pub mod file_processor;
pub mod multi_source;
pub mod orchestrator;
pub mod retry;

pub use change_detector::{classify, ChangeType, Classification};
pub use error::EngineError;
pub use file_processor::{process, process_scan, ProcessOutcome};
pub use multi_source::{resolve_compatible_kb, run_multi_source};
pub use orchestrator::{run, RunMode, RunOutcome, SourceRunContext, DEFAULT_DRIVE_ID};
