//! Document Sync Catalog - SQLite-backed catalog persistence
//!
//! Implements the durable catalog described by the `ICatalogRepository` port:
//! - Knowledge bases (single-source and multi-source) and source definitions
//! - Sync runs and their counters
//! - File records (per-file sync outcomes)
//! - Delta sync tokens

pub mod pool;
pub mod repository;

pub use pool::{CatalogStoreError, DatabasePool};
pub use repository::SqliteCatalogRepository;
