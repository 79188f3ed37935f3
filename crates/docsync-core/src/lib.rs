//! Document Sync Engine Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `KnowledgeBase`, `MultiSourceKnowledgeBase`, `SyncRun`, `FileRecord`
//! - **Port definitions** - Traits for adapters: `ISourceAdapter`, `IRagAdapter`, `ICatalogRepository`
//! - **Configuration** - Typed config, validation, and the builder pattern
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement; the orchestrator
//! in `docsync-engine` drives the domain through these ports directly.

pub mod config;
pub mod domain;
pub mod ports;
