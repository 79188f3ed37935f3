//! Document Sync Telemetry - optional observability
//!
//! Provides:
//! - `MetricsRegistry`: Prometheus counters and histograms for sync-run
//!   outcomes, per-file classification counts, and RAG adapter latencies.
//! - `MetricsServer`: HTTP server exposing them on `/metrics` for scraping.
//!
//! Neither is required for the engine to run correctly; a `MetricsRegistry`
//! with nothing reading it behaves identically to no registry at all.

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::MetricsServer;
