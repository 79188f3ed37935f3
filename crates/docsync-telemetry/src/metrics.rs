//! Prometheus metrics registry for the document sync engine
//!
//! Provides typed, labeled counters and histograms for sync-run outcomes,
//! per-file classification counts, and RAG adapter call latencies. Purely
//! observational: nothing in the engine reads these back to make decisions.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: sync/scan runs by (kind, status), kind ∈ {sync, scan}.
    pub runs_total: IntCounterVec,
    /// Counter: files processed by classification (new, modified, unchanged, deleted, error).
    pub files_processed_total: IntCounterVec,
    /// Counter: RAG adapter calls by (operation, status), operation ∈ {upload, update, delete}.
    pub rag_calls_total: IntCounterVec,
    /// Histogram: RAG adapter call latency in seconds, labeled by operation.
    pub rag_call_duration_seconds: HistogramVec,
    /// Counter: delta-token lifecycle events by outcome (refreshed, cleared).
    pub delta_token_events_total: IntCounterVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("docsync".to_string()), None)?;

        let runs_total = IntCounterVec::new(
            Opts::new("runs_total", "Total sync/scan runs by kind and status"),
            &["kind", "status"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let files_processed_total = IntCounterVec::new(
            Opts::new(
                "files_processed_total",
                "Total files processed by classification",
            ),
            &["classification"],
        )?;
        registry.register(Box::new(files_processed_total.clone()))?;

        let rag_calls_total = IntCounterVec::new(
            Opts::new("rag_calls_total", "Total RAG adapter calls by operation and status"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(rag_calls_total.clone()))?;

        let rag_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rag_call_duration_seconds",
                "RAG adapter call duration in seconds",
            )
            .buckets(vec![0.05, 0.25, 1.0, 5.0, 30.0, f64::INFINITY]),
            &["operation"],
        )?;
        registry.register(Box::new(rag_call_duration_seconds.clone()))?;

        let delta_token_events_total = IntCounterVec::new(
            Opts::new("delta_token_events_total", "Delta token lifecycle events"),
            &["outcome"],
        )?;
        registry.register(Box::new(delta_token_events_total.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            files_processed_total,
            rag_calls_total,
            rag_call_duration_seconds,
            delta_token_events_total,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record a sync or scan run's terminal status (`kind` is "sync" or "scan").
    pub fn record_run(&self, kind: &str, status: &str) {
        self.runs_total.with_label_values(&[kind, status]).inc();
    }

    /// Record one file's classification outcome for a sync or scan run.
    pub fn record_file_processed(&self, classification: &str) {
        self.files_processed_total
            .with_label_values(&[classification])
            .inc();
    }

    /// Record a RAG adapter call's outcome and latency.
    pub fn record_rag_call(&self, operation: &str, status: &str, duration_secs: f64) {
        self.rag_calls_total
            .with_label_values(&[operation, status])
            .inc();
        self.rag_call_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record a delta-token lifecycle event (`outcome` is "refreshed" or "cleared").
    pub fn record_delta_token_event(&self, outcome: &str) {
        self.delta_token_events_total
            .with_label_values(&[outcome])
            .inc();
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_creation() {
        let registry = MetricsRegistry::new().expect("create registry");
        let output = registry.encode().expect("encode");
        assert!(output.is_empty() || output.contains("docsync"));
    }

    #[test]
    fn test_record_run() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_run("sync", "completed");
        registry.record_run("sync", "completed");
        registry.record_run("scan", "failed");

        let output = registry.encode().unwrap();
        assert!(output.contains("docsync_runs_total"));
        assert!(output.contains("completed"));
        assert!(output.contains("scan"));
    }

    #[test]
    fn test_record_file_processed() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_file_processed("new");
        registry.record_file_processed("modified");
        registry.record_file_processed("error");

        let output = registry.encode().unwrap();
        assert!(output.contains("docsync_files_processed_total"));
    }

    #[test]
    fn test_record_rag_call() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_rag_call("upload", "success", 0.3);
        registry.record_rag_call("delete", "failure", 1.2);

        let output = registry.encode().unwrap();
        assert!(output.contains("docsync_rag_calls_total"));
        assert!(output.contains("docsync_rag_call_duration_seconds"));
    }

    #[test]
    fn test_record_delta_token_event() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_delta_token_event("refreshed");
        registry.record_delta_token_event("cleared");

        let output = registry.encode().unwrap();
        assert!(output.contains("docsync_delta_token_events_total"));
    }

    #[test]
    fn test_encode_produces_valid_output() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_run("sync", "completed");
        registry.record_file_processed("new");

        let output = registry.encode().unwrap();
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
