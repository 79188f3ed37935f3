//! Exponential backoff retry for per-file source/RAG operations.
//!
//! Schedule: `base_delay_ms * 4^attempt` (200ms, 800ms, 3.2s at the default
//! `base_delay_ms = 200`), capped at `retry.max_attempts` total tries.

use std::future::Future;
use std::time::Duration;

use docsync_core::config::RetryConfig;
use docsync_core::ports::{RagError, SourceError};

/// Runs `f` up to `retry.max_attempts` times, sleeping between attempts
/// while `is_transient(&err)` holds. Returns the last error once attempts
/// are exhausted or a non-transient error is hit.
pub async fn with_retry<F, Fut, T, E>(
    retry: &RetryConfig,
    operation: &str,
    is_transient: fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                attempt += 1;
                if attempt >= retry.max_attempts || !is_transient(&err) {
                    return Err(err);
                }
                let delay_ms = retry.base_delay_ms * 4u64.pow(attempt - 1);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms,
                    error = %err,
                    "transient error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Whether a `SourceError` is worth retrying with backoff.
#[must_use]
pub fn is_source_transient(err: &SourceError) -> bool {
    matches!(err, SourceError::TransientError(_))
}

/// Whether a `RagError` is worth retrying with backoff.
#[must_use]
pub fn is_rag_transient(err: &RagError) -> bool {
    matches!(err, RagError::TransientError(_))
}
