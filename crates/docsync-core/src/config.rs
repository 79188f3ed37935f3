//! Configuration module for the document sync engine.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Catalog/worker/timeout/retry settings live here; per-KB source and RAG
//! configuration blobs live in the catalog (see `docsync-catalog`) and are
//! opaque to this crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the document sync engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub orchestrator: OrchestratorConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

/// Catalog (SQLite) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to the SQLite database file. `:memory:` for tests.
    pub db_path: PathBuf,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
}

/// Sync-run orchestrator settings (worker pool, channel, cancellation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of worker tasks processing classifications concurrently per source.
    pub worker_concurrency: u32,
    /// Capacity of the bounded classification channel.
    pub classification_queue_capacity: u32,
    /// Per-file operation timeout, in seconds (fetch + hash + RAG call + catalog insert).
    pub file_operation_timeout_secs: u64,
    /// Grace window for in-flight operations to finish after cancellation, in seconds.
    pub cancellation_grace_secs: u64,
}

/// Exponential backoff settings for per-file operation retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of attempts before giving up and recording `status = error`.
    pub max_attempts: u32,
    /// Base delay in milliseconds; each attempt doubles the previous delay.
    pub base_delay_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`. Overridden by
    /// `DOCSYNC_LOG_LEVEL` / `RUST_LOG` if set.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable text.
    pub json: bool,
}

/// Prometheus metrics server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether to start the metrics scrape server.
    pub enabled: bool,
    /// Port the scrape server listens on.
    pub port: u16,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse as valid YAML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/docsync/config.yaml` on Linux.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("docsync")
            .join("config.yaml")
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("docsync")
                .join("catalog.db"),
            max_connections: 10,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 8,
            classification_queue_capacity: 256,
            file_operation_timeout_secs: 60,
            cancellation_grace_secs: 5,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9898,
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"orchestrator.worker_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.catalog.max_connections == 0 {
            errors.push(ValidationError {
                field: "catalog.max_connections".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.orchestrator.worker_concurrency == 0 {
            errors.push(ValidationError {
                field: "orchestrator.worker_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.orchestrator.classification_queue_capacity == 0 {
            errors.push(ValidationError {
                field: "orchestrator.classification_queue_capacity".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.orchestrator.file_operation_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "orchestrator.file_operation_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.retry.max_attempts == 0 {
            errors.push(ValidationError {
                field: "retry.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.retry.base_delay_ms == 0 {
            errors.push(ValidationError {
                field: "retry.base_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if self.telemetry.enabled && self.telemetry.port == 0 {
            errors.push(ValidationError {
                field: "telemetry.port".into(),
                message: "must be greater than 0 when telemetry is enabled".into(),
            });
        }

        errors
    }
}

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use docsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .catalog_db_path(PathBuf::from("/var/lib/docsync/catalog.db"))
///     .orchestrator_worker_concurrency(16)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- catalog ---

    #[must_use]
    pub fn catalog_db_path(mut self, path: PathBuf) -> Self {
        self.config.catalog.db_path = path;
        self
    }

    #[must_use]
    pub fn catalog_max_connections(mut self, n: u32) -> Self {
        self.config.catalog.max_connections = n;
        self
    }

    // --- orchestrator ---

    #[must_use]
    pub fn orchestrator_worker_concurrency(mut self, n: u32) -> Self {
        self.config.orchestrator.worker_concurrency = n;
        self
    }

    #[must_use]
    pub fn orchestrator_classification_queue_capacity(mut self, n: u32) -> Self {
        self.config.orchestrator.classification_queue_capacity = n;
        self
    }

    #[must_use]
    pub fn orchestrator_file_operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.orchestrator.file_operation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn orchestrator_cancellation_grace_secs(mut self, secs: u64) -> Self {
        self.config.orchestrator.cancellation_grace_secs = secs;
        self
    }

    // --- retry ---

    #[must_use]
    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    #[must_use]
    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay_ms = ms;
        self
    }

    // --- logging ---

    #[must_use]
    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    #[must_use]
    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- telemetry ---

    #[must_use]
    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.config.telemetry.enabled = enabled;
        self
    }

    #[must_use]
    pub fn telemetry_port(mut self, port: u16) -> Self {
        self.config.telemetry.port = port;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
