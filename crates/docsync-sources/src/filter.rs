//! Config-driven include/exclude filtering shared by every source adapter.
//!
//! Filtering order is fixed: exclude-extensions, then include-extensions
//! (a non-empty list acts as a whitelist), then exclude-patterns, then
//! include-patterns. A file survives only if it passes every stage.

use glob::Pattern;
use serde::{Deserialize, Serialize};

/// Filter settings parsed from a source definition's `source_config` JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

fn extension_of(path: &str) -> Option<String> {
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Returns `true` if `path` should be included in the listing under `cfg`.
pub fn is_included(path: &str, cfg: &FilterConfig) -> bool {
    let ext = extension_of(path);

    if !cfg.exclude_extensions.is_empty() {
        if let Some(ext) = &ext {
            if cfg
                .exclude_extensions
                .iter()
                .any(|e| normalize_extension(e) == *ext)
            {
                return false;
            }
        }
    }

    if !cfg.include_extensions.is_empty() {
        let included = ext.as_ref().is_some_and(|ext| {
            cfg.include_extensions
                .iter()
                .any(|e| normalize_extension(e) == *ext)
        });
        if !included {
            return false;
        }
    }

    if cfg
        .exclude_patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .any(|p| p.matches(path))
    {
        return false;
    }

    if !cfg.include_patterns.is_empty() {
        let included = cfg
            .include_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches(path));
        if !included {
            return false;
        }
    }

    true
}
