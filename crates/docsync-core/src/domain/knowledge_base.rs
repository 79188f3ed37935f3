//! Knowledge base and source definition entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::errors::DomainError;
use super::newtypes::{KbId, KbName, SourceId};

/// A single-source knowledge base: one source type, one RAG backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: KbId,
    pub name: KbName,
    pub source_type: String,
    pub source_config: JsonValue,
    pub rag_type: String,
    pub rag_config: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A multi-source knowledge base: one RAG backend shared across an ordered
/// set of `SourceDefinition`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSourceKnowledgeBase {
    pub id: KbId,
    pub name: KbName,
    pub rag_type: String,
    pub rag_config: JsonValue,
    pub file_organization: JsonValue,
    pub sync_strategy: JsonValue,
    pub sources: Vec<SourceDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One source belonging to a `MultiSourceKnowledgeBase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub id: KbId,
    pub multi_source_kb_id: KbId,
    pub source_id: SourceId,
    pub source_type: String,
    pub source_config: JsonValue,
    pub enabled: bool,
    pub metadata: Option<JsonValue>,
}

impl MultiSourceKnowledgeBase {
    /// Source definitions with `enabled = true`, in declared order.
    #[must_use]
    pub fn enabled_sources(&self) -> Vec<&SourceDefinition> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }

    /// Looks up an enabled source by its `source_id`.
    #[must_use]
    pub fn find_source(&self, source_id: &SourceId) -> Option<&SourceDefinition> {
        self.sources
            .iter()
            .find(|s| s.enabled && &s.source_id == source_id)
    }

    /// # Errors
    /// Returns `DomainError::InvalidSourceId` if any requested id is not an
    /// enabled source of this KB.
    pub fn resolve_selection(
        &self,
        requested: &[SourceId],
    ) -> Result<Vec<&SourceDefinition>, DomainError> {
        requested
            .iter()
            .map(|id| {
                self.find_source(id).ok_or_else(|| {
                    DomainError::InvalidSourceId(format!(
                        "source_id {id} is not an enabled source of KB {}",
                        self.name
                    ))
                })
            })
            .collect()
    }
}
