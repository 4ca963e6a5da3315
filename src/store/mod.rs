//! Persisted records and the opaque store behind the pipeline.
//!
//! The core reaches persistence through simple insert/update calls on
//! [`GenerationStore`]; there is no transaction spanning the model call
//! and the write. A crash between the two leaves an unrecorded but
//! otherwise successful generation (accepted best-effort guarantee).

pub mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// A candidate flashcard produced by the model, not yet persisted.
///
/// Fields default to empty so a batch with one malformed item still
/// deserializes; the orchestrator drops items with an empty side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
}

impl Suggestion {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}

/// A suggestion the user chose to keep, with an edit marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedSuggestion {
    pub front: String,
    pub back: String,
    pub edited: bool,
}

/// Where a flashcard came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardSource {
    #[serde(rename = "ai-full")]
    AiFull,
    #[serde(rename = "ai-edited")]
    AiEdited,
}

/// A persisted flashcard created from an accepted suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    pub source: CardSource,
    pub generation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provenance for one successful generation call.
///
/// `generated_count` is fixed at creation and never changes. The two
/// acceptance counters start at zero and are overwritten (not
/// accumulated) by the acceptance step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub model: String,
    pub generated_count: u32,
    pub accepted_edited_count: u32,
    pub accepted_unedited_count: u32,
    pub source_text_hash: String,
    pub source_text_length: u32,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Best-effort record of one failed generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub source_text_hash: String,
    pub source_text_length: u32,
    pub model: String,
    pub error_code: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

/// Opaque persistence reached via simple insert/update operations.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    async fn insert_generation(&self, record: GenerationRecord) -> anyhow::Result<()>;

    async fn get_generation(&self, id: Uuid) -> anyhow::Result<Option<GenerationRecord>>;

    /// Overwrite both acceptance counters and bump `updated_at`.
    async fn set_acceptance_counts(
        &self,
        id: Uuid,
        edited: u32,
        unedited: u32,
    ) -> anyhow::Result<()>;

    async fn insert_flashcards(&self, cards: Vec<Flashcard>) -> anyhow::Result<Vec<Flashcard>>;

    async fn insert_error_log(&self, entry: ErrorLogEntry) -> anyhow::Result<()>;

    /// Most recent error entries first.
    async fn recent_errors(&self, limit: usize) -> anyhow::Result<Vec<ErrorLogEntry>>;
}

/// Best-effort failure audit. Write failures are logged and swallowed;
/// they never mask or replace the original generation error.
#[derive(Clone)]
pub struct ErrorAuditLog {
    store: Arc<dyn GenerationStore>,
}

impl ErrorAuditLog {
    pub fn new(store: Arc<dyn GenerationStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: ErrorLogEntry) {
        let code = entry.error_code.clone();
        if let Err(err) = self.store.insert_error_log(entry).await {
            warn!(error = %err, code = %code, "failed to write generation error log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl GenerationStore for FailingStore {
        async fn insert_generation(&self, _record: GenerationRecord) -> anyhow::Result<()> {
            anyhow::bail!("store is down")
        }

        async fn get_generation(&self, _id: Uuid) -> anyhow::Result<Option<GenerationRecord>> {
            anyhow::bail!("store is down")
        }

        async fn set_acceptance_counts(
            &self,
            _id: Uuid,
            _edited: u32,
            _unedited: u32,
        ) -> anyhow::Result<()> {
            anyhow::bail!("store is down")
        }

        async fn insert_flashcards(
            &self,
            _cards: Vec<Flashcard>,
        ) -> anyhow::Result<Vec<Flashcard>> {
            anyhow::bail!("store is down")
        }

        async fn insert_error_log(&self, _entry: ErrorLogEntry) -> anyhow::Result<()> {
            anyhow::bail!("store is down")
        }

        async fn recent_errors(&self, _limit: usize) -> anyhow::Result<Vec<ErrorLogEntry>> {
            anyhow::bail!("store is down")
        }
    }

    #[tokio::test]
    async fn audit_log_swallows_store_failures() {
        let audit = ErrorAuditLog::new(Arc::new(FailingStore));
        // Must not panic or propagate.
        audit
            .record(ErrorLogEntry {
                source_text_hash: "abc".to_string(),
                source_text_length: 1200,
                model: "openai/gpt-4".to_string(),
                error_code: "LLM_ERROR".to_string(),
                error_message: "boom".to_string(),
                created_at: Utc::now(),
            })
            .await;
    }

    #[test]
    fn card_source_uses_wire_names() {
        assert_eq!(
            serde_json::to_value(CardSource::AiFull).unwrap(),
            serde_json::json!("ai-full")
        );
        assert_eq!(
            serde_json::to_value(CardSource::AiEdited).unwrap(),
            serde_json::json!("ai-edited")
        );
    }
}
