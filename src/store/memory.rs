//! In-memory store: the reference `GenerationStore` implementation,
//! used by tests and development setups.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ErrorLogEntry, Flashcard, GenerationRecord, GenerationStore};

#[derive(Default)]
struct Inner {
    generations: HashMap<Uuid, GenerationRecord>,
    flashcards: Vec<Flashcard>,
    errors: Vec<ErrorLogEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted flashcards, insertion order.
    pub fn flashcards(&self) -> Vec<Flashcard> {
        self.inner.lock().unwrap().flashcards.clone()
    }
}

#[async_trait]
impl GenerationStore for MemoryStore {
    async fn insert_generation(&self, record: GenerationRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        anyhow::ensure!(
            !inner.generations.contains_key(&record.id),
            "generation {} already exists",
            record.id
        );
        inner.generations.insert(record.id, record);
        Ok(())
    }

    async fn get_generation(&self, id: Uuid) -> anyhow::Result<Option<GenerationRecord>> {
        Ok(self.inner.lock().unwrap().generations.get(&id).cloned())
    }

    async fn set_acceptance_counts(
        &self,
        id: Uuid,
        edited: u32,
        unedited: u32,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .generations
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("generation {id} not found"))?;
        record.accepted_edited_count = edited;
        record.accepted_unedited_count = unedited;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_flashcards(&self, cards: Vec<Flashcard>) -> anyhow::Result<Vec<Flashcard>> {
        let mut inner = self.inner.lock().unwrap();
        inner.flashcards.extend(cards.iter().cloned());
        Ok(cards)
    }

    async fn insert_error_log(&self, entry: ErrorLogEntry) -> anyhow::Result<()> {
        self.inner.lock().unwrap().errors.push(entry);
        Ok(())
    }

    async fn recent_errors(&self, limit: usize) -> anyhow::Result<Vec<ErrorLogEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.errors.iter().rev().take(limit).cloned().collect())
    }
}
