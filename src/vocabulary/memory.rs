//! In-process vocabulary backend.
//!
//! Used when no database is configured and throughout the tests.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{InsertOutcome, VocabularyBackend, VocabularyEntry, RESERVED_MAX};
use crate::error::{VocabError, VocabResult};

pub struct MemoryBackend {
    words: RwLock<HashMap<String, u32>>,
    /// Last id handed out by `next_id`.
    last_id: AtomicU32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            words: RwLock::new(HashMap::new()),
            last_id: AtomicU32::new(RESERVED_MAX),
        }
    }

    /// Snapshot of all entries ordered by id.
    pub async fn entries(&self) -> Vec<VocabularyEntry> {
        let words = self.words.read().await;
        let mut entries: Vec<_> = words
            .iter()
            .map(|(word, id)| VocabularyEntry::new(word.clone(), *id))
            .collect();
        entries.sort_unstable_by_key(|e| e.id);
        entries
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VocabularyBackend for MemoryBackend {
    async fn find_id(&self, word: &str) -> VocabResult<Option<u32>> {
        Ok(self.words.read().await.get(word).copied())
    }

    async fn next_id(&self) -> VocabResult<u32> {
        self.last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| {
                VocabError::StoreUnavailable("vocabulary id space exhausted".to_string())
            })
    }

    async fn insert_entry(&self, entry: &VocabularyEntry) -> VocabResult<InsertOutcome> {
        let mut words = self.words.write().await;
        match words.entry(entry.word.clone()) {
            Entry::Occupied(existing) => Ok(InsertOutcome::Existing(*existing.get())),
            Entry::Vacant(slot) => {
                slot.insert(entry.id);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn count(&self) -> VocabResult<u64> {
        Ok(self.words.read().await.len() as u64)
    }

    async fn replace_all(&self, entries: &[VocabularyEntry]) -> VocabResult<()> {
        let mut words = self.words.write().await;
        words.clear();
        words.extend(entries.iter().map(|e| (e.word.clone(), e.id)));

        let highest = entries.iter().map(|e| e.id).max().unwrap_or(0);
        self.last_id.store(highest.max(RESERVED_MAX), Ordering::SeqCst);
        Ok(())
    }

    async fn ensure_word_index(&self) -> VocabResult<()> {
        // The hash map is the index
        Ok(())
    }
}
