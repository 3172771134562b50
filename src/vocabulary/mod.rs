//! Vocabulary store
//!
//! Append-only mapping of lowercase words to integer ids, shared by every
//! session and training job in the process.
//!
//! ## Id space
//!
//! - `0..=1000` is reserved; `1` is the `<UNK>` sentinel returned for any
//!   word that has no entry
//! - assigned ids come from one monotonically increasing counter, the first
//!   one being `1001`
//! - an id, once assigned to a word, never changes and is never reused
//!
//! ## Concurrency
//!
//! Lookups go straight to the backend and never wait on writers.
//! [`VocabularyStore::insert_if_absent`] is the only write path and funnels
//! the check-then-insert sequence through a single mutex, so concurrent
//! callers racing on the same word all observe the same id. Backends also
//! refuse duplicate words on their own (unique index / entry API), which
//! covers writers living in other processes.

mod export;
mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use export::{load_export, parse_export};
pub use memory::MemoryBackend;
#[cfg(feature = "database")]
pub use postgres::PgBackend;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{VocabError, VocabResult};

/// Id returned for words not present in the vocabulary.
pub const UNKNOWN_ID: u32 = 1;
/// Highest id of the reserved range; the counter starts right above it.
pub const RESERVED_MAX: u32 = 1000;

/// One `(word, id)` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word: String,
    pub id: u32,
}

impl VocabularyEntry {
    pub fn new(word: impl Into<String>, id: u32) -> Self {
        Self {
            word: word.into(),
            id,
        }
    }
}

/// Result of a conflict-aware backend insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The word was already stored, under this id.
    Existing(u32),
}

/// Persistence port for the vocabulary.
///
/// Words handed to a backend are already normalized. Implementations must
/// keep `word` unique on their own; the store adds in-process serialization
/// on top.
#[async_trait]
pub trait VocabularyBackend: Send + Sync {
    async fn find_id(&self, word: &str) -> VocabResult<Option<u32>>;

    /// Reserve the next value of the shared id counter.
    async fn next_id(&self) -> VocabResult<u32>;

    /// Store `entry` unless its word is already present.
    async fn insert_entry(&self, entry: &VocabularyEntry) -> VocabResult<InsertOutcome>;

    async fn count(&self) -> VocabResult<u64>;

    /// Drop every entry and store `entries` instead. The counter is moved to
    /// `max(RESERVED_MAX, highest loaded id)`.
    async fn replace_all(&self, entries: &[VocabularyEntry]) -> VocabResult<()>;

    /// Make sure lookups by word are indexed.
    async fn ensure_word_index(&self) -> VocabResult<()>;
}

/// Outcome of [`VocabularyStore::get_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub id: u32,
    /// True only for the caller whose insert created the entry.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkLoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Lowercase key used for every store operation.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Concurrency-safe word ↔ id store.
pub struct VocabularyStore {
    backend: Arc<dyn VocabularyBackend>,
    insert_lock: Mutex<()>,
}

impl VocabularyStore {
    pub fn new(backend: Arc<dyn VocabularyBackend>) -> Self {
        Self {
            backend,
            insert_lock: Mutex::new(()),
        }
    }

    /// Store over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Case-insensitive lookup. Read-only.
    pub async fn lookup(&self, word: &str) -> VocabResult<Option<u32>> {
        let key = normalize_word(word);
        if key.is_empty() {
            return Ok(None);
        }
        self.backend.find_id(&key).await
    }

    /// Like [`lookup`](Self::lookup) but falls back to [`UNKNOWN_ID`].
    /// Backend failures are still errors, never "unknown".
    pub async fn lookup_or_unknown(&self, word: &str) -> VocabResult<u32> {
        Ok(self.lookup(word).await?.unwrap_or(UNKNOWN_ID))
    }

    /// Return the id of `word`, assigning a fresh one if it has none.
    pub async fn insert_if_absent(&self, word: &str) -> VocabResult<u32> {
        Ok(self.get_or_create(word).await?.id)
    }

    /// [`insert_if_absent`](Self::insert_if_absent) that also reports whether
    /// this call created the entry.
    pub async fn get_or_create(&self, word: &str) -> VocabResult<Assignment> {
        let key = normalize_word(word);
        if key.is_empty() {
            return Err(VocabError::InvalidInput(
                "cannot assign an id to an empty word".to_string(),
            ));
        }

        if let Some(id) = self.backend.find_id(&key).await? {
            return Ok(Assignment { id, created: false });
        }

        let _guard = self.insert_lock.lock().await;

        // Re-check: another caller may have inserted while we waited
        if let Some(id) = self.backend.find_id(&key).await? {
            return Ok(Assignment { id, created: false });
        }

        let id = self.backend.next_id().await?;
        match self
            .backend
            .insert_entry(&VocabularyEntry::new(key.as_str(), id))
            .await?
        {
            InsertOutcome::Inserted => {
                tracing::trace!(word = %key, id, "assigned vocabulary id");
                Ok(Assignment { id, created: true })
            }
            InsertOutcome::Existing(existing) => {
                tracing::debug!(
                    word = %key,
                    existing,
                    burned = id,
                    "word inserted by another writer"
                );
                Ok(Assignment {
                    id: existing,
                    created: false,
                })
            }
        }
    }

    /// Number of distinct words.
    pub async fn size(&self) -> VocabResult<u64> {
        self.backend.count().await
    }

    /// Replace the whole vocabulary with `entries`, then ensure the word index.
    ///
    /// Offline use only. Words are normalized. When two words collide after
    /// lowercasing, the one already stored in lowercase wins (that is the
    /// record a case-insensitive lookup resolves to); between equals the
    /// lowest id wins. Entries with id `0` or an empty word are skipped.
    /// Duplicate ids abort the load before anything is replaced.
    pub async fn bulk_load(&self, entries: Vec<VocabularyEntry>) -> VocabResult<BulkLoadReport> {
        let _guard = self.insert_lock.lock().await;

        let mut entries = entries;
        entries.sort_by_key(|e| e.id);

        let mut seen_ids = HashSet::with_capacity(entries.len());
        // normalized word -> (id, stored already lowercase)
        let mut by_word: HashMap<String, (u32, bool)> = HashMap::with_capacity(entries.len());
        let mut skipped = 0;

        for entry in entries {
            if !seen_ids.insert(entry.id) {
                return Err(VocabError::Conflict(format!(
                    "id {} is assigned more than once",
                    entry.id
                )));
            }
            let word = normalize_word(&entry.word);
            if word.is_empty() || entry.id == 0 {
                skipped += 1;
                continue;
            }
            let exact = entry.word.trim() == word;
            match by_word.get_mut(&word) {
                None => {
                    by_word.insert(word, (entry.id, exact));
                }
                Some(kept) => {
                    skipped += 1;
                    // Ids arrive ascending, so only an exact match displaces
                    if exact && !kept.1 {
                        *kept = (entry.id, true);
                    }
                }
            }
        }

        let mut prepared: Vec<VocabularyEntry> = by_word
            .into_iter()
            .map(|(word, (id, _))| VocabularyEntry::new(word, id))
            .collect();
        prepared.sort_unstable_by_key(|e| e.id);

        if skipped > 0 {
            tracing::warn!(skipped, "bulk load skipped empty, zero-id or case-duplicate words");
        }

        self.backend.replace_all(&prepared).await?;
        self.backend.ensure_word_index().await?;

        tracing::info!(loaded = prepared.len(), "vocabulary bulk load complete");
        Ok(BulkLoadReport {
            loaded: prepared.len(),
            skipped,
        })
    }
}
