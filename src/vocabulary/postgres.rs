//! Postgres vocabulary backend.
//!
//! Table layout lives in `migrations/0001_vocabulary.sql`; [`PgBackend::ensure_schema`]
//! applies the same statements idempotently at startup. Word uniqueness is
//! enforced by `vocabulary_word_idx`, so concurrent writers in other
//! processes are resolved by `ON CONFLICT (word) DO NOTHING`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{InsertOutcome, VocabularyBackend, VocabularyEntry, RESERVED_MAX};
use crate::error::{VocabError, VocabResult};

const COUNTER_NAME: &str = "word_id";
/// Rows per INSERT during bulk replace.
const BULK_CHUNK: usize = 1000;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS vocabulary (id BIGINT PRIMARY KEY, word TEXT NOT NULL)",
    "CREATE UNIQUE INDEX IF NOT EXISTS vocabulary_word_idx ON vocabulary (word)",
    "CREATE TABLE IF NOT EXISTS vocabulary_counter (name TEXT PRIMARY KEY, value BIGINT NOT NULL)",
];

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> VocabResult<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create tables and the word index if they are missing.
    pub async fn ensure_schema(&self) -> VocabResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_id(raw: i64) -> VocabResult<u32> {
    u32::try_from(raw)
        .map_err(|_| VocabError::StoreUnavailable(format!("stored id {raw} out of range")))
}

#[async_trait]
impl VocabularyBackend for PgBackend {
    async fn find_id(&self, word: &str) -> VocabResult<Option<u32>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM vocabulary WHERE word = $1")
            .bind(word)
            .fetch_optional(&self.pool)
            .await?;
        id.map(to_id).transpose()
    }

    async fn next_id(&self) -> VocabResult<u32> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO vocabulary_counter (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
                SET value = vocabulary_counter.value + 1
            RETURNING value
            "#,
        )
        .bind(COUNTER_NAME)
        .bind(i64::from(RESERVED_MAX) + 1)
        .fetch_one(&self.pool)
        .await?;
        to_id(value)
    }

    async fn insert_entry(&self, entry: &VocabularyEntry) -> VocabResult<InsertOutcome> {
        let rows = sqlx::query(
            "INSERT INTO vocabulary (word, id) VALUES ($1, $2) ON CONFLICT (word) DO NOTHING",
        )
        .bind(&entry.word)
        .bind(i64::from(entry.id))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 1 {
            return Ok(InsertOutcome::Inserted);
        }

        match self.find_id(&entry.word).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(VocabError::StoreUnavailable(format!(
                "insert of '{}' conflicted but no row is visible",
                entry.word
            ))),
        }
    }

    async fn count(&self) -> VocabResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vocabulary")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn replace_all(&self, entries: &[VocabularyEntry]) -> VocabResult<()> {
        let mut tx = self.pool.begin().await?;

        // Index is rebuilt afterwards by ensure_word_index
        sqlx::query("DROP INDEX IF EXISTS vocabulary_word_idx")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM vocabulary")
            .execute(&mut *tx)
            .await?;

        for (n, chunk) in entries.chunks(BULK_CHUNK).enumerate() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO vocabulary (word, id) ");
            builder.push_values(chunk, |mut row, entry| {
                row.push_bind(&entry.word).push_bind(i64::from(entry.id));
            });
            builder.build().execute(&mut *tx).await?;
            tracing::debug!(
                uploaded = (n * BULK_CHUNK + chunk.len()),
                total = entries.len(),
                "bulk insert progress"
            );
        }

        let highest = entries
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(0)
            .max(RESERVED_MAX);
        sqlx::query(
            r#"
            INSERT INTO vocabulary_counter (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET value = $2
            "#,
        )
        .bind(COUNTER_NAME)
        .bind(i64::from(highest))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn ensure_word_index(&self) -> VocabResult<()> {
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS vocabulary_word_idx ON vocabulary (word)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
