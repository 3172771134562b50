//! Load a vocabulary export into Postgres.
//!
//! Replaces whatever the `vocabulary` table holds, then rebuilds the word
//! index. Run it while the server is stopped.
//!
//! Usage:
//!   cargo run --features database,cli --bin vocab_migrate -- vocab.json
//!   cargo run --features database,cli --bin vocab_migrate -- vocab.json --database-url postgresql:///vocab

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vocab_stream::vocabulary::{load_export, PgBackend, VocabularyStore};

#[derive(Parser)]
#[command(name = "vocab_migrate")]
#[command(about = "Bulk-load a word2idx vocabulary export into Postgres")]
struct Args {
    /// JSON export with a `word2idx` object
    export: PathBuf,

    /// Target database
    #[arg(long, env = "VOCAB_DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vocab_stream=info,vocab_migrate=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let entries = load_export(&args.export)
        .await
        .with_context(|| format!("Failed to read {}", args.export.display()))?;
    info!(entries = entries.len(), "export parsed");

    let backend = PgBackend::connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;
    backend
        .ensure_schema()
        .await
        .context("Failed to prepare vocabulary schema")?;

    let store = VocabularyStore::new(Arc::new(backend));
    let report = store.bulk_load(entries).await.context("Bulk load failed")?;
    let size = store.size().await?;

    info!(
        loaded = report.loaded,
        skipped = report.skipped,
        vocab_size = size,
        "migration complete"
    );
    Ok(())
}
