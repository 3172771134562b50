//! Vocabulary server
//!
//! Usage:
//!   cargo run --bin vocab_server
//!   VOCAB_SEED_PATH=vocab.json cargo run --bin vocab_server
//!   VOCAB_DATABASE_URL=postgresql:///vocab cargo run --features database --bin vocab_server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vocab_stream::{
    api::{build_router, AppState},
    extractor::HttpContentExtractor,
    vocabulary::{load_export, MemoryBackend, VocabularyBackend},
    BroadcastHub, ServiceConfig, TrainingWorker, VocabularyStore,
};

/// How long shutdown waits for in-flight training jobs.
const JOB_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vocab_stream=debug,vocab_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env();
    info!(
        bind_addr = %config.bind_addr,
        min_frequency = config.min_frequency,
        max_concurrent_jobs = config.max_concurrent_jobs,
        "starting vocabulary server"
    );

    let backend = open_backend(&config).await?;
    let store = Arc::new(VocabularyStore::new(backend));

    if let Some(seed) = &config.seed_path {
        let entries = load_export(seed)
            .await
            .with_context(|| format!("Failed to read vocabulary export {}", seed.display()))?;
        let report = store
            .bulk_load(entries)
            .await
            .context("Failed to seed vocabulary")?;
        info!(loaded = report.loaded, skipped = report.skipped, "vocabulary seeded");
    }

    let hub = Arc::new(BroadcastHub::new());
    let extractor = HttpContentExtractor::new(config.fetch_timeout, &config.user_agent)
        .context("Failed to build HTTP client")?;
    let worker = Arc::new(
        TrainingWorker::new(Arc::clone(&store), Arc::new(extractor), Arc::clone(&hub))
            .with_min_frequency(config.min_frequency)
            .with_max_concurrent_jobs(config.max_concurrent_jobs),
    );

    let app = build_router(AppState::new(store, hub, Arc::clone(&worker)));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let pending = worker.active_jobs();
    if pending > 0 {
        info!(pending, "waiting for training jobs to finish");
        if tokio::time::timeout(JOB_DRAIN_TIMEOUT, worker.wait_idle())
            .await
            .is_err()
        {
            warn!(pending = worker.active_jobs(), "abandoning unfinished training jobs");
        }
    }

    info!("Server stopped");
    Ok(())
}

#[cfg(feature = "database")]
async fn open_backend(config: &ServiceConfig) -> Result<Arc<dyn VocabularyBackend>> {
    use vocab_stream::vocabulary::PgBackend;

    let Some(url) = &config.database_url else {
        info!("VOCAB_DATABASE_URL not set, using in-memory vocabulary");
        return Ok(Arc::new(MemoryBackend::new()));
    };

    let backend = PgBackend::connect(url)
        .await
        .context("Failed to connect to database")?;
    backend
        .ensure_schema()
        .await
        .context("Failed to prepare vocabulary schema")?;
    info!("Connected to vocabulary database");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "database"))]
async fn open_backend(config: &ServiceConfig) -> Result<Arc<dyn VocabularyBackend>> {
    if config.database_url.is_some() {
        warn!("VOCAB_DATABASE_URL is set but this build lacks the `database` feature; using in-memory vocabulary");
    }
    Ok(Arc::new(MemoryBackend::new()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
