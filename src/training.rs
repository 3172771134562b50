//! Background training: grow the vocabulary from scraped pages.
//!
//! A job runs extract → tokenize → frequency filter → insert → notify.
//! Jobs are fire-and-forget: [`TrainingWorker::spawn`] hands back a job id as
//! an acknowledgement and the caller never learns how the job went. Outcomes
//! are reported through logging only, and nothing is retried.
//!
//! Only tokens seen more than `min_frequency` times on the page survive the
//! filter, which keeps one-off noise out of the vocabulary. Inserts go
//! through [`VocabularyStore::get_or_create`], so overlapping jobs converge on
//! one id per word.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{VocabError, VocabResult};
use crate::extractor::ContentExtractor;
use crate::hub::{BroadcastHub, HubEvent};
use crate::tokenizer::tokenize;
use crate::vocabulary::VocabularyStore;

/// Tokens must occur strictly more often than this to be learned.
pub const DEFAULT_MIN_FREQUENCY: usize = 2;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// What one finished job did.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub job_id: Uuid,
    pub url: String,
    pub extracted_chars: usize,
    /// Distinct tokens that passed the frequency filter.
    pub candidates: usize,
    pub new_entries: usize,
    pub finished_at: DateTime<Utc>,
}

/// Lowercased tokens occurring more than `min_frequency` times, in order of
/// first appearance.
pub fn frequent_tokens<'a, I>(tokens: I, min_frequency: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        let key = token.to_lowercase();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter(|token| counts.get(token).is_some_and(|&n| n > min_frequency))
        .collect()
}

pub struct TrainingWorker {
    store: Arc<VocabularyStore>,
    extractor: Arc<dyn ContentExtractor>,
    hub: Arc<BroadcastHub>,
    min_frequency: usize,
    permits: Semaphore,
    /// Jobs spawned and not yet finished.
    in_flight: watch::Sender<usize>,
}

impl TrainingWorker {
    pub fn new(
        store: Arc<VocabularyStore>,
        extractor: Arc<dyn ContentExtractor>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            store,
            extractor,
            hub,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            permits: Semaphore::new(DEFAULT_MAX_CONCURRENT_JOBS),
            in_flight: watch::Sender::new(0),
        }
    }

    #[must_use]
    pub fn with_min_frequency(mut self, min_frequency: usize) -> Self {
        self.min_frequency = min_frequency;
        self
    }

    /// Jobs beyond this many wait for a slot; none are dropped.
    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.permits = Semaphore::new(jobs.max(1));
        self
    }

    pub fn min_frequency(&self) -> usize {
        self.min_frequency
    }

    /// Spawned jobs that have not finished yet, including those waiting for a
    /// slot.
    pub fn active_jobs(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Resolve once no spawned job is left running.
    pub async fn wait_idle(&self) {
        let mut jobs = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = jobs.wait_for(|&n| n == 0).await;
    }

    /// Start a job in the background and return its id immediately.
    ///
    /// This is the whole contract: an acknowledgement, never a result. There
    /// is no cancellation handle.
    pub fn spawn(self: &Arc<Self>, url: String) -> Uuid {
        let job_id = Uuid::new_v4();
        let worker = Arc::clone(self);
        let span = tracing::info_span!("training_job", %job_id, url = %url);
        self.in_flight.send_modify(|n| *n += 1);

        tokio::spawn(
            async move {
                worker.run_logged(job_id, &url).await;
                worker.in_flight.send_modify(|n| *n = n.saturating_sub(1));
            }
            .instrument(span),
        );

        job_id
    }

    async fn run_logged(&self, job_id: Uuid, url: &str) {
        let Ok(_permit) = self.permits.acquire().await else {
            tracing::error!("training permits closed; job dropped");
            return;
        };

        match self.run(job_id, url).await {
            Ok(report) => tracing::info!(
                new_entries = report.new_entries,
                candidates = report.candidates,
                "training complete"
            ),
            Err(VocabError::Extraction(e)) => {
                tracing::warn!(error = %e, "extraction failed; vocabulary untouched")
            }
            Err(e) => tracing::error!(error = %e, "training job failed"),
        }
    }

    /// Run one job to completion in the caller's task.
    pub async fn train(&self, url: &str) -> VocabResult<TrainingReport> {
        self.run(Uuid::new_v4(), url).await
    }

    async fn run(&self, job_id: Uuid, url: &str) -> VocabResult<TrainingReport> {
        tracing::info!(%job_id, url, "scraping");

        let text = self.extractor.extract(url).await?;
        let tokens = tokenize(&text);
        let candidates = frequent_tokens(tokens.iter().map(|t| t.text), self.min_frequency);
        tracing::debug!(
            tokens = tokens.len(),
            candidates = candidates.len(),
            "frequency filter applied"
        );

        let mut new_entries = 0;
        for word in &candidates {
            match self.store.get_or_create(word).await {
                Ok(assignment) if assignment.created => new_entries += 1,
                Ok(_) => {}
                Err(e) => {
                    // Words already learned stay learned; tell sessions about them
                    if new_entries > 0 {
                        self.notify(new_entries).await;
                    }
                    return Err(e);
                }
            }
        }

        if new_entries > 0 {
            self.notify(new_entries).await;
        }

        Ok(TrainingReport {
            job_id,
            url: url.to_string(),
            extracted_chars: text.chars().count(),
            candidates: candidates.len(),
            new_entries,
            finished_at: Utc::now(),
        })
    }

    async fn notify(&self, new_entries: usize) {
        let vocab_size = match self.store.size().await {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(error = %e, "vocabulary size unavailable; skipping broadcast");
                return;
            }
        };
        self.hub.broadcast(&HubEvent::VocabularyUpdated {
            new_entries,
            vocab_size,
        });
    }
}
