//! Batch ingestion: normalize, dedup, fetch, summarize, store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bookmark_core::{
    build_summary_prompt, normalize_url, parse_summary_response, BatchReport, FailureStage,
    SkipReason, UrlOutcome, UrlRecord, UrlReport,
};
use bookmark_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use futures_util::{stream, StreamExt};
use tokio::sync::Notify;

use crate::fetch::Fetcher;
use crate::store::{RecordStore, StoreError};
use crate::summarize::Summarizer;
use crate::{PipelineEvent, Stage};

/// Produces the `fetched_utc` stamp for new records.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

#[derive(Clone)]
pub struct PipelineSettings {
    /// URLs enriched at once. 1 keeps strict input order.
    pub concurrency: usize,
    pub clock: Clock,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            clock: Arc::new(|| chrono::Utc::now().to_rfc3339()),
        }
    }
}

impl fmt::Debug for PipelineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSettings")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

struct Claims {
    processed: HashSet<String>,
    /// Owner's release signal per URL being enriched.
    in_flight: HashMap<String, Arc<Notify>>,
}

/// State for one batch run: the store handle and the set of URLs already
/// handled, seeded from the store when the run starts.
pub struct BatchContext {
    store: Arc<dyn RecordStore>,
    claims: Mutex<Claims>,
}

impl BatchContext {
    pub fn open(store: Arc<dyn RecordStore>) -> Result<Self, StoreError> {
        let processed = store.get_all_urls()?;
        pipeline_debug!("Seeded processed set with {} urls", processed.len());
        Ok(Self {
            store,
            claims: Mutex::new(Claims {
                processed,
                in_flight: HashMap::new(),
            }),
        })
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn processed_count(&self) -> usize {
        self.lock().processed.len()
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.lock().processed.contains(url)
    }

    /// Reserve a URL for this worker. False if it is already processed.
    ///
    /// While another worker owns the URL this waits for its release, so a
    /// duplicate retries after a failure exactly as a sequential run would.
    async fn claim(&self, url: &str) -> bool {
        loop {
            let owner = {
                let mut claims = self.lock();
                if claims.processed.contains(url) {
                    return false;
                }
                match claims.in_flight.get(url) {
                    Some(owner) => Arc::clone(owner),
                    None => {
                        claims
                            .in_flight
                            .insert(url.to_string(), Arc::new(Notify::new()));
                        return true;
                    }
                }
            };

            let released = owner.notified();
            // The owner may have released between the two lock scopes.
            let still_owned = self
                .lock()
                .in_flight
                .get(url)
                .is_some_and(|current| Arc::ptr_eq(current, &owner));
            if still_owned {
                pipeline_debug!("Waiting for in-flight {}", url);
                released.await;
            }
        }
    }

    fn release(&self, url: &str, now_stored: bool) {
        let mut claims = self.lock();
        if now_stored {
            claims.processed.insert(url.to_string());
        }
        if let Some(owner) = claims.in_flight.remove(url) {
            owner.notify_waiters();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Claims> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    summarizer: Arc<dyn Summarizer>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        summarizer: Arc<dyn Summarizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            settings,
        }
    }

    /// Run every raw URL to a terminal state. Individual failures never stop
    /// the batch; they land in the report's broken list.
    pub async fn run(
        &self,
        ctx: &BatchContext,
        raw_urls: &[String],
        sink: &dyn ProgressSink,
    ) -> BatchReport {
        let concurrency = self.settings.concurrency.max(1);
        pipeline_info!(
            "Starting batch: {} urls, {} already stored, concurrency {}",
            raw_urls.len(),
            ctx.processed_count(),
            concurrency
        );

        let reports = stream::iter(
            raw_urls
                .iter()
                .enumerate()
                .map(|(index, raw)| (index, raw.trim()))
                .filter(|(_, raw)| !raw.is_empty()),
        )
        .map(move |(index, raw)| self.process_url(ctx, index, raw, sink))
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

        let report = BatchReport::from_reports(reports);
        pipeline_info!(
            "Batch finished: {} stored, {} skipped, {} failed",
            report.stored_count(),
            report.skipped_count(),
            report.failed_count()
        );
        report
    }

    pub async fn process_url(
        &self,
        ctx: &BatchContext,
        index: usize,
        raw_url: &str,
        sink: &dyn ProgressSink,
    ) -> UrlReport {
        let normalized = normalize_url(raw_url);

        let outcome = if ctx.claim(&normalized).await {
            let outcome = self.enrich(ctx, index, &normalized, sink).await;
            let now_stored = matches!(outcome, UrlOutcome::Stored(_) | UrlOutcome::Skipped(_));
            ctx.release(&normalized, now_stored);
            outcome
        } else {
            UrlOutcome::Skipped(SkipReason::AlreadyProcessed)
        };

        match &outcome {
            UrlOutcome::Stored(record) => {
                pipeline_info!("Stored {} ({})", record.url, record.heading);
            }
            UrlOutcome::Skipped(reason) => {
                pipeline_info!("Skipped {}: {}", normalized, reason);
            }
            UrlOutcome::Failed { stage, reason } => {
                pipeline_warn!("Failed {} at {}: {}", raw_url, stage, reason);
            }
        }

        sink.emit(PipelineEvent::Finished {
            index,
            raw_url: raw_url.to_string(),
            outcome: outcome.clone(),
        });

        UrlReport {
            index,
            raw_url: raw_url.to_string(),
            normalized_url: normalized,
            outcome,
        }
    }

    async fn enrich(
        &self,
        ctx: &BatchContext,
        index: usize,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> UrlOutcome {
        // Another process may have stored it after this run was seeded.
        match ctx.store().exists(url) {
            Ok(true) => return UrlOutcome::Skipped(SkipReason::AlreadyProcessed),
            Ok(false) => {}
            Err(err) => return UrlOutcome::failed(FailureStage::Store, err.to_string()),
        }

        emit_stage(sink, index, url, Stage::Fetching);
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(err) => return UrlOutcome::failed(FailureStage::Fetch, err.to_string()),
        };

        emit_stage(sink, index, url, Stage::Summarizing);
        let prompt = build_summary_prompt(&page.text);
        let response = match self.summarizer.complete(&prompt).await {
            Ok(response) => response,
            Err(err) => return UrlOutcome::failed(FailureStage::Summarize, err.to_string()),
        };
        let Some(parsed) = parse_summary_response(&response) else {
            return UrlOutcome::failed(FailureStage::Summarize, "backend returned an empty summary");
        };

        emit_stage(sink, index, url, Stage::Storing);
        let record = UrlRecord::new(url, page.heading.as_deref(), parsed, (self.settings.clock)());
        match ctx.store().insert(&record) {
            Ok(()) => UrlOutcome::Stored(record),
            Err(StoreError::Duplicate { .. }) => {
                UrlOutcome::Skipped(SkipReason::StoredConcurrently)
            }
            Err(err) => UrlOutcome::failed(FailureStage::Store, err.to_string()),
        }
    }
}

fn emit_stage(sink: &dyn ProgressSink, index: usize, url: &str, stage: Stage) {
    sink.emit(PipelineEvent::Stage {
        index,
        url: url.to_string(),
        stage,
    });
}
