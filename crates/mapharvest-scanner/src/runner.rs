//! The query loop of a whole run.

use crate::dedupe::dedupe;
use crate::health::CredentialHealth;
use crate::orchestrator::RetryOrchestrator;
use crate::sink::RecordSink;
use chrono::{DateTime, Utc};
use mapharvest_core::{AppConfig, BusinessRecord, DedupStrategy, Query};
use mapharvest_enrich::EmailEnricher;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Live counters of a run in flight, readable from other tasks.
#[derive(Debug, Default)]
pub struct RunProgress {
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    records: AtomicUsize,
}

impl RunProgress {
    /// Queries finished so far, successful or not.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Queries that completed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Queries that exhausted their attempts or aborted the run.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Records streamed to the sink so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }
}

/// Counts records on their way to the caller's sink.
struct ProgressSink<'a> {
    inner: &'a dyn RecordSink,
    progress: &'a RunProgress,
}

impl RecordSink for ProgressSink<'_> {
    fn accept(&self, record: &BusinessRecord) {
        self.progress.records.fetch_add(1, Ordering::Relaxed);
        self.inner.accept(record);
    }
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub queries_total: usize,
    pub queries_attempted: usize,
    pub queries_succeeded: usize,
    pub queries_failed: usize,
    /// Records returned by successful queries, before deduplication
    pub records_produced: usize,
    /// Records left after deduplication
    pub unique_records: usize,
    /// Whether the stop signal ended the run early
    pub stopped: bool,
    /// Why the run ended before the query list was exhausted
    pub aborted: Option<String>,
    /// Attempt outcomes per egress credential
    pub credentials: CredentialHealth,
}

/// Deduplicated records of a run and its summary.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<BusinessRecord>,
    pub summary: RunSummary,
}

/// Drives a list of queries through the orchestrator, one at a time.
pub struct HarvestRunner {
    orchestrator: RetryOrchestrator,
    enricher: Option<EmailEnricher>,
    dedup: DedupStrategy,
    delay_between_queries: Duration,
    progress: Arc<RunProgress>,
}

impl HarvestRunner {
    #[must_use]
    pub fn new(
        orchestrator: RetryOrchestrator,
        enricher: Option<EmailEnricher>,
        config: &AppConfig,
    ) -> Self {
        Self {
            orchestrator,
            enricher,
            dedup: config.dedup.strategy,
            delay_between_queries: Duration::from_millis(config.retry.delay_between_queries_ms),
            progress: Arc::new(RunProgress::default()),
        }
    }

    /// Shared handle to the live counters.
    #[must_use]
    pub fn progress(&self) -> Arc<RunProgress> {
        Arc::clone(&self.progress)
    }

    /// Run every query in order.
    ///
    /// `stop` is checked between queries; a query already running always
    /// finishes first. The pause between queries ends early on stop. An empty
    /// credential pool aborts the remaining queries and is reported in the
    /// summary.
    pub async fn run(
        &mut self,
        queries: Vec<Query>,
        sink: &dyn RecordSink,
        stop: &CancellationToken,
    ) -> RunReport {
        let started_at = Utc::now();
        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            queries_total: queries.len(),
            queries_attempted: 0,
            queries_succeeded: 0,
            queries_failed: 0,
            records_produced: 0,
            unique_records: 0,
            stopped: false,
            aborted: None,
            credentials: CredentialHealth::new(),
        };
        info!(run_id = %summary.run_id, queries = queries.len(), "run started");

        let counting = ProgressSink {
            inner: sink,
            progress: &self.progress,
        };
        let mut records = Vec::new();

        for (index, query) in queries.iter().enumerate() {
            if stop.is_cancelled() {
                summary.stopped = true;
                break;
            }
            if index > 0 && !self.delay_between_queries.is_zero() {
                tokio::select! {
                    () = stop.cancelled() => {
                        summary.stopped = true;
                        break;
                    }
                    () = tokio::time::sleep(self.delay_between_queries) => {}
                }
            }

            info!(
                query = %query.describe(),
                index = index + 1,
                total = queries.len(),
                "processing query"
            );
            summary.queries_attempted += 1;

            match self.orchestrator.run_query(query, &counting).await {
                Ok(outcome) => {
                    let mut found = outcome.records;
                    if let Some(enricher) = &self.enricher {
                        found = enricher.enrich(found).await;
                    }

                    if outcome.succeeded {
                        summary.queries_succeeded += 1;
                        self.progress.succeeded.fetch_add(1, Ordering::Relaxed);
                    } else {
                        summary.queries_failed += 1;
                        self.progress.failed.fetch_add(1, Ordering::Relaxed);
                    }
                    summary.records_produced += found.len();
                    records.extend(found);
                    self.progress.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(query = %query.describe(), error = %e, "aborting run");
                    summary.queries_failed += 1;
                    summary.aborted = Some(e.to_string());
                    self.progress.failed.fetch_add(1, Ordering::Relaxed);
                    self.progress.processed.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        }

        if summary.stopped {
            info!("stop requested, ending run");
        }
        self.orchestrator.teardown().await;

        let records = dedupe(records, self.dedup);
        summary.unique_records = records.len();
        summary.credentials = self.orchestrator.credential_health().clone();
        summary.finished_at = Utc::now();

        info!(
            run_id = %summary.run_id,
            attempted = summary.queries_attempted,
            succeeded = summary.queries_succeeded,
            failed = summary.queries_failed,
            records = summary.records_produced,
            unique = summary.unique_records,
            stopped = summary.stopped,
            "run finished"
        );
        RunReport { records, summary }
    }
}
