//! Bounded-concurrency detail-page extraction.
//!
//! URLs are split into batches of at most `concurrency`. Every URL in a batch
//! gets its own tab; the batch is awaited as a unit before the next one
//! starts, so the number of open tabs never exceeds the limit. Records reach
//! the sink in completion order as soon as each task finishes.

use crate::error::{Result, ScanError};
use crate::sink::RecordSink;
use futures::stream::{FuturesUnordered, StreamExt};
use mapharvest_browser::{DetailExtractor, PageHandle, PageRenderer};
use mapharvest_core::{BrowserSettings, BusinessRecord, ExtractionSettings, Field};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Any heading variant that carries the business name.
pub const NAME_SELECTOR: &str = "h1.DUwDvf, h1.fontHeadlineLarge, h1";

/// One business URL being extracted. Owned by the task processing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTask {
    /// Detail page to load
    pub target_url: String,
    /// Position in the URL list, zero-based
    pub sequence_index: usize,
    /// Length of the URL list
    pub total_count: usize,
}

/// Sizes of the batches `total` URLs are split into at `concurrency`.
#[must_use]
pub fn plan_batches(total: usize, concurrency: usize) -> Vec<usize> {
    let concurrency = concurrency.max(1);
    (0..total)
        .step_by(concurrency)
        .map(|start| concurrency.min(total - start))
        .collect()
}

/// Fans detail-page extraction out over isolated tabs.
#[derive(Debug, Clone)]
pub struct ParallelExtractionScheduler {
    concurrency: usize,
    navigation_timeout: Duration,
    name_wait: Duration,
    settle: Duration,
}

impl ParallelExtractionScheduler {
    #[must_use]
    pub fn new(extraction: &ExtractionSettings, browser: &BrowserSettings) -> Self {
        Self {
            concurrency: extraction.concurrency.max(1),
            navigation_timeout: browser.navigation_timeout(),
            name_wait: Duration::from_millis(extraction.name_wait_ms),
            settle: Duration::from_millis(extraction.settle_ms),
        }
    }

    /// Maximum tabs open at once.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Extract every URL, streaming each record to `sink` when it completes.
    ///
    /// Per-URL failures drop that URL. A session that dies during a batch is
    /// reported as [`ScanError::SessionCrash`] once the batch has settled;
    /// records already handed to the sink stay delivered.
    pub async fn run(
        &self,
        renderer: &dyn PageRenderer,
        extractor: &dyn DetailExtractor,
        urls: &[String],
        sink: &dyn RecordSink,
    ) -> Result<Vec<BusinessRecord>> {
        let total = urls.len();
        let batches = plan_batches(total, self.concurrency);
        let mut records = Vec::with_capacity(total);

        info!(
            urls = total,
            batches = batches.len(),
            concurrency = self.concurrency,
            "starting detail extraction"
        );

        let mut offset = 0;
        for (batch_index, size) in batches.into_iter().enumerate() {
            let mut tasks: FuturesUnordered<_> = urls[offset..offset + size]
                .iter()
                .enumerate()
                .map(|(i, url)| ExtractionTask {
                    target_url: url.clone(),
                    sequence_index: offset + i,
                    total_count: total,
                })
                .map(|task| self.extract_one(renderer, extractor, task))
                .collect();
            offset += size;

            let mut crashed = None;
            while let Some(outcome) = tasks.next().await {
                match outcome {
                    Ok(record) => {
                        sink.accept(&record);
                        records.push(record);
                    }
                    Err(ScanError::ExtractionEmpty { url }) => {
                        debug!(url = %url, "no business name, dropping");
                    }
                    Err(e @ ScanError::SessionCrash(_)) => {
                        warn!(batch = batch_index + 1, error = %e, "session lost during batch");
                        crashed = Some(e);
                    }
                    Err(e) => {
                        debug!(error = %e, "detail extraction failed, dropping");
                    }
                }
            }

            if let Some(e) = crashed {
                return Err(e);
            }
            if !renderer.is_alive() {
                return Err(ScanError::SessionCrash(format!(
                    "browser died during batch {}",
                    batch_index + 1
                )));
            }
        }

        info!(records = records.len(), urls = total, "detail extraction finished");
        Ok(records)
    }

    /// Open a private tab, extract, and close the tab whatever happened.
    async fn extract_one(
        &self,
        renderer: &dyn PageRenderer,
        extractor: &dyn DetailExtractor,
        task: ExtractionTask,
    ) -> Result<BusinessRecord> {
        debug!(
            url = %task.target_url,
            index = task.sequence_index + 1,
            total = task.total_count,
            "extracting business"
        );

        let page = renderer.open_page().await?;
        let outcome = self.load_and_extract(page.as_ref(), extractor, &task).await;

        if let Err(e) = page.close().await {
            debug!(url = %task.target_url, error = %e, "failed to close tab");
        }
        outcome
    }

    async fn load_and_extract(
        &self,
        page: &dyn PageHandle,
        extractor: &dyn DetailExtractor,
        task: &ExtractionTask,
    ) -> Result<BusinessRecord> {
        page.navigate(&task.target_url, self.navigation_timeout).await?;

        if let Err(e) = page.wait_for_selector(NAME_SELECTOR, self.name_wait).await {
            if e.is_session_closed() {
                return Err(e.into());
            }
            return Err(ScanError::ExtractionEmpty {
                url: task.target_url.clone(),
            });
        }
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let mut record = extractor.extract(page).await?;
        if !record.has_name() {
            return Err(ScanError::ExtractionEmpty {
                url: task.target_url.clone(),
            });
        }
        if !record.source_url.is_available() {
            record.source_url = Field::Value(task.target_url.clone());
        }
        Ok(record)
    }
}
