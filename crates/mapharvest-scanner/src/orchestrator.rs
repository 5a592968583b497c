//! Retry orchestration for one logical query.
//!
//! Every attempt runs on a browser session bound to the rotator's current
//! egress credential. Any navigation, challenge or crash failure marks the
//! credential failed, tears the session down and tries again on the next
//! credential, up to `retry.max_attempts` attempts in total. A healthy
//! session is kept for the next query when reuse is enabled.

use crate::error::{FailureKind, Result, ScanError};
use crate::health::CredentialHealth;
use crate::navigator::SearchNavigator;
use crate::scheduler::ParallelExtractionScheduler;
use crate::sink::{AnnotatingSink, RecordSink};
use mapharvest_browser::{DetailExtractor, PageHandle, PageRenderer, SessionLauncher};
use mapharvest_core::{AppConfig, BusinessRecord, Query, RetrySettings};
use mapharvest_proxy::ProxyRotator;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of running one query through all of its attempts.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Annotated records of the successful attempt; empty on failure
    pub records: Vec<BusinessRecord>,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Whether some attempt completed
    pub succeeded: bool,
    /// Error of the last failed attempt
    pub last_error: Option<String>,
}

/// A live browser and its main tab, bound to one credential.
struct Session {
    renderer: Box<dyn PageRenderer>,
    main_page: Box<dyn PageHandle>,
    credential_id: String,
}

/// Runs queries with bounded retries and credential failover.
pub struct RetryOrchestrator {
    rotator: ProxyRotator,
    launcher: Box<dyn SessionLauncher>,
    extractor: Box<dyn DetailExtractor>,
    navigator: SearchNavigator,
    scheduler: ParallelExtractionScheduler,
    retry: RetrySettings,
    session: Option<Session>,
    health: CredentialHealth,
}

impl RetryOrchestrator {
    /// Create an orchestrator from configuration and its collaborators.
    #[must_use]
    pub fn new(
        config: &AppConfig,
        rotator: ProxyRotator,
        launcher: Box<dyn SessionLauncher>,
        extractor: Box<dyn DetailExtractor>,
    ) -> Self {
        Self {
            rotator,
            launcher,
            extractor,
            navigator: SearchNavigator::new(&config.search, &config.browser),
            scheduler: ParallelExtractionScheduler::new(&config.extraction, &config.browser),
            retry: config.retry.clone(),
            session: None,
            health: CredentialHealth::new(),
        }
    }

    /// Run `query` until one attempt succeeds or attempts run out.
    ///
    /// Records stream to `sink` as they are extracted, annotated with the
    /// query. Exhausted retries yield an unsuccessful, empty outcome. Only an
    /// empty credential pool is returned as an error.
    pub async fn run_query(&mut self, query: &Query, sink: &dyn RecordSink) -> Result<QueryOutcome> {
        let max_attempts = self.retry.max_attempts.max(1);
        let retry_delay = Duration::from_millis(self.retry.retry_delay_ms);
        let annotating = AnnotatingSink { inner: sink, query };
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(query = %query.describe(), attempt, max_attempts, "starting attempt");
            let attempted_index = self.rotator.current_index();
            let attempted_id = self.rotator.current().ok().map(|c| c.id());

            match self.attempt(query, &annotating).await {
                Ok(mut records) => {
                    if let Some(id) = &attempted_id {
                        self.health.record_success(id);
                    }
                    for record in &mut records {
                        record.annotate(query);
                    }
                    if !self.retry.reuse_session {
                        self.teardown().await;
                    }
                    info!(
                        query = %query.describe(),
                        attempt,
                        records = records.len(),
                        "query completed"
                    );
                    return Ok(QueryOutcome {
                        records,
                        attempts: attempt,
                        succeeded: true,
                        last_error,
                    });
                }
                Err(e @ ScanError::CredentialExhausted(_)) => {
                    self.teardown().await;
                    return Err(e);
                }
                Err(e) => {
                    let kind = e.failure_kind().unwrap_or(FailureKind::Proxy);
                    warn!(
                        query = %query.describe(),
                        attempt,
                        max_attempts,
                        kind = ?kind,
                        error = %e,
                        "attempt failed"
                    );
                    if let Some(id) = &attempted_id {
                        self.health.record_failure(id, kind);
                    }
                    // A scheduled rotation during this attempt already moved
                    // off the failed credential
                    if self.rotator.current_index() == attempted_index {
                        self.rotator.record_failure();
                    }
                    self.teardown().await;
                    last_error = Some(e.to_string());

                    if attempt < max_attempts && !retry_delay.is_zero() {
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        }

        error!(
            query = %query.describe(),
            attempts = max_attempts,
            error = last_error.as_deref().unwrap_or_default(),
            "query failed after all attempts"
        );
        Ok(QueryOutcome {
            records: Vec::new(),
            attempts: max_attempts,
            succeeded: false,
            last_error,
        })
    }

    async fn attempt(&mut self, query: &Query, sink: &dyn RecordSink) -> Result<Vec<BusinessRecord>> {
        self.ensure_session().await?;
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ScanError::SessionCrash("no active session".to_string()))?;

        let urls = self.navigator.collect(session.main_page.as_ref(), query).await?;
        if urls.is_empty() {
            info!(query = %query.describe(), "no results");
            return Ok(Vec::new());
        }

        self.scheduler
            .run(session.renderer.as_ref(), self.extractor.as_ref(), &urls, sink)
            .await
    }

    /// Make sure a live session bound to the current credential exists, then
    /// count the request against that credential.
    async fn ensure_session(&mut self) -> Result<()> {
        let credential = self.rotator.current()?.clone();
        let credential_id = credential.id();

        let reusable = self
            .session
            .as_ref()
            .is_some_and(|s| s.credential_id == credential_id && s.renderer.is_alive());

        if !reusable {
            self.teardown().await;

            info!(proxy = %credential, "launching browser session");
            let renderer = self.launcher.launch(&credential).await?;
            let main_page = match renderer.open_page().await {
                Ok(page) => page,
                Err(e) => {
                    if let Err(shutdown_err) = renderer.shutdown().await {
                        debug!(error = %shutdown_err, "failed to shut down half-open session");
                    }
                    return Err(e.into());
                }
            };
            self.session = Some(Session {
                renderer,
                main_page,
                credential_id,
            });
        }

        if self.rotator.record_request() {
            debug!("rotation threshold reached, next query uses a new credential");
        }
        Ok(())
    }

    /// Close the main tab and the browser, if a session is open.
    pub async fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Err(e) = session.main_page.close().await {
            debug!(error = %e, "failed to close main tab");
        }
        if let Err(e) = session.renderer.shutdown().await {
            warn!(proxy = %session.credential_id, error = %e, "failed to shut down browser");
        }
        debug!(proxy = %session.credential_id, "browser session closed");
    }

    /// Whether a browser session is currently open.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Attempt outcomes per credential so far.
    #[must_use]
    pub fn credential_health(&self) -> &CredentialHealth {
        &self.health
    }

    /// The credential rotator.
    #[must_use]
    pub fn rotator(&self) -> &ProxyRotator {
        &self.rotator
    }
}
