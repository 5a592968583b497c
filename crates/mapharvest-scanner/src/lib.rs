//! Mapharvest Scanner - extraction orchestration.
//!
//! Turns a list of queries into deduplicated business records. Each query is
//! run by the [`RetryOrchestrator`] on a browser session bound to one egress
//! credential: the [`SearchNavigator`] collects result URLs from the main
//! tab, and the [`ParallelExtractionScheduler`] extracts them in isolated
//! tabs, streaming every record to a [`RecordSink`] as soon as it exists.
//!
//! # Features
//!
//! - Scroll-until-stable result collection with challenge detection
//! - Batch-synchronous extraction bounded to a fixed number of tabs
//! - Per-query retries with immediate credential failover
//! - Per-credential outcome counters in the run summary
//! - Session reuse across queries while healthy
//! - Cooperative stop signal, run summary and live progress counters
//! - First-seen-order deduplication by site identity or name and address
//!
//! # Example
//!
//! ```rust,ignore
//! use mapharvest_scanner::{CollectingSink, HarvestRunner, RetryOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = RetryOrchestrator::new(
//!     &config,
//!     rotator,
//!     Box::new(ChromeLauncher::new(config.browser.clone())),
//!     Box::new(SelectorExtractor::default()),
//! );
//! let mut runner = HarvestRunner::new(orchestrator, None, &config);
//!
//! let sink = CollectingSink::new();
//! let report = runner.run(queries, &sink, &CancellationToken::new()).await;
//! println!("{} unique records", report.summary.unique_records);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod dedupe;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod health;
#[allow(missing_docs)]
pub mod navigator;
pub mod orchestrator;
#[allow(missing_docs)]
pub mod runner;
#[allow(missing_docs)]
pub mod scheduler;
pub mod sink;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use dedupe::{dedupe, identity_key};
pub use error::{FailureKind, Result, ScanError};
pub use health::{CredentialHealth, CredentialStats};
pub use navigator::{NavState, ScrollPolicy, SearchNavigator};
pub use orchestrator::{QueryOutcome, RetryOrchestrator};
pub use runner::{HarvestRunner, RunProgress, RunReport, RunSummary};
pub use scheduler::{plan_batches, ExtractionTask, ParallelExtractionScheduler};
pub use sink::{CollectingSink, RecordSink};
