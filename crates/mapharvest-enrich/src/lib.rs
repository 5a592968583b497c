//! Mapharvest Enrich - email enrichment pipeline.
//!
//! Visits each business website over plain HTTP (no browser), looks for a
//! contact email on the homepage and then on a few conventional sub-paths,
//! and writes validated addresses back into the records. Results are cached
//! per website so shared domains are fetched once.
//!
//! Every per-site failure (timeout, blocked status, non-HTML body, challenge
//! page) resolves to "no email"; enrichment never fails a batch.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod error;
pub mod extract;
pub mod pipeline;

pub use cache::{CacheEntry, EmailCache};
pub use error::{EnrichError, EnrichmentUnavailable, Result};
pub use extract::{extract_email, is_valid_email};
pub use pipeline::EmailEnricher;
