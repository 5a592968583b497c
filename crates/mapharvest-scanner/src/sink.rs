//! Record sinks receiving each record the moment it is extracted.

use mapharvest_core::{BusinessRecord, Query};
use std::sync::{Mutex, PoisonError};

/// Receives every completed record, once per record, as soon as it exists.
///
/// Calls may arrive from concurrently completing tasks in any order.
pub trait RecordSink: Send + Sync {
    /// Accept one record.
    fn accept(&self, record: &BusinessRecord);
}

impl<F> RecordSink for F
where
    F: Fn(&BusinessRecord) + Send + Sync,
{
    fn accept(&self, record: &BusinessRecord) {
        self(record);
    }
}

/// In-memory sink keeping every record it was handed.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<BusinessRecord>>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<BusinessRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of records received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for CollectingSink {
    fn accept(&self, record: &BusinessRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// Stamps the originating query on records before forwarding them.
pub(crate) struct AnnotatingSink<'a> {
    pub(crate) inner: &'a dyn RecordSink,
    pub(crate) query: &'a Query,
}

impl RecordSink for AnnotatingSink<'_> {
    fn accept(&self, record: &BusinessRecord) {
        let mut record = record.clone();
        record.annotate(self.query);
        self.inner.accept(&record);
    }
}
