//! JSON-lines file sink.

use anyhow::{Context, Result};
use mapharvest_core::BusinessRecord;
use mapharvest_scanner::RecordSink;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Appends one JSON object per record and flushes after each, so an
/// interrupted run keeps everything extracted up to that point.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("creating stream file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn accept(&self, record: &BusinessRecord) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *writer, record)
            .map_err(io::Error::from)
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());

        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "failed to stream record");
        }
    }
}
