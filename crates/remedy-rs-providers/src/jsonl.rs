//! Local sinks: append-only JSONL file and a discarding sink.

use crate::error::ProviderError;
use async_trait::async_trait;
use log::info;
use parking_lot::Mutex;
use remedy_rs_protocol::{ComplaintSink, SinkError, SinkRow};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends one JSON object per complaint to a file.
///
/// With an allowed-column set, rows carrying other columns are rejected with
/// `UnknownFields`, mirroring a fixed warehouse schema.
pub struct JsonlSink {
    path: PathBuf,
    allowed: Option<BTreeSet<String>>,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    /// Create the sink, creating parent directories if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        info!("jsonl sink ready (path={})", path.display());
        Ok(Self {
            path,
            allowed: None,
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_allowed_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ComplaintSink for JsonlSink {
    async fn insert(&self, row: &SinkRow) -> Result<(), SinkError> {
        if let Some(allowed) = &self.allowed {
            let unknown: Vec<String> = row
                .keys()
                .filter(|key| !allowed.contains(*key))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(SinkError::UnknownFields(unknown));
            }
        }
        let line =
            serde_json::to_string(row).map_err(|err| SinkError::Rejected(err.to_string()))?;
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        writeln!(file, "{line}").map_err(|err| SinkError::Transport(err.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Accepts and drops every row. Used when `sink.provider` is `none`.
#[derive(Debug, Clone, Default)]
pub struct DiscardSink;

#[async_trait]
impl ComplaintSink for DiscardSink {
    async fn insert(&self, row: &SinkRow) -> Result<(), SinkError> {
        info!("discarded complaint row (columns={})", row.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}
