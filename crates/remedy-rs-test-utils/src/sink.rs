use async_trait::async_trait;
use parking_lot::Mutex;
use remedy_rs_protocol::{ComplaintSink, SinkError, SinkRow};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Sink that accepts every row and keeps it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    rows: Arc<Mutex<Vec<SinkRow>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<SinkRow> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl ComplaintSink for RecordingSink {
    async fn insert(&self, row: &SinkRow) -> Result<(), SinkError> {
        self.rows.lock().push(row.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Sink with a fixed column set: rows carrying other columns are rejected
/// with `UnknownFields`, like a warehouse table would.
#[derive(Debug, Clone)]
pub struct SchemaSink {
    columns: BTreeSet<String>,
    attempts: Arc<Mutex<usize>>,
    rows: Arc<Mutex<Vec<SinkRow>>>,
}

impl SchemaSink {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            attempts: Arc::new(Mutex::new(0)),
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn rows(&self) -> Vec<SinkRow> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl ComplaintSink for SchemaSink {
    async fn insert(&self, row: &SinkRow) -> Result<(), SinkError> {
        *self.attempts.lock() += 1;
        let unknown: Vec<String> = row
            .keys()
            .filter(|key| !self.columns.contains(*key))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(SinkError::UnknownFields(unknown));
        }
        self.rows.lock().push(row.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "schema"
    }
}

#[derive(Debug, Clone, Default)]
pub struct FailingSink {
    attempts: Arc<Mutex<usize>>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl ComplaintSink for FailingSink {
    async fn insert(&self, _row: &SinkRow) -> Result<(), SinkError> {
        *self.attempts.lock() += 1;
        Err(SinkError::Transport("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
