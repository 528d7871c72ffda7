use async_trait::async_trait;
use parking_lot::Mutex;
use remedy_rs_protocol::{CollaboratorError, ReplyGenerator, ReplyRequest};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FixedGenerator {
    reply: String,
}

impl FixedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for FixedGenerator {
    async fn generate(&self, _request: &ReplyRequest) -> Result<String, CollaboratorError> {
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FailingGenerator;

#[async_trait]
impl ReplyGenerator for FailingGenerator {
    async fn generate(&self, _request: &ReplyRequest) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Request("generator offline".to_string()))
    }
}

/// Generator that answers with queued replies (then a fixed fallback) and
/// keeps every request it received.
#[derive(Debug, Clone)]
pub struct RecordingGenerator {
    replies: Arc<Mutex<Vec<String>>>,
    fallback: String,
    requests: Arc<Mutex<Vec<ReplyRequest>>>,
}

impl RecordingGenerator {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            fallback: fallback.into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue replies returned in order before the fallback.
    pub fn with_replies(self, replies: Vec<String>) -> Self {
        let mut queued = replies;
        queued.reverse();
        *self.replies.lock() = queued;
        self
    }

    pub fn requests(&self) -> Vec<ReplyRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ReplyGenerator for RecordingGenerator {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().push(request.clone());
        Ok(self
            .replies
            .lock()
            .pop()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
