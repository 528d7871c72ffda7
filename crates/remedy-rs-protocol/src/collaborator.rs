//! Contracts for the external collaborators the engine talks to.

use crate::{ImageInput, PrescriptionData, ReplyRequest, SinkRow};
use async_trait::async_trait;

/// Errors returned by the image and text collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or answered with an error status.
    #[error("request failed: {0}")]
    Request(String),
    /// The collaborator answered but the content could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The prescription was read but lists no medications.
    #[error("prescription lists no medications")]
    NoMedications,
    /// Collaborator is not configured.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the persistence sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The sink schema does not know these columns.
    #[error("unknown fields: {}", .0.join(", "))]
    UnknownFields(Vec<String>),
    /// The sink refused the row for another reason.
    #[error("row rejected: {0}")]
    Rejected(String),
    /// The sink could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Image understanding: turns a prescription photo into structured data.
#[async_trait]
pub trait PrescriptionReader: Send + Sync {
    /// Read a prescription image.
    async fn read(&self, image: &ImageInput) -> Result<PrescriptionData, CollaboratorError>;
}

/// Free-text generator producing the assistant's conversational replies.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce one reply for the given context and recent history.
    async fn generate(&self, request: &ReplyRequest) -> Result<String, CollaboratorError>;
}

/// Persistence sink receiving one flat row per finalized complaint.
#[async_trait]
pub trait ComplaintSink: Send + Sync {
    /// Insert a single row.
    async fn insert(&self, row: &SinkRow) -> Result<(), SinkError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "sink"
    }
}
