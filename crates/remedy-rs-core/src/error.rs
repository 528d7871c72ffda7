//! Error types for the complaint engine.

use thiserror::Error;

/// Errors returned by engine operations.
///
/// Conversation-level failures (extraction misses, unreadable prescriptions,
/// generator or sink errors) are reported inside `TurnOutcome`; only
/// infrastructure failures surface here.
#[derive(Debug, Error)]
pub enum RemedyCoreError {
    /// Session persistence failed.
    #[error("state error: {0}")]
    State(String),
    /// A built-in pattern failed to compile.
    #[error("pattern error: {0}")]
    Pattern(String),
    /// The engine was assembled without a required collaborator.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<regex::Error> for RemedyCoreError {
    fn from(err: regex::Error) -> Self {
        RemedyCoreError::Pattern(err.to_string())
    }
}
