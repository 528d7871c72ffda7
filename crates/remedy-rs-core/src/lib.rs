//! Conversation state and data-extraction engine for undelivered-medication
//! complaints.
//!
//! This crate owns the per-user session store, the field extractor and
//! medication selector, the conversation state machine, the completion sink
//! adapter, and the turn engine that wires them to the collaborators.

pub mod completion;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod extract;
pub mod intents;
pub mod machine;
pub mod prompt;
pub mod replies;
pub mod selector;
pub mod sessions;
pub mod state;
pub mod types;

pub use completion::{CompletionAdapter, SaveMode, SaveOutcome};
pub use dedup::DeliveryGuard;
pub use engine::{ComplaintEngine, ComplaintEngineBuilder};
pub use error::RemedyCoreError;
pub use extract::{DateParser, FieldExtractor};
pub use intents::IntentMatcher;
pub use machine::{Answer, ConversationMachine, Evaluation};
pub use prompt::ContextBuilder;
pub use selector::{MedicationSelector, Selection, SelectionVia, UnresolvedReason};
pub use sessions::{SessionHandle, SessionStore};
pub use state::{JsonlStateStore, StateError, StateStore};
pub use types::{Field, Regime, Session};
