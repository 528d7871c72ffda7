//! HTTP and file-backed collaborators for the complaint engine: the OpenAI
//! chat/vision client, the BigQuery and JSONL sinks, and the factory that
//! builds them from config.

mod bigquery;
mod error;
mod factory;
mod jsonl;
mod openai;

pub use bigquery::BigQuerySink;
pub use error::ProviderError;
pub use factory::{Providers, build_providers};
pub use jsonl::{DiscardSink, JsonlSink};
pub use openai::OpenAiClient;
