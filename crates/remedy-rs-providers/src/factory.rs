use crate::bigquery::BigQuerySink;
use crate::error::ProviderError;
use crate::jsonl::{DiscardSink, JsonlSink};
use crate::openai::OpenAiClient;
use log::info;
use remedy_rs_config::{RemedyConfig, SinkConfig};
use remedy_rs_protocol::{ComplaintSink, PrescriptionReader, ReplyGenerator};
use std::sync::Arc;

/// Default JSONL sink location when `sink.path` is unset.
const DEFAULT_SINK_PATH: &str = "quejas.jsonl";

/// Collaborators selected by config.
#[derive(Clone)]
pub struct Providers {
    pub reader: Arc<dyn PrescriptionReader>,
    pub generator: Arc<dyn ReplyGenerator>,
    pub sink: Arc<dyn ComplaintSink>,
}

/// Build the reader, generator and sink named in config.
pub fn build_providers(config: &RemedyConfig) -> Result<Providers, ProviderError> {
    let client = match config.generator.provider.as_str() {
        "openai" => Arc::new(OpenAiClient::new(&config.generator)?),
        other => {
            return Err(ProviderError::UnknownProvider {
                kind: "generator",
                name: other.to_string(),
            });
        }
    };
    let sink = build_sink(&config.sink)?;
    info!(
        "providers ready (generator={}, model={}, sink={})",
        config.generator.provider,
        config.generator.model,
        sink.name()
    );
    Ok(Providers {
        reader: client.clone(),
        generator: client,
        sink,
    })
}

fn build_sink(config: &SinkConfig) -> Result<Arc<dyn ComplaintSink>, ProviderError> {
    match config.provider.as_str() {
        "jsonl" => {
            let path = config.path.as_deref().unwrap_or(DEFAULT_SINK_PATH);
            Ok(Arc::new(JsonlSink::new(path)?))
        }
        "bigquery" => Ok(Arc::new(BigQuerySink::new(config)?)),
        "none" => Ok(Arc::new(DiscardSink)),
        other => Err(ProviderError::UnknownProvider {
            kind: "sink",
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::build_sink;
    use crate::ProviderError;
    use pretty_assertions::assert_eq;
    use remedy_rs_config::SinkConfig;
    use tempfile::tempdir;

    #[test]
    fn sink_provider_names_are_checked() {
        let config = SinkConfig {
            provider: "parquet".to_string(),
            ..SinkConfig::default()
        };
        match build_sink(&config) {
            Err(ProviderError::UnknownProvider { kind, name }) => {
                assert_eq!((kind, name.as_str()), ("sink", "parquet"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown sink accepted"),
        }
    }

    #[test]
    fn jsonl_and_none_sinks_build_without_credentials() {
        let temp = tempdir().expect("tempdir");
        let config = SinkConfig {
            path: Some(temp.path().join("q.jsonl").to_string_lossy().to_string()),
            ..SinkConfig::default()
        };
        assert_eq!(build_sink(&config).expect("jsonl").name(), "jsonl");

        let config = SinkConfig {
            provider: "none".to_string(),
            ..SinkConfig::default()
        };
        assert_eq!(build_sink(&config).expect("none").name(), "none");
    }

    #[test]
    fn bigquery_requires_project() {
        let config = SinkConfig {
            provider: "bigquery".to_string(),
            ..SinkConfig::default()
        };
        assert!(matches!(build_sink(&config), Err(ProviderError::Config(_))));
    }
}
