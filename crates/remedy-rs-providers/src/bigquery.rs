//! BigQuery streaming-insert sink.

use crate::error::{ProviderError, require_env};
use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use remedy_rs_config::SinkConfig;
use remedy_rs_protocol::{ComplaintSink, SinkError, SinkRow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

static UNKNOWN_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"no such field:\s*([^.\s]+)").ok());

#[derive(Debug, Serialize)]
struct InsertAllRequest<'a> {
    rows: Vec<InsertRow<'a>>,
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    json: &'a SinkRow,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<RowErrors>,
}

#[derive(Debug, Deserialize)]
struct RowErrors {
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

/// Inserts complaint rows through `tabledata.insertAll`.
#[derive(Clone)]
pub struct BigQuerySink {
    client: Client,
    token: String,
    endpoint: String,
}

impl BigQuerySink {
    /// Build a sink for `project_id.dataset_id.table_id`, reading the bearer
    /// token from `token_env`.
    pub fn new(config: &SinkConfig) -> Result<Self, ProviderError> {
        let project = config
            .project_id
            .as_deref()
            .filter(|project| !project.trim().is_empty())
            .ok_or_else(|| ProviderError::Config("sink.project_id is required".to_string()))?;
        let token = require_env(&config.token_env)?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            token,
            endpoint: format!(
                "{API_BASE}/projects/{project}/datasets/{}/tables/{}/insertAll",
                config.dataset_id, config.table_id
            ),
        })
    }
}

/// Map insert errors to a sink error, preferring unknown-field rejections.
fn classify(response: InsertAllResponse) -> Result<(), SinkError> {
    if response.insert_errors.is_empty() {
        return Ok(());
    }
    let errors: Vec<&ErrorProto> = response
        .insert_errors
        .iter()
        .flat_map(|row| row.errors.iter())
        .collect();

    let mut unknown: Vec<String> = Vec::new();
    if let Some(pattern) = UNKNOWN_FIELD.as_ref() {
        for error in &errors {
            if let Some(caps) = pattern.captures(&error.message) {
                let field = caps[1].to_string();
                if !unknown.contains(&field) {
                    unknown.push(field);
                }
            }
        }
    }
    if !unknown.is_empty() {
        return Err(SinkError::UnknownFields(unknown));
    }

    let summary = errors
        .iter()
        .map(|error| format!("{}: {}", error.reason, error.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(SinkError::Rejected(summary))
}

#[async_trait]
impl ComplaintSink for BigQuerySink {
    async fn insert(&self, row: &SinkRow) -> Result<(), SinkError> {
        let body = InsertAllRequest {
            rows: vec![InsertRow { json: row }],
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|err| SinkError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!("insertAll failed (status={}, body={})", status, body_text);
            return Err(SinkError::Rejected(format!("status {status}")));
        }
        let parsed: InsertAllResponse = response
            .json()
            .await
            .map_err(|err| SinkError::Transport(format!("invalid insertAll response: {err}")))?;
        debug!(
            "insertAll answered (row_errors={})",
            parsed.insert_errors.len()
        );
        classify(parsed)
    }

    fn name(&self) -> &str {
        "bigquery"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(value: serde_json::Value) -> InsertAllResponse {
        serde_json::from_value(value).expect("decode")
    }

    #[test]
    fn empty_insert_errors_is_success() {
        assert_eq!(classify(response(json!({"kind": "bigquery#tableDataInsertAllResponse"}))), Ok(()));
    }

    #[test]
    fn no_such_field_becomes_unknown_fields() {
        let result = classify(response(json!({
            "insertErrors": [{
                "index": 0,
                "errors": [
                    {"reason": "invalid", "location": "ips", "message": "no such field: ips."},
                    {"reason": "invalid", "location": "image_url", "message": "no such field: image_url."},
                    {"reason": "stopped", "message": ""}
                ]
            }]
        })));
        assert_eq!(
            result,
            Err(SinkError::UnknownFields(vec![
                "ips".to_string(),
                "image_url".to_string()
            ]))
        );
    }

    #[test]
    fn other_errors_are_rejections() {
        let result = classify(response(json!({
            "insertErrors": [{"index": 0, "errors": [{"reason": "invalid", "message": "bad date"}]}]
        })));
        assert_eq!(result, Err(SinkError::Rejected("invalid: bad date".to_string())));
    }

    #[test]
    fn rows_are_wrapped_in_json_envelopes() {
        let mut row = SinkRow::new();
        row.insert("PK".to_string(), json!("5731_1"));
        let body = InsertAllRequest {
            rows: vec![InsertRow { json: &row }],
        };
        assert_eq!(
            serde_json::to_value(&body).expect("encode"),
            json!({"rows": [{"json": {"PK": "5731_1"}}]})
        );
    }
}
