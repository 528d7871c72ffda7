//! Strict schema checks for remedy JSON5 config layers.

use crate::{ConfigError, SinkColumn};
use serde_json::{Map, Value};

/// Validate one config layer against the schema.
///
/// Layers and the merged config share one schema: every key is optional and
/// unknown keys are rejected.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &[
            "$schema",
            "conversation",
            "extraction",
            "sink",
            "generator",
            "sessions",
            "server",
        ],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("conversation") {
        validate_conversation(value, layer, "conversation")?;
    }
    if let Some(value) = map.get("extraction") {
        validate_extraction(value, layer, "extraction")?;
    }
    if let Some(value) = map.get("sink") {
        validate_sink(value, layer, "sink")?;
    }
    if let Some(value) = map.get("generator") {
        validate_generator(value, layer, "generator")?;
    }
    if let Some(value) = map.get("sessions") {
        validate_sessions(value, layer, "sessions")?;
    }
    if let Some(value) = map.get("server") {
        validate_server(value, layer, "server")?;
    }
    Ok(())
}

fn validate_conversation(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let keys = [
        "history_window",
        "text_window_ms",
        "image_window_ms",
        "same_media_window_ms",
    ];
    ensure_allowed_keys(map, &keys, layer, path)?;
    for key in keys {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_extraction(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "phone_min_len",
            "phone_max_len",
            "bare_phone_digits",
            "invalid_city_values",
        ],
        layer,
        path,
    )?;
    for key in ["phone_min_len", "phone_max_len", "bare_phone_digits"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("invalid_city_values") {
        validate_string_array(value, layer, &join_path(path, "invalid_city_values"))?;
    }
    Ok(())
}

fn validate_sink(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "provider",
            "path",
            "project_id",
            "dataset_id",
            "table_id",
            "token_env",
            "unavailable_marker",
            "columns",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("provider") {
        validate_enum(
            value,
            &["jsonl", "bigquery", "none"],
            layer,
            &join_path(path, "provider"),
        )?;
    }
    for key in [
        "path",
        "project_id",
        "dataset_id",
        "table_id",
        "token_env",
        "unavailable_marker",
    ] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("columns") {
        validate_sink_columns(value, layer, &join_path(path, "columns"))?;
    }
    Ok(())
}

/// Column keys are the logical column names; values are physical names.
fn validate_sink_columns(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed: Vec<&str> = SinkColumn::ALL.iter().map(SinkColumn::key).collect();
    ensure_allowed_keys(map, &allowed, layer, path)?;
    for (key, value) in map {
        expect_string(value, layer, &join_path(path, key))?;
    }
    Ok(())
}

fn validate_generator(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "provider",
            "base_url",
            "model",
            "vision_model",
            "api_key_env",
            "timeout_secs",
            "instructions",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("provider") {
        validate_enum(value, &["openai"], layer, &join_path(path, "provider"))?;
    }
    for key in [
        "base_url",
        "model",
        "vision_model",
        "api_key_env",
        "instructions",
    ] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("timeout_secs") {
        expect_u64(value, layer, &join_path(path, "timeout_secs"))?;
    }
    Ok(())
}

fn validate_sessions(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["enabled", "path"], layer, path)?;
    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

fn validate_server(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["bind", "token_env", "api_base"], layer, path)?;
    for (key, value) in map {
        expect_string(value, layer, &join_path(path, key))?;
    }
    Ok(())
}

/// Expect a string drawn from a closed set.
fn validate_enum(
    value: &Value,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match value.as_str() {
        Some(text) if allowed.contains(&text) => Ok(()),
        Some(text) => Err(invalid_field(
            layer,
            path,
            &format!("unsupported value `{text}` (expected one of {})", allowed.join(", ")),
        )),
        None => Err(invalid_field(layer, path, "expected string")),
    }
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value {
        Value::String(_) => Ok(()),
        _ => Err(invalid_field(layer, path, "expected string")),
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value {
        Value::Bool(_) => Ok(()),
        _ => Err(invalid_field(layer, path, "expected bool")),
    }
}

/// Non-negative integer.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn validate_string_array(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Value::Array(items) = value else {
        return Err(invalid_field(layer, path, "expected array"));
    };
    for (idx, item) in items.iter().enumerate() {
        expect_string(item, layer, &format!("{path}[{idx}]"))?;
    }
    Ok(())
}

fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
