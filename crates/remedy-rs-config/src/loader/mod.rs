//! Layered configuration loader.
//!
//! Discovers config layers (system, user, project, cwd, runtime), validates
//! each against the schema, deep-merges them, and produces the effective
//! `RemedyConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;


use crate::{ConfigError, RemedyConfig, SinkColumn};
use layer_io::Presence;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Config filename looked up in local layers.
const DEFAULT_CONFIG_FILE: &str = "remedy.json5";
/// Config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".remedy";
/// Marker entries that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: &str = "/etc/remedy/remedy.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\remedy\\remedy.json5";

/// Sink providers understood by the provider factory.
const KNOWN_SINK_PROVIDERS: &[&str] = &["jsonl", "bigquery", "none"];
/// Generator providers understood by the provider factory.
const KNOWN_GENERATOR_PROVIDERS: &[&str] = &["openai"];

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: RemedyConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Origin of a single config layer, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    System,
    User,
    Project,
    Cwd,
    /// Explicit overrides, applied last.
    Runtime,
}

/// Metadata about a config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    /// Location on disk.
    pub path: Option<PathBuf>,
    /// Reason the layer was skipped, if it was.
    pub disabled_reason: Option<String>,
}

/// Options controlling layer discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Directory used to find the cwd and project layers.
    pub cwd: PathBuf,
    /// System config path (defaults to `/etc/remedy/remedy.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// User config path (defaults to `~/.remedy/remedy.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override paths applied last, in order.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker entries used to detect the project root.
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Options with the default layer locations for `cwd`.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override file.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl RemedyConfig {
    /// Load a single config file (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config (path={})", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load the layered stack using default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load the layered stack.
    ///
    /// Precedence (low -> high): system, user, project root, cwd, runtime.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        info!("loading layered config (cwd={})", cwd.display());
        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen_paths = HashSet::new();

        let mut candidates: Vec<(ConfigLayerSource, PathBuf)> = Vec::new();
        if let Some(path) = options.system_config_path.clone() {
            candidates.push((ConfigLayerSource::System, path));
        }
        if let Some(path) = options.user_config_path.clone() {
            candidates.push((ConfigLayerSource::User, path));
        }
        match utils::find_project_root(&cwd, &options.project_root_markers) {
            Some(root) => {
                debug!("resolved project root (path={})", root.display());
                candidates.push((ConfigLayerSource::Project, root.join(DEFAULT_CONFIG_FILE)));
            }
            None => debug!("project root not found; skipping project layer"),
        }
        candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));

        for (source, path) in candidates {
            if !seen_paths.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if let Some(layer) = layer_io::read_layer(source, &path, Presence::Optional)? {
                merge::merge_json_values(&mut merged, &layer.value);
                layers.push(layer.meta);
            }
        }

        for runtime_path in &options.runtime_paths {
            let layer =
                layer_io::read_layer(ConfigLayerSource::Runtime, runtime_path, Presence::Required)?;
            if let Some(layer) = layer {
                merge::merge_json_values(&mut merged, &layer.value);
                layers.push(layer.meta);
            }
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conversation.history_window == 0 {
            return Err(ConfigError::Invalid(
                "conversation.history_window must be greater than zero".to_string(),
            ));
        }
        let extraction = &self.extraction;
        if extraction.phone_min_len == 0 || extraction.phone_min_len > extraction.phone_max_len {
            return Err(ConfigError::Invalid(format!(
                "extraction phone bounds are inverted (min={}, max={})",
                extraction.phone_min_len, extraction.phone_max_len
            )));
        }
        if extraction.bare_phone_digits == 0 {
            return Err(ConfigError::Invalid(
                "extraction.bare_phone_digits must be greater than zero".to_string(),
            ));
        }
        if !KNOWN_SINK_PROVIDERS.contains(&self.sink.provider.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown sink provider: {}",
                self.sink.provider
            )));
        }
        if self.sink.provider == "bigquery" && self.sink.project_id.is_none() {
            return Err(ConfigError::Invalid(
                "sink.project_id is required for the bigquery provider".to_string(),
            ));
        }
        if !KNOWN_GENERATOR_PROVIDERS.contains(&self.generator.provider.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown generator provider: {}",
                self.generator.provider
            )));
        }
        let mut names = HashSet::new();
        for column in SinkColumn::ALL {
            let name = self.sink.columns.name(column);
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "sink.columns.{} must not be empty",
                    column.key()
                )));
            }
            if !names.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "sink column name used twice: {name}"
                )));
            }
        }
        if self.sessions.enabled && self.sessions.path.is_none() {
            return Err(ConfigError::Invalid(
                "sessions.path is required when sessions are enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// A layer read from disk.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<RemedyConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: RemedyConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
