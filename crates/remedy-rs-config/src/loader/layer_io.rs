//! Reading config layers from disk.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SYSTEM_CONFIG_PATH, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether a missing layer file is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Presence {
    /// Discovered locations; absent files are skipped.
    Optional,
    /// Paths named explicitly by the caller.
    Required,
}

/// Read, parse and schema-check one layer.
///
/// Returns `None` only for an absent optional layer.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
    presence: Presence,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let label = layer_label(source, path);
    if presence == Presence::Optional && !path.exists() {
        debug!("skipped absent config layer (layer={})", label);
        return Ok(None);
    }
    let value = parse_layer(&fs::read_to_string(path)?, &label)?;
    debug!(
        "read config layer (layer={}, sections={})",
        label,
        value.as_object().map_or(0, |sections| sections.len())
    );
    Ok(Some(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
            disabled_reason: None,
        },
        value,
    }))
}

fn parse_layer(contents: &str, label: &str) -> Result<Value, ConfigError> {
    let value: Value = json5::from_str(contents)?;
    schema::validate_layer_schema(&value, label)?;
    Ok(value)
}

/// Prefix of schema error paths, e.g. `cwd(/srv/bot/remedy.json5)`.
pub(super) fn layer_label(source: ConfigLayerSource, path: &Path) -> String {
    let kind = match source {
        ConfigLayerSource::System => "system",
        ConfigLayerSource::User => "user",
        ConfigLayerSource::Project => "project",
        ConfigLayerSource::Cwd => "cwd",
        ConfigLayerSource::Runtime => "runtime",
    };
    format!("{kind}({})", path.display())
}

/// `/etc/remedy/remedy.json5` (or the ProgramData path on Windows).
#[cfg(any(unix, windows))]
pub(super) fn default_system_config_path() -> Option<PathBuf> {
    Some(PathBuf::from(SYSTEM_CONFIG_PATH))
}

#[cfg(not(any(unix, windows)))]
pub(super) fn default_system_config_path() -> Option<PathBuf> {
    None
}

/// `~/.remedy/remedy.json5`, when a home directory is known.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    let dir = dirs.home_dir().join(DEFAULT_CONFIG_DIR);
    Some(dir.join(DEFAULT_CONFIG_FILE))
}
