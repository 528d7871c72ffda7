//! Session persistence using JSONL snapshot logs.

use crate::types::Session;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot log format.
const SCHEMA_VERSION: u32 = 1;

/// Persistent backing for the session store.
pub trait StateStore: Send + Sync {
    /// Persist the latest state of a session.
    fn save_session(&self, session: &Session) -> Result<(), StateError>;
    /// Load the latest state of a session.
    fn load_session(&self, user_id: &str) -> Result<Option<Session>, StateError>;
    /// List the users with a persisted session.
    fn list_users(&self) -> Result<Vec<String>, StateError>;
}

/// Errors returned by the state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    #[error("missing schema header")]
    MissingHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SnapshotEvent {
    SchemaVersion {
        version: u32,
    },
    Snapshot {
        saved_at: DateTime<Utc>,
        session: Box<Session>,
    },
}

/// Append-only JSONL store: one file per user, one snapshot per saved turn.
/// The last snapshot wins on load.
pub struct JsonlStateStore {
    root: PathBuf,
    /// Serializes writers across users.
    write_lock: Mutex<()>,
}

impl JsonlStateStore {
    /// Create a store under `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StateError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL state store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn log_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", file_stem(user_id)))
    }

    fn read_log(&self, path: &Path) -> Result<Option<Session>, StateError> {
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(OpenOptions::new().read(true).open(path)?);
        let mut version = None;
        let mut latest = None;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SnapshotEvent>(&line)? {
                SnapshotEvent::SchemaVersion { version: found } => {
                    if found > SCHEMA_VERSION {
                        return Err(StateError::UnsupportedSchema(found));
                    }
                    version = Some(found);
                }
                SnapshotEvent::Snapshot { session, .. } => latest = Some(*session),
            }
        }
        version.ok_or(StateError::MissingHeader)?;
        Ok(latest)
    }
}

impl StateStore for JsonlStateStore {
    fn save_session(&self, session: &Session) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();
        let path = self.log_path(&session.id);
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            let header = SnapshotEvent::SchemaVersion {
                version: SCHEMA_VERSION,
            };
            writeln!(file, "{}", serde_json::to_string(&header)?)?;
        }
        let event = SnapshotEvent::Snapshot {
            saved_at: Utc::now(),
            session: Box::new(session.clone()),
        };
        writeln!(file, "{}", serde_json::to_string(&event)?)?;
        debug!(
            "saved session snapshot (user_id={}, step={}, history_len={})",
            session.id,
            session.step,
            session.history.len()
        );
        Ok(())
    }

    fn load_session(&self, user_id: &str) -> Result<Option<Session>, StateError> {
        self.read_log(&self.log_path(user_id))
    }

    fn list_users(&self) -> Result<Vec<String>, StateError> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(session) = self.read_log(&path)? {
                users.push(session.id);
            }
        }
        users.sort();
        Ok(users)
    }
}

/// File name for a user id. `[A-Za-z0-9_-]` is kept and every other byte
/// becomes `~xx`, so distinct ids never share a file.
fn file_stem(user_id: &str) -> String {
    let mut stem = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("~{byte:02x}"));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::{JsonlStateStore, StateError, StateStore};
    use crate::types::{Field, Session};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn latest_snapshot_wins() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlStateStore::new(temp.path()).expect("store");
        let mut session = Session::new("5731", Utc::now());
        store.save_session(&session).expect("first save");
        session.fields.set(Field::City, "Bogotá");
        store.save_session(&session).expect("second save");

        let loaded = store
            .load_session("5731")
            .expect("load")
            .expect("session");
        assert_eq!(loaded, session);
        assert_eq!(store.list_users().expect("users"), vec!["5731".to_string()]);
        assert_eq!(store.load_session("unknown").expect("load"), None);
    }

    #[test]
    fn rejects_newer_schema() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlStateStore::new(temp.path()).expect("store");
        fs::write(
            temp.path().join("9.jsonl"),
            "{\"type\":\"schema_version\",\"version\":7}\n",
        )
        .expect("write");
        let err = store.load_session("9").expect_err("schema");
        assert!(matches!(err, StateError::UnsupportedSchema(7)));
    }

    #[test]
    fn user_ids_are_sanitized_for_file_names() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlStateStore::new(temp.path()).expect("store");
        store
            .save_session(&Session::new("../escape", Utc::now()))
            .expect("save");
        assert!(temp.path().join("~2e~2e~2fescape.jsonl").exists());
        let loaded = store.load_session("../escape").expect("load");
        assert_eq!(loaded.map(|session| session.id), Some("../escape".to_string()));
    }

    #[test]
    fn similar_user_ids_keep_separate_files() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlStateStore::new(temp.path()).expect("store");
        let mut slash = Session::new("a/b", Utc::now());
        slash.fields.set(Field::City, "Cali");
        store.save_session(&slash).expect("save slash");
        store
            .save_session(&Session::new("a_b", Utc::now()))
            .expect("save underscore");

        let loaded = store.load_session("a/b").expect("load").expect("session");
        assert_eq!(loaded.id, "a/b");
        assert_eq!(loaded.fields.city.as_deref(), Some("Cali"));
        let loaded = store.load_session("a_b").expect("load").expect("session");
        assert_eq!(loaded.id, "a_b");
        assert_eq!(
            store.list_users().expect("users"),
            vec!["a/b".to_string(), "a_b".to_string()]
        );
    }
}
