//! In-memory session store with optional persistence via `StateStore`.

use crate::error::RemedyCoreError;
use crate::state::StateStore;
use crate::types::Session;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle to one user's session. Holding the lock serializes that user's turns.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Session storage keyed by user id.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    state_store: Option<Arc<dyn StateStore>>,
}

impl SessionStore {
    /// Create a store with an optional persistent backend.
    pub fn new(state_store: Option<Arc<dyn StateStore>>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            state_store,
        }
    }

    /// Look up a session without creating it, consulting the backend on a
    /// cache miss.
    pub fn get(&self, user_id: &str) -> Result<Option<SessionHandle>, RemedyCoreError> {
        if let Some(handle) = self.sessions.read().get(user_id).cloned() {
            return Ok(Some(handle));
        }
        let Some(store) = &self.state_store else {
            return Ok(None);
        };
        let Some(session) = store
            .load_session(user_id)
            .map_err(|err| RemedyCoreError::State(err.to_string()))?
        else {
            return Ok(None);
        };
        debug!("loaded session from store (user_id={})", user_id);
        Ok(Some(self.insert(session)))
    }

    /// Return the user's session, creating it on first contact.
    pub fn get_or_create(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionHandle, RemedyCoreError> {
        if let Some(handle) = self.get(user_id)? {
            return Ok(handle);
        }
        info!("created session (user_id={})", user_id);
        Ok(self.insert(Session::new(user_id, now)))
    }

    /// Restart a user's conversation, keeping name and complaint history.
    pub async fn reset(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionHandle, RemedyCoreError> {
        let handle = self.get_or_create(user_id, now)?;
        {
            let mut session = handle.lock().await;
            session.restart(now);
            self.persist(&session)?;
        }
        info!("reset session (user_id={})", user_id);
        Ok(handle)
    }

    /// Write the session to the backend, when one is configured.
    pub fn persist(&self, session: &Session) -> Result<(), RemedyCoreError> {
        if let Some(store) = &self.state_store {
            store
                .save_session(session)
                .map_err(|err| RemedyCoreError::State(err.to_string()))?;
        }
        Ok(())
    }

    /// Clone of the current session state.
    pub async fn snapshot(&self, user_id: &str) -> Result<Option<Session>, RemedyCoreError> {
        match self.get(user_id)? {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    /// Number of sessions held in memory.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Insert unless another task raced us; the first insert wins.
    fn insert(&self, session: Session) -> SessionHandle {
        let mut sessions = self.sessions.write();
        sessions
            .entry(session.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStore;
    use crate::state::JsonlStateStore;
    use crate::types::Field;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use remedy_rs_protocol::ConversationStep;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_once_per_user() {
        let store = SessionStore::new(None);
        let now = Utc::now();
        let first = store.get_or_create("1", now).expect("create");
        let second = store.get_or_create("1", now).expect("get");
        assert!(Arc::ptr_eq(&first, &second));
        store.get_or_create("2", now).expect("create");
        assert_eq!(store.len(), 2);
        assert!(store.get("3").expect("get").is_none());
    }

    #[tokio::test]
    async fn persists_and_reloads_sessions() {
        let root = tempdir().expect("root");
        let backend = Arc::new(JsonlStateStore::new(root.path()).expect("state"));
        let store = SessionStore::new(Some(backend));
        let now = Utc::now();
        let handle = store.get_or_create("77", now).expect("create");
        {
            let mut session = handle.lock().await;
            session.fields.set(Field::Phone, "3001234567");
            store.persist(&session).expect("persist");
        }

        let reopened = SessionStore::new(Some(Arc::new(
            JsonlStateStore::new(root.path()).expect("state"),
        )));
        let session = reopened
            .snapshot("77")
            .await
            .expect("snapshot")
            .expect("session");
        assert_eq!(session.fields.phone.as_deref(), Some("3001234567"));
    }

    #[tokio::test]
    async fn reset_restarts_conversation() {
        let store = SessionStore::new(None);
        let now = Utc::now();
        let handle = store.get_or_create("8", now).expect("create");
        handle.lock().await.fields.set(Field::City, "Cali");
        store.reset("8", now).await.expect("reset");
        let session = store.snapshot("8").await.expect("snapshot").expect("session");
        assert_eq!(session.fields.city, None);
        assert_eq!(session.step, ConversationStep::AwaitingPrescription);
        assert!(session.consent_given);
    }
}
