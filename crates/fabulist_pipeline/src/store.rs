//! In-memory session and checkpoint stores.

use async_trait::async_trait;
use fabulist_core::SessionState;
use fabulist_error::FabulistResult;
use fabulist_interface::{CheckpointStore, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Session store keeping every state in process memory.
///
/// The outer map lock is only held long enough to find or insert a key's
/// slot; each slot has its own lock, so reads and writes on different
/// sessions never wait on each other.
///
/// # Examples
///
/// ```
/// use fabulist_core::StageName;
/// use fabulist_interface::SessionStore;
/// use fabulist_pipeline::InMemorySessionStore;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = InMemorySessionStore::new();
/// let state = store.get("unseen").await;
/// assert_eq!(*state.state(), StageName::Init);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    slots: Arc<RwLock<HashMap<String, Arc<RwLock<SessionState>>>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions that have been saved.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Whether no session has been saved yet.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    async fn slot(&self, session_key: &str) -> Option<Arc<RwLock<SessionState>>> {
        self.slots.read().await.get(session_key).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self))]
    async fn get(&self, session_key: &str) -> SessionState {
        match self.slot(session_key).await {
            Some(slot) => slot.read().await.clone(),
            None => {
                debug!("Unseen session, returning initial state");
                SessionState::default()
            }
        }
    }

    #[instrument(skip(self, state), fields(stage = %state.state()))]
    async fn save(&self, session_key: &str, state: SessionState) {
        if let Some(slot) = self.slot(session_key).await {
            *slot.write().await = state;
            return;
        }

        let mut slots = self.slots.write().await;
        match slots.get(session_key) {
            // Another writer created the slot between our two lock acquisitions
            Some(slot) => {
                let slot = Arc::clone(slot);
                drop(slots);
                *slot.write().await = state;
            }
            None => {
                slots.insert(session_key.to_string(), Arc::new(RwLock::new(state)));
            }
        }
        debug!("Session saved");
    }
}

/// Checkpoint store keeping serialized continuation markers in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, session_key: &str) -> FabulistResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(session_key).cloned())
    }

    async fn set(&self, session_key: &str, checkpoint: Vec<u8>) -> FabulistResult<()> {
        debug!(session = %session_key, bytes = checkpoint.len(), "Storing checkpoint");
        self.entries
            .write()
            .await
            .insert(session_key.to_string(), checkpoint);
        Ok(())
    }

    async fn delete(&self, session_key: &str) -> FabulistResult<()> {
        self.entries.write().await.remove(session_key);
        Ok(())
    }
}
