/// Per-session history registry.
///
/// Each editing session owns one `HistoryManager` behind its own lock, so
/// concurrent requests against the same session are serialized while
/// different sessions proceed independently.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};

use crate::checkpoint::Snapshot;
use crate::config::HistoryConfig;
use crate::manager::HistoryManager;
use crate::persistence::HistoryStore;

/// Shared handle to one session's history.
pub type SessionHandle = Arc<Mutex<HistoryManager>>;

/// Maps session IDs to their histories, optionally backed by a store.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    config: HistoryConfig,
    /// Optional disk persistence (None = in-memory only).
    store: Option<Arc<HistoryStore>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.sessions.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("SessionRegistry")
            .field("open_sessions", &open)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(config: HistoryConfig, store: Option<Arc<HistoryStore>>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            store,
        }
    }

    /// Registry without persistence, using default config.
    pub fn in_memory() -> Self {
        Self::new(
            HistoryConfig {
                max_history: crate::config::DEFAULT_MAX_HISTORY,
                data_dir: std::path::PathBuf::from("."),
            },
            None,
        )
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Returns the session's history, loading it from the store or seeding
    /// an empty baseline when the session is new.
    ///
    /// The store is read without holding the registry lock, so a slow load
    /// never blocks requests for other sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to read.
    pub fn get_or_create(&self, session_id: &str) -> Result<SessionHandle> {
        if let Some(handle) = self.lock_sessions()?.get(session_id) {
            return Ok(Arc::clone(handle));
        }

        let stored = match &self.store {
            Some(store) => store
                .load(session_id, &self.config)
                .with_context(|| format!("Failed to load history for {session_id}"))?,
            None => None,
        };
        let history = match stored {
            Some(history) => {
                tracing::debug!(session_id, len = history.len(), "Loaded stored history");
                history
            }
            None => {
                tracing::debug!(session_id, "Starting new history");
                HistoryManager::new(Snapshot::empty(), &self.config)
            }
        };

        // Another request may have opened the session while we were loading.
        let handle = self
            .lock_sessions()?
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(history)))
            .clone();
        Ok(handle)
    }

    /// Starts (or restarts) a session with the given baseline, discarding
    /// any existing history for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to write.
    pub fn begin(&self, session_id: &str, baseline: Snapshot) -> Result<()> {
        let config = self.config.clone();
        self.with_session(session_id, move |history| {
            *history = HistoryManager::new(baseline, &config);
        })
    }

    /// Runs `f` with exclusive access to the session's history and saves
    /// the result if it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or saving the session fails.
    pub fn with_session<T>(&self, session_id: &str, f: impl FnOnce(&mut HistoryManager) -> T) -> Result<T> {
        let handle = self.get_or_create(session_id)?;
        let mut history = handle
            .lock()
            .map_err(|_| anyhow!("History lock for {session_id} was poisoned"))?;

        let out = f(&mut history);

        if history.is_dirty() {
            if let Some(store) = &self.store {
                store
                    .save(session_id, &history)
                    .with_context(|| format!("Failed to save history for {session_id}"))?;
            }
            history.mark_clean();
        }
        Ok(out)
    }

    /// Forgets a session and deletes its stored history.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to delete.
    pub fn close(&self, session_id: &str) -> Result<()> {
        self.lock_sessions()?.remove(session_id);
        if let Some(store) = &self.store {
            store
                .delete(session_id)
                .with_context(|| format!("Failed to delete history for {session_id}"))?;
        }
        Ok(())
    }

    /// IDs of the sessions currently held in memory.
    pub fn open_sessions(&self) -> Vec<String> {
        self.sessions
            .lock()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<String, SessionHandle>>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("Session registry lock was poisoned"))
    }
}
