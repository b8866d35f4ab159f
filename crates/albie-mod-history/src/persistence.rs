/// Disk persistence layer backed by redb.
///
/// Uses a single redb database file with two tables:
/// - `checkpoints`: serialized `Checkpoint` entries keyed by `(session_id, index)`
/// - `sessions`: per-session metadata (cursor, length, baseline) keyed by `session_id`
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::checkpoint::Checkpoint;
use crate::config::HistoryConfig;
use crate::manager::HistoryManager;

/// Checkpoint table: (session_id, list position) → bincode-serialized Checkpoint.
const CHECKPOINT_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("checkpoints");

/// Session table: session_id → bincode-serialized SessionMeta.
const SESSION_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Per-session metadata persisted alongside the checkpoints.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SessionMeta {
    cursor: usize,
    len: usize,
    baseline: Checkpoint,
}

/// Key range covering every checkpoint of exactly one session.
///
/// Tuple keys compare the session ID as a whole, so no ID can reach into
/// another ID's range whatever characters it contains.
fn session_range(session_id: &str) -> RangeInclusive<(&str, u64)> {
    (session_id, 0)..=(session_id, u64::MAX)
}

/// Persistence layer for session histories backed by redb.
///
/// Thread-safe: redb supports concurrent readers and serialized writers.
/// Shared across sessions via `Arc<HistoryStore>`.
pub struct HistoryStore {
    db: Database,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").finish()
    }
}

impl HistoryStore {
    /// Opens or creates the history database in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// cannot be opened.
    pub fn open(data_dir: &Path) -> Result<Arc<Self>> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("history.redb");
        let db = Database::create(&db_path)
            .with_context(|| format!("Failed to open history database: {}", db_path.display()))?;

        // Ensure tables exist
        let write_txn = db
            .begin_write()
            .context("Failed to begin initial write transaction")?;
        {
            let _ = write_txn
                .open_table(CHECKPOINT_TABLE)
                .context("Failed to create checkpoints table")?;
            let _ = write_txn
                .open_table(SESSION_TABLE)
                .context("Failed to create sessions table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initial transaction")?;

        tracing::debug!("Opened history database at {}", db_path.display());
        Ok(Arc::new(Self { db }))
    }

    /// Replaces the stored history of a session in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write transaction fails.
    pub fn save(&self, session_id: &str, history: &HistoryManager) -> Result<()> {
        let meta = SessionMeta {
            cursor: history.cursor(),
            len: history.len(),
            baseline: history.baseline().clone(),
        };
        let meta_bytes = bincode::serialize(&meta).context("Failed to serialize session metadata")?;

        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(CHECKPOINT_TABLE)
                .context("Failed to open checkpoints table")?;

            for index in Self::session_indices(&table, session_id)? {
                table
                    .remove((session_id, index))
                    .context("Failed to remove stale checkpoint")?;
            }

            for (index, checkpoint) in (0u64..).zip(history.timeline()) {
                let bytes = bincode::serialize(checkpoint).context("Failed to serialize checkpoint")?;
                table
                    .insert((session_id, index), bytes.as_slice())
                    .context("Failed to insert checkpoint")?;
            }
        }
        {
            let mut sessions = write_txn
                .open_table(SESSION_TABLE)
                .context("Failed to open sessions table")?;
            sessions
                .insert(session_id, meta_bytes.as_slice())
                .context("Failed to insert session metadata")?;
        }
        write_txn.commit().context("Failed to commit session history")?;
        Ok(())
    }

    /// Loads the stored history of a session.
    ///
    /// Returns `None` if nothing is stored for the session. A stored history
    /// that fails its invariants is discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction or deserialization fails.
    pub fn load(&self, session_id: &str, config: &HistoryConfig) -> Result<Option<HistoryManager>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;

        let sessions = read_txn
            .open_table(SESSION_TABLE)
            .context("Failed to open sessions table")?;
        let meta: SessionMeta = match sessions.get(session_id).context("Failed to read session metadata")? {
            Some(guard) => bincode::deserialize(guard.value())
                .context("Failed to deserialize session metadata")?,
            None => return Ok(None),
        };

        let table = read_txn
            .open_table(CHECKPOINT_TABLE)
            .context("Failed to open checkpoints table")?;
        let mut checkpoints = Vec::with_capacity(meta.len);
        for entry in table
            .range(session_range(session_id))
            .context("Failed to range query checkpoints table")?
        {
            let (_, value_guard) = entry.context("Failed to read checkpoint entry")?;
            let checkpoint: Checkpoint = bincode::deserialize(value_guard.value())
                .context("Failed to deserialize checkpoint")?;
            checkpoints.push(checkpoint);
        }

        if checkpoints.len() != meta.len {
            tracing::warn!(
                "Stored history for {session_id} has {} checkpoints, expected {}",
                checkpoints.len(),
                meta.len
            );
            return Ok(None);
        }

        let history = HistoryManager::from_parts(meta.baseline, checkpoints, meta.cursor, config);
        if history.is_none() {
            tracing::warn!("Stored history for {session_id} has an invalid cursor");
        }
        Ok(history)
    }

    /// Removes all checkpoints and metadata for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write transaction fails.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(CHECKPOINT_TABLE)
                .context("Failed to open checkpoints table")?;
            for index in Self::session_indices(&table, session_id)? {
                table
                    .remove((session_id, index))
                    .context("Failed to remove checkpoint")?;
            }
        }
        {
            let mut sessions = write_txn
                .open_table(SESSION_TABLE)
                .context("Failed to open sessions table")?;
            sessions
                .remove(session_id)
                .context("Failed to remove session metadata")?;
        }
        write_txn.commit().context("Failed to commit deletion")?;
        Ok(())
    }

    /// Counts the checkpoints stored for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    pub fn count_checkpoints(&self, session_id: &str) -> Result<usize> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(CHECKPOINT_TABLE)
            .context("Failed to open checkpoints table")?;

        let mut count = 0;
        for entry in table
            .range(session_range(session_id))
            .context("Failed to range query for count")?
        {
            entry.context("Failed to read checkpoint entry")?;
            count += 1;
        }
        Ok(count)
    }

    /// Lists all session IDs with a stored history.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(SESSION_TABLE)
            .context("Failed to open sessions table")?;

        let mut session_ids = Vec::new();
        for entry in table.iter().context("Failed to iterate sessions table")? {
            let (key_guard, _) = entry.context("Failed to read session entry")?;
            session_ids.push(key_guard.value().to_string());
        }
        Ok(session_ids)
    }

    /// List positions of the checkpoints stored for a session.
    fn session_indices(
        table: &impl ReadableTable<(&'static str, u64), &'static [u8]>,
        session_id: &str,
    ) -> Result<Vec<u64>> {
        table
            .range(session_range(session_id))
            .context("Failed to range query session checkpoints")?
            .map(|entry| {
                let (key, _) = entry.context("Failed to read checkpoint key")?;
                Ok(key.value().1)
            })
            .collect()
    }
}
