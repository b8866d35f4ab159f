/// Checkpoint history for the migration wizard's content editor.
///
/// Provides a `HistoryManager` that records content snapshots as
/// checkpoints and moves a cursor over them (undo, redo, restore, reset),
/// plus a redb-backed `HistoryStore` and a `SessionRegistry` so a session's
/// history survives across requests.
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod session;

pub use checkpoint::{
    ActionDetails, ActionKind, AffectedElement, Checkpoint, EditAction, NewCheckpoint, Snapshot,
};
pub use config::HistoryConfig;
pub use error::{HistoryError, SnapshotError};
pub use manager::{ActionSummary, HistoryManager, HistoryState};
pub use persistence::HistoryStore;
pub use session::{SessionHandle, SessionRegistry};
