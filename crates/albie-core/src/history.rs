// Re-exports from albie-mod-history for the request layer.
pub use albie_mod_history::config::{generate_session_id, resolve_data_dir};
pub use albie_mod_history::{
    ActionDetails, ActionKind, Checkpoint, EditAction, HistoryConfig, HistoryError, HistoryManager,
    HistoryState, HistoryStore, NewCheckpoint, SessionRegistry, Snapshot,
};
