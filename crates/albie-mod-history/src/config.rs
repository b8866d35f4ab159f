/// Configuration and utility functions for the history system.
use std::path::{Path, PathBuf};

/// Maximum number of checkpoints kept per session, baseline included.
/// Oldest checkpoints are dropped when this limit is exceeded.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Configuration for the history system.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Max checkpoints per session. Values below 1 are treated as 1.
    pub max_history: usize,
    /// Root directory for the persistence database.
    pub data_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            data_dir: resolve_data_dir(),
        }
    }
}

/// Resolves the data directory path.
///
/// Resolution order:
/// 1. `ALBIE_DATA_DIR` environment variable
/// 2. `.data/` directory next to the executable
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ALBIE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    exe.parent().unwrap_or(Path::new(".")).join(".data")
}

/// Generates a fresh editing-session ID.
pub fn generate_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4().simple())
}
