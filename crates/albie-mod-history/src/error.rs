/// Error types for history navigation.
use thiserror::Error;

/// Expected, recoverable outcomes of a navigation request.
///
/// Callers reflect these as disabled controls; none of them leave the
/// history in a different state than before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Undo requested with no earlier checkpoint.
    #[error("already at the start of history")]
    AtHistoryStart,
    /// Redo requested with no later checkpoint.
    #[error("already at the end of history")]
    AtHistoryEnd,
    /// Restore requested for an index outside the timeline.
    #[error("checkpoint index out of range")]
    IndexOutOfRange,
}

impl HistoryError {
    /// Stable code reported to the UI.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AtHistoryStart => "AtHistoryStart",
            Self::AtHistoryEnd => "AtHistoryEnd",
            Self::IndexOutOfRange => "IndexOutOfRange",
        }
    }
}

/// Rejected snapshot content. A contract violation at the editor boundary,
/// never a navigation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot content must not be null")]
    Null,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_variant_names() {
        assert_eq!(HistoryError::AtHistoryStart.code(), "AtHistoryStart");
        assert_eq!(HistoryError::AtHistoryEnd.code(), "AtHistoryEnd");
        assert_eq!(HistoryError::IndexOutOfRange.code(), "IndexOutOfRange");
    }
}
