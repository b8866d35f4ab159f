/// Checkpoint history with a cursor.
///
/// The history is a linear list of checkpoints. Undo and redo move the
/// cursor one step; restore jumps anywhere. Only recording a new edit
/// discards the checkpoints above the cursor.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checkpoint::{Checkpoint, EditAction, NewCheckpoint, Snapshot};
use crate::config::HistoryConfig;
use crate::error::HistoryError;

/// Action name of the baseline checkpoint.
pub const BASELINE_ACTION: &str = "Initial State";

/// Manages the checkpoint history of a single editing session.
///
/// Never empty: the list always holds at least the baseline, and the
/// cursor always points at a valid entry.
pub struct HistoryManager {
    /// Ordered checkpoints, oldest first.
    checkpoints: Vec<Checkpoint>,
    /// Index of the checkpoint currently reflected in the editor.
    cursor: usize,
    /// Checkpoint the history returns to on reset.
    baseline: Checkpoint,
    /// Depth cap, at least 1.
    max_history: usize,
    /// Whether state has changed since the last `mark_clean`.
    dirty: bool,
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("len", &self.checkpoints.len())
            .field("cursor", &self.cursor)
            .field("max_history", &self.max_history)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl HistoryManager {
    /// Creates a history seeded with `baseline` as its only checkpoint.
    pub fn new(baseline: Snapshot, config: &HistoryConfig) -> Self {
        let baseline = NewCheckpoint::new(baseline, BASELINE_ACTION).into_checkpoint(0, Utc::now());
        Self {
            checkpoints: vec![baseline.clone()],
            cursor: 0,
            baseline,
            max_history: config.max_history.max(1),
            dirty: true,
        }
    }

    /// Creates a history with an empty baseline and default config.
    ///
    /// Convenience constructor for tests and simple usage.
    pub fn in_memory() -> Self {
        Self::new(
            Snapshot::empty(),
            &HistoryConfig {
                max_history: crate::config::DEFAULT_MAX_HISTORY,
                data_dir: std::path::PathBuf::from("."),
            },
        )
    }

    /// Rebuilds a history from stored parts, checking its invariants.
    ///
    /// Returns `None` if the parts do not describe a valid history.
    pub fn from_parts(
        baseline: Checkpoint,
        mut checkpoints: Vec<Checkpoint>,
        cursor: usize,
        config: &HistoryConfig,
    ) -> Option<Self> {
        if cursor >= checkpoints.len() {
            return None;
        }
        for (i, cp) in checkpoints.iter_mut().enumerate() {
            cp.sequence_index = i;
        }
        let mut manager = Self {
            checkpoints,
            cursor,
            baseline,
            max_history: config.max_history.max(1),
            dirty: false,
        };
        manager.enforce_depth();
        Some(manager)
    }

    /// Records a new checkpoint labelled `action_label`.
    ///
    /// Discards every checkpoint above the cursor first; afterwards the new
    /// checkpoint is current and nothing can be redone.
    pub fn record(&mut self, snapshot: Snapshot, action_label: impl Into<String>) -> &Checkpoint {
        self.push(NewCheckpoint::new(snapshot, action_label))
    }

    /// Records a new checkpoint described by a typed edit action.
    pub fn record_action(&mut self, snapshot: Snapshot, edit: &EditAction) -> &Checkpoint {
        self.push(NewCheckpoint::from_action(snapshot, edit))
    }

    /// Records a fully specified checkpoint. See [`HistoryManager::record`].
    pub fn push(&mut self, entry: NewCheckpoint) -> &Checkpoint {
        let pruned = self.checkpoints.len() - (self.cursor + 1);
        if pruned > 0 {
            self.checkpoints.truncate(self.cursor + 1);
            tracing::debug!(pruned, "Discarded redo branch");
        }

        let timestamp = self.next_timestamp();
        let index = self.checkpoints.len();
        self.checkpoints.push(entry.into_checkpoint(index, timestamp));
        self.cursor = index;
        self.enforce_depth();
        self.dirty = true;

        &self.checkpoints[self.cursor]
    }

    /// Steps back one checkpoint.
    ///
    /// # Errors
    ///
    /// [`HistoryError::AtHistoryStart`] if the cursor is on the first checkpoint.
    pub fn undo(&mut self) -> Result<&Checkpoint, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::AtHistoryStart);
        }
        self.cursor -= 1;
        self.dirty = true;
        Ok(&self.checkpoints[self.cursor])
    }

    /// Steps forward one checkpoint.
    ///
    /// # Errors
    ///
    /// [`HistoryError::AtHistoryEnd`] if the cursor is on the last checkpoint.
    pub fn redo(&mut self) -> Result<&Checkpoint, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::AtHistoryEnd);
        }
        self.cursor += 1;
        self.dirty = true;
        Ok(&self.checkpoints[self.cursor])
    }

    /// Jumps to the checkpoint at `index`. Later checkpoints stay redo-able.
    ///
    /// # Errors
    ///
    /// [`HistoryError::IndexOutOfRange`] if `index` is not in the timeline.
    pub fn restore(&mut self, index: usize) -> Result<&Checkpoint, HistoryError> {
        if index >= self.checkpoints.len() {
            return Err(HistoryError::IndexOutOfRange);
        }
        if self.cursor != index {
            self.cursor = index;
            self.dirty = true;
        }
        Ok(&self.checkpoints[self.cursor])
    }

    /// Discards every checkpoint and returns to the baseline.
    pub fn reset(&mut self) -> &Checkpoint {
        tracing::debug!(discarded = self.checkpoints.len(), "Resetting history");
        let mut baseline = self.baseline.clone();
        baseline.sequence_index = 0;
        self.checkpoints.clear();
        self.checkpoints.push(baseline);
        self.cursor = 0;
        self.dirty = true;
        &self.checkpoints[0]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.checkpoints.len()
    }

    /// The checkpoint currently reflected in the editor.
    pub fn current(&self) -> &Checkpoint {
        &self.checkpoints[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Reads a checkpoint without moving the cursor.
    pub fn checkpoint(&self, index: usize) -> Option<&Checkpoint> {
        self.checkpoints.get(index)
    }

    /// All checkpoints, oldest first.
    pub fn timeline(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn baseline(&self) -> &Checkpoint {
        &self.baseline
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Whether state has changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Summary published to the UI.
    pub fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            current_index: self.cursor,
            actions: self
                .checkpoints
                .iter()
                .map(|cp| ActionSummary {
                    timestamp: cp.timestamp,
                    action_label: cp.action_label.clone(),
                    action: cp.action.clone(),
                    details: cp.details.format(),
                    current: cp.sequence_index == self.cursor,
                })
                .collect(),
        }
    }

    /// Timestamps never go backwards within a history, even if the clock does.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.checkpoints.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    /// Drops the oldest checkpoints beyond the depth cap and renumbers.
    fn enforce_depth(&mut self) {
        let len = self.checkpoints.len();
        if len <= self.max_history {
            return;
        }
        // Never drop the current checkpoint.
        let excess = (len - self.max_history).min(self.cursor);
        if excess == 0 {
            return;
        }
        self.checkpoints.drain(..excess);
        self.cursor -= excess;
        for (i, cp) in self.checkpoints.iter_mut().enumerate() {
            cp.sequence_index = i;
        }
        tracing::debug!(dropped = excess, "History exceeded max depth");
    }
}

/// One timeline entry as shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub timestamp: DateTime<Utc>,
    pub action_label: String,
    pub action: String,
    pub details: Vec<String>,
    pub current: bool,
}

/// The history state published to callers after every operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub current_index: usize,
    pub actions: Vec<ActionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HistoryError;
    use serde_json::json;

    fn snap(name: &str) -> Snapshot {
        Snapshot::new(json!({ "blocks": [name] })).expect("snapshot")
    }

    fn small_config(max_history: usize) -> HistoryConfig {
        HistoryConfig {
            max_history,
            data_dir: std::path::PathBuf::from("."),
        }
    }

    fn with_baseline() -> HistoryManager {
        HistoryManager::new(snap("B0"), &small_config(50))
    }

    fn snapshots(mgr: &HistoryManager) -> Vec<Snapshot> {
        mgr.timeline().iter().map(|cp| cp.snapshot.clone()).collect()
    }

    // --- Basic state machine ---

    #[test]
    fn test_initial_state() {
        let mgr = with_baseline();
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.cursor(), 0);
        assert!(!mgr.can_undo());
        assert!(!mgr.can_redo());
        assert_eq!(mgr.current().snapshot, snap("B0"));
        assert_eq!(mgr.current().action, BASELINE_ACTION);
    }

    #[test]
    fn test_in_memory_starts_from_empty_snapshot() {
        let mgr = HistoryManager::in_memory();
        assert_eq!(mgr.current().snapshot, Snapshot::empty());
        assert_eq!(mgr.max_history(), crate::config::DEFAULT_MAX_HISTORY);
    }

    #[test]
    fn test_record_makes_new_checkpoint_current() {
        let mut mgr = with_baseline();
        for i in 0..5 {
            let label = format!("edit{i}");
            let cp = mgr.record(snap(&label), label.clone());
            assert_eq!(cp.action_label, label);
            assert_eq!(mgr.current().snapshot, snap(&label));
            assert!(!mgr.can_redo());
            assert!(mgr.can_undo());
        }
    }

    #[test]
    fn test_undo_at_start_leaves_state_unchanged() {
        let mut mgr = with_baseline();
        assert_eq!(mgr.undo().unwrap_err(), HistoryError::AtHistoryStart);
        assert_eq!(mgr.cursor(), 0);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_redo_at_end_fails() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        assert_eq!(mgr.redo().unwrap_err(), HistoryError::AtHistoryEnd);
        assert_eq!(mgr.cursor(), 1);
    }

    #[test]
    fn test_undo_then_redo_returns_same_checkpoint() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");
        let before = mgr.current().clone();

        mgr.undo().expect("undo");
        let after = mgr.redo().expect("redo").clone();
        assert_eq!(after, before);
    }

    #[test]
    fn test_undo_walks_one_step_at_a_time() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");

        assert_eq!(mgr.undo().expect("undo").snapshot, snap("S1"));
        assert_eq!(mgr.undo().expect("undo").snapshot, snap("B0"));
        assert!(mgr.undo().is_err());
        assert_eq!(mgr.len(), 3);
    }

    // --- Pruning ---

    #[test]
    fn test_record_after_undo_prunes_redo_branch() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        assert_eq!(mgr.cursor(), 1);
        mgr.record(snap("S2"), "edit2");
        assert_eq!(mgr.cursor(), 2);

        let cp = mgr.undo().expect("undo");
        assert_eq!(cp.snapshot, snap("S1"));
        assert_eq!(mgr.cursor(), 1);
        assert!(mgr.can_redo());

        mgr.record(snap("S3"), "edit3");
        assert_eq!(snapshots(&mgr), vec![snap("B0"), snap("S1"), snap("S3")]);
        assert_eq!(mgr.cursor(), 2);
        assert!(!mgr.can_redo());
    }

    #[test]
    fn test_pruned_checkpoints_unreachable() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");
        mgr.record(snap("S3"), "edit3");
        mgr.undo().expect("undo");
        mgr.undo().expect("undo");
        mgr.record(snap("S4"), "edit4");

        while mgr.undo().is_ok() {}
        let mut seen = vec![mgr.current().snapshot.clone()];
        while let Ok(cp) = mgr.redo() {
            seen.push(cp.snapshot.clone());
        }
        assert_eq!(seen, vec![snap("B0"), snap("S1"), snap("S4")]);
    }

    // --- Restore ---

    #[test]
    fn test_restore_preserves_later_checkpoints() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");

        let cp = mgr.restore(0).expect("restore");
        assert_eq!(cp.snapshot, snap("B0"));
        assert_eq!(mgr.cursor(), 0);
        assert!(mgr.can_redo());
        assert_eq!(mgr.len(), 3);

        assert_eq!(mgr.redo().expect("redo").snapshot, snap("S1"));
        assert_eq!(mgr.cursor(), 1);
    }

    #[test]
    fn test_restore_out_of_range() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        assert_eq!(mgr.restore(2).unwrap_err(), HistoryError::IndexOutOfRange);
        assert_eq!(mgr.cursor(), 1);
    }

    #[test]
    fn test_restore_sequence_equals_direct_restore() {
        let mut a = with_baseline();
        a.record(snap("S1"), "edit1");
        a.record(snap("S2"), "edit2");
        let mut b = with_baseline();
        b.record(snap("S1"), "edit1");
        b.record(snap("S2"), "edit2");

        a.restore(0).expect("restore");
        a.restore(1).expect("restore");
        b.restore(1).expect("restore");
        assert_eq!(a.cursor(), b.cursor());
        assert_eq!(a.current().snapshot, b.current().snapshot);
        assert_eq!(a.state().can_redo, b.state().can_redo);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");
        mgr.restore(1).expect("restore");
        let first = mgr.state();
        mgr.restore(1).expect("restore");
        assert_eq!(mgr.state(), first);
    }

    // --- Reset ---

    #[test]
    fn test_reset_returns_to_baseline() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");
        mgr.undo().expect("undo");

        let cp = mgr.reset();
        assert_eq!(cp.snapshot, snap("B0"));
        assert_eq!(mgr.len(), 1);
        assert!(!mgr.can_undo());
        assert!(!mgr.can_redo());
    }

    #[test]
    fn test_reset_after_depth_cap_still_uses_baseline() {
        let mut mgr = HistoryManager::new(snap("B0"), &small_config(2));
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");
        assert_eq!(mgr.timeline()[0].snapshot, snap("S1"));

        mgr.reset();
        assert_eq!(snapshots(&mgr), vec![snap("B0")]);
    }

    // --- Depth cap ---

    #[test]
    fn test_depth_cap_drops_oldest_and_renumbers() {
        let mut mgr = HistoryManager::new(snap("B0"), &small_config(3));
        for i in 1..=5 {
            mgr.record(snap(&format!("S{i}")), format!("edit{i}"));
        }
        assert_eq!(snapshots(&mgr), vec![snap("S3"), snap("S4"), snap("S5")]);
        assert_eq!(mgr.cursor(), 2);
        let indices: Vec<usize> = mgr.timeline().iter().map(|cp| cp.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_depth_cap_of_zero_is_one() {
        let mut mgr = HistoryManager::new(snap("B0"), &small_config(0));
        assert_eq!(mgr.max_history(), 1);
        mgr.record(snap("S1"), "edit1");
        assert_eq!(snapshots(&mgr), vec![snap("S1")]);
        assert!(!mgr.can_undo());
    }

    // --- Metadata ---

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut mgr = with_baseline();
        for i in 0..20 {
            mgr.record(snap(&format!("S{i}")), "edit");
        }
        let timeline = mgr.timeline();
        assert!(timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_record_action_uses_description() {
        let mut mgr = with_baseline();
        let edit = EditAction::new("text_edit")
            .with_param("old_text", "a")
            .with_param("new_text", "b");
        let cp = mgr.record_action(snap("S1"), &edit);
        assert_eq!(cp.action, "text_edit");
        assert_eq!(cp.action_label, r#"Changed text from "a" to "b""#);
    }

    #[test]
    fn test_checkpoint_lookup_does_not_move_cursor() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        assert_eq!(mgr.checkpoint(0).expect("exists").snapshot, snap("B0"));
        assert!(mgr.checkpoint(5).is_none());
        assert_eq!(mgr.cursor(), 1);
    }

    #[test]
    fn test_state_marks_current_entry() {
        let mut mgr = with_baseline();
        mgr.record(snap("S1"), "edit1");
        mgr.record(snap("S2"), "edit2");
        mgr.undo().expect("undo");

        let state = mgr.state();
        assert!(state.can_undo);
        assert!(state.can_redo);
        assert_eq!(state.current_index, 1);
        let current: Vec<bool> = state.actions.iter().map(|a| a.current).collect();
        assert_eq!(current, vec![false, true, false]);
        assert_eq!(state.actions[2].action_label, "edit2");
    }

    #[test]
    fn test_state_json_field_names() {
        let mgr = with_baseline();
        let value = serde_json::to_value(mgr.state()).unwrap();
        assert_eq!(value["canUndo"], json!(false));
        assert_eq!(value["canRedo"], json!(false));
        assert_eq!(value["currentIndex"], json!(0));
        assert_eq!(value["actions"][0]["actionLabel"], json!("Initial State"));
        assert!(value["actions"][0]["timestamp"].is_string());
    }

    // --- Dirty tracking ---

    #[test]
    fn test_dirty_tracking() {
        let mut mgr = with_baseline();
        assert!(mgr.is_dirty());
        mgr.mark_clean();

        mgr.restore(0).expect("restore");
        assert!(!mgr.is_dirty());
        assert!(mgr.undo().is_err());
        assert!(!mgr.is_dirty());

        mgr.record(snap("S1"), "edit1");
        assert!(mgr.is_dirty());
    }

    #[test]
    fn test_from_parts_rejects_bad_cursor() {
        let mgr = with_baseline();
        let config = small_config(50);
        let parts = mgr.timeline().to_vec();
        assert!(HistoryManager::from_parts(mgr.baseline().clone(), parts.clone(), 1, &config).is_none());
        assert!(HistoryManager::from_parts(mgr.baseline().clone(), Vec::new(), 0, &config).is_none());

        let rebuilt = HistoryManager::from_parts(mgr.baseline().clone(), parts, 0, &config).expect("valid");
        assert_eq!(rebuilt.len(), 1);
        assert!(!rebuilt.is_dirty());
    }
}
