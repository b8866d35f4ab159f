/// Core types for checkpoints, snapshots and edit actions.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SnapshotError;

/// Opaque, immutable content state captured by a checkpoint.
///
/// The history never looks inside a snapshot. Clones share the same
/// allocation, so handing a snapshot back to the editor is cheap even for
/// large content trees.
///
/// Serializes as the JSON tree itself for human-readable formats and as
/// compact JSON text for binary formats (bincode cannot carry an untyped
/// JSON value).
#[derive(Clone, PartialEq)]
pub struct Snapshot(Arc<serde_json::Value>);

impl Snapshot {
    /// Wraps editor content. `null` is not a content state.
    pub fn new(content: serde_json::Value) -> Result<Self, SnapshotError> {
        if content.is_null() {
            return Err(SnapshotError::Null);
        }
        Ok(Self(Arc::new(content)))
    }

    /// The empty editor state used as a default baseline.
    pub fn empty() -> Self {
        Self(Arc::new(serde_json::Value::Object(serde_json::Map::new())))
    }

    /// Borrows the wrapped content.
    pub fn content(&self) -> &serde_json::Value {
        &self.0
    }

    /// Whether two snapshots share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({})", self.0)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.0.serialize(serializer)
        } else {
            serializer.serialize_str(&self.0.to_string())
        }
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = if deserializer.is_human_readable() {
            serde_json::Value::deserialize(deserializer)?
        } else {
            let text = String::deserialize(deserializer)?;
            serde_json::from_str(&text).map_err(serde::de::Error::custom)?
        };
        Snapshot::new(value).map_err(serde::de::Error::custom)
    }
}

/// An element touched by an edit, e.g. `{ "type": "paragraph", "id": "b-12" }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AffectedElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Free-form detail attached to a checkpoint for display in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDetails {
    pub affected_elements: Vec<AffectedElement>,
    pub changes_made: Vec<String>,
    pub user_action: String,
    pub location: String,
}

impl ActionDetails {
    /// Renders the details as display lines. Empty sections are skipped.
    pub fn format(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.affected_elements.is_empty() {
            let elements: Vec<String> = self
                .affected_elements
                .iter()
                .map(|el| format!("{} ({})", el.kind, el.id))
                .collect();
            lines.push(format!(
                "Modified {} elements: {}",
                self.affected_elements.len(),
                elements.join(", ")
            ));
        }

        if !self.changes_made.is_empty() {
            lines.push(format!("Changes: {}", self.changes_made.join(", ")));
        }

        if !self.location.is_empty() {
            lines.push(format!("Location: {}", self.location));
        }

        lines
    }
}

/// Piece of a description template.
#[derive(Debug, Clone, Copy)]
enum Segment {
    Text(&'static str),
    Param(&'static str),
}

use Segment::{Param, Text};

/// The kind of edit that produced a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    TextEdit,
    ImageMove,
    BlockAdd,
    BlockDelete,
    BlockMove,
    ImageEdit,
    LayoutChange,
    StyleChange,
    Undo,
    Redo,
    /// Any kind without a dedicated description template.
    Other(String),
}

impl ActionKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::TextEdit => "text_edit",
            Self::ImageMove => "image_move",
            Self::BlockAdd => "block_add",
            Self::BlockDelete => "block_delete",
            Self::BlockMove => "block_move",
            Self::ImageEdit => "image_edit",
            Self::LayoutChange => "layout_change",
            Self::StyleChange => "style_change",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Other(name) => name,
        }
    }

    fn template(&self) -> Option<&'static [Segment]> {
        let segments: &'static [Segment] = match self {
            Self::TextEdit => &[
                Text("Changed text from \""),
                Param("old_text"),
                Text("\" to \""),
                Param("new_text"),
                Text("\""),
            ],
            Self::ImageMove => &[
                Text("Moved image \""),
                Param("image_name"),
                Text("\" from "),
                Param("old_position"),
                Text(" to "),
                Param("new_position"),
            ],
            Self::BlockAdd => &[
                Text("Added new "),
                Param("block_type"),
                Text(" block with content: "),
                Param("content_preview"),
            ],
            Self::BlockDelete => &[
                Text("Removed "),
                Param("block_type"),
                Text(" block containing: "),
                Param("content_preview"),
            ],
            Self::BlockMove => &[
                Text("Moved "),
                Param("block_type"),
                Text(" block from position "),
                Param("old_position"),
                Text(" to "),
                Param("new_position"),
            ],
            Self::ImageEdit => &[
                Text("Modified image \""),
                Param("image_name"),
                Text("\" ("),
                Param("change_type"),
                Text(")"),
            ],
            Self::LayoutChange => &[
                Text("Changed layout from "),
                Param("old_layout"),
                Text(" to "),
                Param("new_layout"),
            ],
            Self::StyleChange => &[
                Text("Updated styling of "),
                Param("element_type"),
                Text(" ("),
                Param("style_changes"),
                Text(")"),
            ],
            Self::Undo => &[Text("Undid previous action: "), Param("previous_action")],
            Self::Redo => &[Text("Redid action: "), Param("action_description")],
            Self::Other(_) => return None,
        };
        Some(segments)
    }
}

impl From<&str> for ActionKind {
    fn from(name: &str) -> Self {
        match name {
            "text_edit" => Self::TextEdit,
            "image_move" => Self::ImageMove,
            "block_add" => Self::BlockAdd,
            "block_delete" => Self::BlockDelete,
            "block_move" => Self::BlockMove,
            "image_edit" => Self::ImageEdit,
            "layout_change" => Self::LayoutChange,
            "style_change" => Self::StyleChange,
            "undo" => Self::Undo,
            "redo" => Self::Redo,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed description of an edit, as sent by the content editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Template parameters, e.g. `old_text` / `new_text` for a text edit.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub details: ActionDetails,
}

impl EditAction {
    pub fn new(kind: impl Into<ActionKind>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
            details: ActionDetails::default(),
        }
    }

    /// Adds a template parameter.
    pub fn with_param(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn with_details(mut self, details: ActionDetails) -> Self {
        self.details = details;
        self
    }

    /// Builds the human-readable label for this edit.
    ///
    /// Missing parameters render as `unknown`. Kinds without a template
    /// render as `Performed <kind>`.
    pub fn describe(&self) -> String {
        let Some(template) = self.kind.template() else {
            return format!("Performed {}", self.kind);
        };

        let mut out = String::new();
        for segment in template {
            match segment {
                Text(text) => out.push_str(text),
                Param(name) => out.push_str(&self.param_text(name)),
            }
        }
        out
    }

    fn param_text(&self, name: &str) -> String {
        match self.params.get(name) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// A recorded content state plus its metadata.
///
/// Checkpoints are only ever handed out by shared reference; the history
/// owns them exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Position in the checkpoint list.
    pub sequence_index: usize,
    pub timestamp: DateTime<Utc>,
    /// Kind name of the edit (`text_edit`, `Initial State`, ...).
    pub action: String,
    pub action_label: String,
    pub details: ActionDetails,
    pub snapshot: Snapshot,
    /// Rendered preview before the change, display only.
    pub preview_before: Option<String>,
    /// Rendered preview after the change, display only.
    pub preview_after: Option<String>,
}

/// Everything the editor supplies for a new checkpoint.
///
/// The history fills in the index and timestamp when it records the entry.
#[derive(Debug, Clone)]
pub struct NewCheckpoint {
    pub snapshot: Snapshot,
    pub action: String,
    pub action_label: String,
    pub details: ActionDetails,
    pub preview_before: Option<String>,
    pub preview_after: Option<String>,
}

impl NewCheckpoint {
    /// A checkpoint described only by a label.
    pub fn new(snapshot: Snapshot, action_label: impl Into<String>) -> Self {
        let action_label = action_label.into();
        Self {
            snapshot,
            action: action_label.clone(),
            action_label,
            details: ActionDetails::default(),
            preview_before: None,
            preview_after: None,
        }
    }

    /// A checkpoint labelled from a typed edit action.
    pub fn from_action(snapshot: Snapshot, edit: &EditAction) -> Self {
        Self {
            snapshot,
            action: edit.kind.to_string(),
            action_label: edit.describe(),
            details: edit.details.clone(),
            preview_before: None,
            preview_after: None,
        }
    }

    pub fn with_previews(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.preview_before = before;
        self.preview_after = after;
        self
    }

    pub(crate) fn into_checkpoint(self, sequence_index: usize, timestamp: DateTime<Utc>) -> Checkpoint {
        Checkpoint {
            sequence_index,
            timestamp,
            action: self.action,
            action_label: self.action_label,
            details: self.details,
            snapshot: self.snapshot,
            preview_before: self.preview_before,
            preview_after: self.preview_after,
        }
    }
}
