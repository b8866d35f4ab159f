/// JSON request/response boundary for the history controls.
///
/// Each request names an action (`aialbie_undo`, `aialbie_redo`,
/// `aialbie_restore_checkpoint`, ...) and a session. Navigation failures
/// come back as `{ "success": false, "error": "<code>" }` so the UI can
/// disable the matching control.
use serde::{Deserialize, Deserializer, Serialize};

use crate::history::{
    EditAction, HistoryConfig, HistoryError, HistoryManager, HistoryState, NewCheckpoint,
    SessionRegistry, Snapshot,
};

/// Error code for a request that could not be parsed or is incomplete.
pub const INVALID_REQUEST: &str = "InvalidRequest";
/// Error code for a request without a session ID and no default session.
pub const MISSING_SESSION: &str = "MissingSession";
/// Error code for a persistence failure.
pub const STORAGE_ERROR: &str = "StorageError";

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Target session; falls back to the endpoint's default session.
    #[serde(default)]
    pub session: Option<String>,
    #[serde(flatten)]
    pub operation: Operation,
}

/// The operation a request asks for.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all_fields = "camelCase")]
pub enum Operation {
    /// Starts the session over from a new baseline.
    #[serde(rename = "aialbie_begin")]
    Begin { baseline: Snapshot },
    /// Records an edit. Needs a `label`, an `edit`, or both (the label wins).
    #[serde(rename = "aialbie_record")]
    Record {
        snapshot: Snapshot,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        edit: Option<EditAction>,
        #[serde(default)]
        preview_before: Option<String>,
        #[serde(default)]
        preview_after: Option<String>,
    },
    #[serde(rename = "aialbie_undo")]
    Undo,
    #[serde(rename = "aialbie_redo")]
    Redo,
    /// Jumps to a checkpoint. The index may arrive as a number or a numeric
    /// string (timeline items carry it as a data attribute). `None` marks a
    /// numeric value that cannot address any checkpoint.
    #[serde(rename = "aialbie_restore_checkpoint")]
    RestoreCheckpoint {
        #[serde(deserialize_with = "index_from_number_or_string")]
        index: Option<usize>,
    },
    #[serde(rename = "aialbie_reset")]
    Reset,
    /// Read-only: reports the current snapshot and history state.
    #[serde(rename = "aialbie_history")]
    History,
    /// Ends the session and deletes its stored history.
    #[serde(rename = "aialbie_close")]
    Close,
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "begin",
            Self::Record { .. } => "record",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::RestoreCheckpoint { .. } => "restore_checkpoint",
            Self::Reset => "reset",
            Self::History => "history",
            Self::Close => "close",
        }
    }
}

fn index_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    match Index::deserialize(deserializer)? {
        Index::Unsigned(n) => Ok(usize::try_from(n).ok()),
        Index::Signed(_) => Ok(None),
        Index::Float(f) => Ok(index_from_float(f)),
        Index::Text(s) => {
            let text = s.trim();
            if let Ok(n) = text.parse::<u64>() {
                Ok(usize::try_from(n).ok())
            } else if let Ok(f) = text.parse::<f64>() {
                Ok(index_from_float(f))
            } else {
                Err(serde::de::Error::custom(format!("invalid checkpoint index: {s:?}")))
            }
        }
    }
}

/// Whole, non-negative floats such as `1.0` address a checkpoint.
fn index_from_float(f: f64) -> Option<usize> {
    (f.fract() == 0.0 && f >= 0.0 && f <= usize::MAX as f64).then(|| f as usize)
}

/// The reply to a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_state: Option<HistoryState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// Success reply carrying the current checkpoint's snapshot.
    pub fn success(history: &HistoryManager) -> Self {
        Self {
            success: true,
            snapshot: Some(history.current().snapshot.clone()),
            history_state: Some(history.state()),
            error: None,
            message: None,
        }
    }

    /// Success reply without history, for a session that no longer exists.
    pub fn closed() -> Self {
        Self {
            success: true,
            snapshot: None,
            history_state: None,
            error: None,
            message: None,
        }
    }

    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            snapshot: None,
            history_state: None,
            error: Some(code.to_string()),
            message: Some(message.into()),
        }
    }

    /// Serializes the reply as a single line of JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<HistoryError> for Response {
    fn from(err: HistoryError) -> Self {
        Self::failure(err.code(), err.to_string())
    }
}

/// Why an operation was refused.
enum Rejection {
    History(HistoryError),
    Invalid(String),
}

impl From<HistoryError> for Rejection {
    fn from(err: HistoryError) -> Self {
        Self::History(err)
    }
}

/// Dispatches requests against a session registry.
#[derive(Debug)]
pub struct Endpoint {
    registry: SessionRegistry,
    default_session: Option<String>,
}

impl Endpoint {
    pub fn new(registry: SessionRegistry, default_session: Option<String>) -> Self {
        Self {
            registry,
            default_session,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Parses and handles one JSON request body.
    pub fn handle_json(&self, body: &str) -> Response {
        match serde_json::from_str::<Request>(body) {
            Ok(request) => self.handle(request),
            Err(e) => {
                tracing::debug!("Rejected malformed request: {e}");
                Response::failure(INVALID_REQUEST, e.to_string())
            }
        }
    }

    /// Handles one request. Never panics on bad input; every failure is a
    /// `success: false` reply.
    pub fn handle(&self, request: Request) -> Response {
        let Some(session) = request.session.or_else(|| self.default_session.clone()) else {
            return Response::failure(MISSING_SESSION, "request has no session id");
        };

        let operation = request.operation;
        let name = operation.name();
        if let Operation::Close = operation {
            return self.close(&session);
        }
        let config = self.registry.config().clone();

        let outcome = self.registry.with_session(&session, |history| {
            apply(history, operation, &config).map(|()| Response::success(history))
        });

        match outcome {
            Ok(Ok(response)) => {
                tracing::debug!(session = %session, operation = name, "Handled history request");
                response
            }
            Ok(Err(Rejection::History(err))) => {
                tracing::debug!(session = %session, operation = name, "Refused: {err}");
                err.into()
            }
            Ok(Err(Rejection::Invalid(message))) => Response::failure(INVALID_REQUEST, message),
            Err(e) => storage_failure(&session, name, &e),
        }
    }

    fn close(&self, session: &str) -> Response {
        match self.registry.close(session) {
            Ok(()) => {
                tracing::debug!(session = %session, "Closed history session");
                Response::closed()
            }
            Err(e) => storage_failure(session, "close", &e),
        }
    }
}

fn storage_failure(session: &str, operation: &str, err: &anyhow::Error) -> Response {
    tracing::warn!(session = %session, operation, "History storage failed: {err:#}");
    Response::failure(STORAGE_ERROR, format!("{err:#}"))
}

fn apply(history: &mut HistoryManager, operation: Operation, config: &HistoryConfig) -> Result<(), Rejection> {
    match operation {
        Operation::Begin { baseline } => {
            *history = HistoryManager::new(baseline, config);
        }
        Operation::Record {
            snapshot,
            label,
            edit,
            preview_before,
            preview_after,
        } => {
            let mut entry = match (&edit, label) {
                (Some(edit), label) => {
                    let mut entry = NewCheckpoint::from_action(snapshot, edit);
                    if let Some(label) = label {
                        entry.action_label = label;
                    }
                    entry
                }
                (None, Some(label)) => NewCheckpoint::new(snapshot, label),
                (None, None) => {
                    return Err(Rejection::Invalid(
                        "record needs a label or an edit".to_string(),
                    ))
                }
            };
            entry = entry.with_previews(preview_before, preview_after);
            history.push(entry);
        }
        Operation::Undo => {
            history.undo()?;
        }
        Operation::Redo => {
            history.redo()?;
        }
        Operation::RestoreCheckpoint { index } => {
            let index = index.ok_or(HistoryError::IndexOutOfRange)?;
            history.restore(index)?;
        }
        Operation::Reset => {
            history.reset();
        }
        Operation::History | Operation::Close => {}
    }
    Ok(())
}
