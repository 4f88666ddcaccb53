//! Push channel wire format.
//!
//! The server broadcasts one JSON frame per task change on a board:
//!
//! ```json
//! { "type": "task_moved", "board_id": "…", "data": { …full task… } }
//! ```
//!
//! `task_deleted` frames only carry `{"id": "…"}` in `data`. Types this client does not know
//! about are surfaced as [`PushEvent::Unknown`] so newer servers can add events freely.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::{SyncError, SyncResult};
use crate::models::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<Uuid>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PushEventKind {
    TaskCreated,
    TaskUpdated,
    TaskMoved,
    TaskDeleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskMoved(Task),
    TaskDeleted { task_id: Uuid },
    Unknown { kind: String },
}

impl PushEvent {
    pub fn kind_name(&self) -> String {
        match self {
            PushEvent::TaskCreated(_) => PushEventKind::TaskCreated.to_string(),
            PushEvent::TaskUpdated(_) => PushEventKind::TaskUpdated.to_string(),
            PushEvent::TaskMoved(_) => PushEventKind::TaskMoved.to_string(),
            PushEvent::TaskDeleted { .. } => PushEventKind::TaskDeleted.to_string(),
            PushEvent::Unknown { kind } => kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub board_id: Option<Uuid>,
    pub event: PushEvent,
}

#[derive(Deserialize)]
struct DeletedTask {
    id: Uuid,
}

impl PushMessage {
    /// Parse one inbound text frame.
    ///
    /// Unknown event types parse successfully; malformed JSON or a payload that does not fit
    /// its event type is a `Serialization` error.
    pub fn parse(frame: &str) -> SyncResult<Self> {
        let envelope: PushEnvelope = serde_json::from_str(frame)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: PushEnvelope) -> SyncResult<Self> {
        let kind = match PushEventKind::from_str(&envelope.kind) {
            Ok(kind) => kind,
            Err(_) => {
                return Ok(Self {
                    board_id: envelope.board_id,
                    event: PushEvent::Unknown {
                        kind: envelope.kind,
                    },
                })
            }
        };

        if envelope.data.is_null() {
            return Err(SyncError::Serialization(format!(
                "{} frame without data",
                kind
            )));
        }

        let event = match kind {
            PushEventKind::TaskCreated => PushEvent::TaskCreated(serde_json::from_value(envelope.data)?),
            PushEventKind::TaskUpdated => PushEvent::TaskUpdated(serde_json::from_value(envelope.data)?),
            PushEventKind::TaskMoved => PushEvent::TaskMoved(serde_json::from_value(envelope.data)?),
            PushEventKind::TaskDeleted => {
                let deleted: DeletedTask = serde_json::from_value(envelope.data)?;
                PushEvent::TaskDeleted {
                    task_id: deleted.id,
                }
            }
        };

        Ok(Self {
            board_id: envelope.board_id,
            event,
        })
    }

    /// Encode back into a frame. Used by test servers and tooling.
    pub fn to_frame(&self) -> SyncResult<String> {
        let data = match &self.event {
            PushEvent::TaskCreated(task) | PushEvent::TaskUpdated(task) | PushEvent::TaskMoved(task) => {
                serde_json::to_value(task)?
            }
            PushEvent::TaskDeleted { task_id } => serde_json::json!({ "id": task_id }),
            PushEvent::Unknown { .. } => serde_json::Value::Null,
        };
        let envelope = PushEnvelope {
            kind: self.event.kind_name(),
            board_id: self.board_id,
            data,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}
