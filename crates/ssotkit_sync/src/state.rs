//! Object write state machine.

use serde::Serialize;
use ssotkit_store::ObjectId;
use std::fmt;

/// The state of one object write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    /// Fields are being classified and foreign keys resolved.
    Staging,
    /// The entity is being validated and saved.
    Saving,
    /// Associations and to-many sets are being written.
    Relating,
    /// The write completed.
    Done,
    /// The write failed.
    Failed,
}

impl WriteState {
    /// Returns true while the write is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WriteState::Staging | WriteState::Saving | WriteState::Relating
        )
    }

    /// Returns true if `next` may follow this state.
    pub fn can_transition_to(&self, next: WriteState) -> bool {
        matches!(
            (self, next),
            (WriteState::Staging, WriteState::Saving)
                | (WriteState::Saving, WriteState::Relating)
                | (WriteState::Saving, WriteState::Done)
                | (WriteState::Relating, WriteState::Done)
        ) || (self.is_active() && next == WriteState::Failed)
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteState::Staging => "staging",
            WriteState::Saving => "saving",
            WriteState::Relating => "relating",
            WriteState::Done => "done",
            WriteState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Kind of object write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    /// New entity.
    Create,
    /// Existing entity, changed attributes only.
    Update,
    /// Removal or safe-delete marking.
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOperation::Create => f.write_str("create"),
            WriteOperation::Update => f.write_str("update"),
            WriteOperation::Delete => f.write_str("delete"),
        }
    }
}

/// Outcome of one object write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Model name.
    pub model: String,
    /// Kind of write.
    pub operation: WriteOperation,
    /// Backing entity.
    pub object_id: ObjectId,
    /// Final state.
    pub state: WriteState,
    /// Whether the entity was inserted rather than updated.
    pub inserted: bool,
    /// Native to-many fields set.
    pub to_many_fields: usize,
    /// Relationship associations created.
    pub associations_created: usize,
    /// Stale relationship associations deleted.
    pub associations_deleted: usize,
}

impl WriteReport {
    /// Starts a report in the staging state.
    pub fn new(model: impl Into<String>, operation: WriteOperation, object_id: ObjectId) -> Self {
        Self {
            model: model.into(),
            operation,
            object_id,
            state: WriteState::Staging,
            inserted: false,
            to_many_fields: 0,
            associations_created: 0,
            associations_deleted: 0,
        }
    }
}
