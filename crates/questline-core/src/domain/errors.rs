//! Errors - エラー型と分類
//!
//! - `ServiceError`: the backend call itself failed (transport, status, decode).
//! - `StoreError`: a snapshot was rejected because it would break the quest tree.
//! - `QuestError`: what `QuestContext` operations return.
//! - `WorkflowError`: what a workflow returns; a quest that ended badly is one
//!   of these, not a transport error.

use thiserror::Error;

use super::ids::QuestId;
use super::state::QuestState;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("quest {0} not found")]
    NotFound(QuestId),

    #[error("could not decode backend response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("quest {0} appears more than once in one snapshot")]
    DuplicateQuest(QuestId),

    #[error("quest {child} is already a subquest of {parent}")]
    Reparented { child: QuestId, parent: QuestId },

    #[error("quest {0} would become its own ancestor")]
    Cycle(QuestId),
}

#[derive(Debug, Error)]
pub enum QuestError {
    #[error("failed to fetch quest {id}: {source}")]
    Fetch {
        id: QuestId,
        #[source]
        source: ServiceError,
    },

    #[error("failed to list quests: {0}")]
    List(#[source] ServiceError),

    #[error("failed to delete quest {id}: {source}")]
    Delete {
        id: QuestId,
        #[source]
        source: ServiceError,
    },

    #[error("snapshot of quest {id} rejected: {source}")]
    Rejected {
        id: QuestId,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The backend refused or never received the submission.
    #[error("step {step}: submission failed: {source}")]
    Submit {
        step: String,
        #[source]
        source: ServiceError,
    },

    /// Tracking the quest failed on the transport level.
    #[error(transparent)]
    Quest(#[from] QuestError),

    /// The quest finished, but not successfully. The message is the quest's
    /// own description, which is what users get to see.
    #[error("{description}")]
    QuestFailed {
        step: String,
        quest_id: QuestId,
        state: QuestState,
        description: String,
        detail: Option<String>,
    },

    /// A successful quest did not carry the result the next step needs.
    #[error("step {step}: quest {quest_id} finished without a result")]
    MissingResult { step: String, quest_id: QuestId },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WorkflowError {
    /// The step that failed, when the failure is tied to one.
    pub fn step(&self) -> Option<&str> {
        match self {
            WorkflowError::Submit { step, .. }
            | WorkflowError::QuestFailed { step, .. }
            | WorkflowError::MissingResult { step, .. } => Some(step),
            WorkflowError::Quest(_) | WorkflowError::InvalidInput(_) => None,
        }
    }
}
