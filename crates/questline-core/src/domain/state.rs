//! Quest state machine, as reported by the backend.

use serde::{Deserialize, Serialize};

/// Quest state.
///
/// State transitions (driven by the backend, never by the client):
/// - Pending -> Ongoing -> Success
/// - Pending -> Ongoing -> Failing -> Failed
/// - Pending -> Skipped
///
/// Once a quest reaches `Failed`, `Success` or `Skipped` it never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestState {
    /// Accepted but not started yet.
    Pending,

    /// Currently being worked on.
    Ongoing,

    /// Still running, but some part already failed.
    Failing,

    /// Finished unsuccessfully.
    Failed,

    /// Finished successfully.
    Success,

    /// Not executed because it was not needed.
    Skipped,
}

impl QuestState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            QuestState::Failed | QuestState::Success | QuestState::Skipped
        )
    }

    /// Terminal and counts as done for whoever waits on it.
    pub fn is_finished_ok(self) -> bool {
        matches!(self, QuestState::Success | QuestState::Skipped)
    }

    /// Is the backend actively working on it?
    pub fn is_running(self) -> bool {
        matches!(self, QuestState::Ongoing | QuestState::Failing)
    }

    /// Neither running nor finished.
    pub fn is_waiting(self) -> bool {
        matches!(self, QuestState::Pending)
    }
}
