//! Quest node: one arena entry of the store.

use chrono::{DateTime, Utc};

use crate::domain::{Quest, QuestId, QuestProgress, QuestState};

/// A quest as kept by the store.
///
/// Design:
/// - Children are referenced by id, never owned, so refreshing a subtree never
///   deep-copies the rest of the tree.
/// - `parent` is `None` for roots. A node has at most one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestNode {
    pub id: QuestId,
    pub state: QuestState,
    pub description: String,
    pub detail: Option<String>,
    pub progress: Option<QuestProgress>,
    pub result: Option<String>,

    pub parent: Option<QuestId>,
    pub children: Vec<QuestId>,

    /// When this node was last written by a refresh.
    pub refreshed_at: DateTime<Utc>,
}

impl QuestNode {
    /// Build a node from a snapshot, without its children's contents.
    pub(crate) fn from_snapshot(
        quest: &Quest,
        parent: Option<QuestId>,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: quest.id,
            state: quest.state,
            description: quest.description.clone(),
            detail: quest.detail.clone(),
            progress: quest.progress,
            result: quest.result.clone(),
            parent,
            children: quest.subquests.iter().map(|q| q.id).collect(),
            refreshed_at,
        }
    }

    /// Copy the scalar fields of `other` into self, keeping tree links.
    pub(crate) fn take_fields_from(&mut self, other: &QuestNode) {
        self.state = other.state;
        self.description = other.description.clone();
        self.detail = other.detail.clone();
        self.progress = other.progress;
        self.result = other.result.clone();
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Scalar view of this node; subquests are left empty.
    pub fn to_quest(&self) -> Quest {
        Quest {
            id: self.id,
            state: self.state,
            description: self.description.clone(),
            detail: self.detail.clone(),
            progress: self.progress,
            subquests: Vec::new(),
            result: self.result.clone(),
        }
    }
}
