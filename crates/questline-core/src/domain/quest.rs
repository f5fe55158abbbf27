//! Quest snapshot: the nested shape the backend returns for one unit of work.

use serde::{Deserialize, Deserializer, Serialize};

use super::ids::QuestId;
use super::state::QuestState;

/// Progress counter of a quest.
///
/// `total: None` means the amount of work is unknown (indeterminate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub current: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl QuestProgress {
    pub fn new(current: u64, total: Option<u64>) -> Self {
        Self { current, total }
    }
}

/// A quest as fetched from the backend, children included by value.
///
/// The store flattens this into an arena (see `store::QuestNode`); readers get
/// it back through `QuestStore::snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub state: QuestState,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<QuestProgress>,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub subquests: Vec<Quest>,

    /// Payload produced on success (e.g. the id of a created instance).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl Quest {
    pub fn new(id: u64, state: QuestState, description: impl Into<String>) -> Self {
        Self {
            id: QuestId::new(id),
            state,
            description: description.into(),
            detail: None,
            progress: None,
            subquests: Vec::new(),
            result: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_progress(mut self, current: u64, total: Option<u64>) -> Self {
        self.progress = Some(QuestProgress::new(current, total));
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_subquest(mut self, subquest: Quest) -> Self {
        self.subquests.push(subquest);
        self
    }

    /// A quest with children is composite; its own state still comes from the backend.
    pub fn is_composite(&self) -> bool {
        !self.subquests.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Quest>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Quest>>::deserialize(deserializer)?.unwrap_or_default())
}
