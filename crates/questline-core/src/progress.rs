//! Progress aggregation over already fetched quests. Pure functions, no I/O.

use crate::domain::{Quest, QuestId, QuestProgress, QuestState};
use crate::store::{QuestNode, QuestStore};

/// Completion ratio in percent.
///
/// Uses `total` when it is present and nonzero, otherwise `current` itself
/// (an indeterminate quest reads as 100%, or 0% before any work).
pub fn percent(progress: &QuestProgress) -> f64 {
    let denominator = match progress.total {
        Some(total) if total > 0 => total,
        _ => progress.current,
    };
    if denominator == 0 {
        return 0.0;
    }
    100.0 * progress.current as f64 / denominator as f64
}

/// Everything a progress bar needs for one quest.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub percent: f64,
    /// The backend does not know how much work there is.
    pub indeterminate: bool,
    /// e.g. "3 of 10" or "3 of unknown".
    pub caption: String,
}

impl ProgressView {
    pub fn of(progress: &QuestProgress) -> Self {
        let total = progress
            .total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            percent: percent(progress),
            indeterminate: progress.total.is_none(),
            caption: format!("{} of {}", progress.current, total),
        }
    }
}

/// Counts over the immediate children of a composite quest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtreeCounts {
    pub total: usize,
    /// Children in any terminal state.
    pub finished: usize,
    /// Finished children that did not finish ok. Included in `finished`.
    pub failed: usize,
    pub running: usize,
    /// `total - finished - running`.
    pub remaining: usize,
}

impl SubtreeCounts {
    pub fn from_states(states: impl IntoIterator<Item = QuestState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            counts.total += 1;
            if state.is_finished() {
                counts.finished += 1;
                if !state.is_finished_ok() {
                    counts.failed += 1;
                }
            } else if state.is_running() {
                counts.running += 1;
            }
        }
        counts.remaining = counts.total - counts.finished - counts.running;
        counts
    }

    /// Share of finished children, 0 for a quest without children.
    pub fn finished_percent(&self) -> f64 {
        share(self.finished, self.total)
    }

    /// Share of finished plus running children; the buffer of a buffered bar.
    pub fn running_percent(&self) -> f64 {
        share(self.finished + self.running, self.total)
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Counts over a fetched quest's `subquests`. Not recursive.
pub fn subtree_counts(subquests: &[Quest]) -> SubtreeCounts {
    SubtreeCounts::from_states(subquests.iter().map(|q| q.state))
}

/// Same as [`subtree_counts`], read straight from the store.
pub fn node_counts(store: &QuestStore, id: QuestId) -> SubtreeCounts {
    SubtreeCounts::from_states(store.children(id).into_iter().map(|n: &QuestNode| n.state))
}
