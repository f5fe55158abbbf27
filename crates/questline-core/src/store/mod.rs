//! Quest store: every quest known during a session, keyed by id.
//!
//! Design:
//! - Arena of `QuestNode`s; the tree lives in the `parent`/`children` links.
//! - `main_quest_ids` are the top-level quests as listed by the backend.
//! - No business logic and no I/O. Writers are refresh results (`upsert`) and
//!   `clear_finished`; everything else reads.

mod node;

pub use node::QuestNode;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{Quest, QuestId, StoreError};

#[derive(Debug, Default)]
pub struct QuestStore {
    nodes: HashMap<QuestId, QuestNode>,
    main_quest_ids: Vec<QuestId>,
}

impl QuestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: QuestId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: QuestId) -> Option<&QuestNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &QuestNode> {
        self.nodes.values()
    }

    pub fn main_quest_ids(&self) -> &[QuestId] {
        &self.main_quest_ids
    }

    pub fn set_main_quest_ids(&mut self, ids: Vec<QuestId>) {
        self.main_quest_ids = ids;
    }

    /// Ids of all nodes without a parent, ascending.
    pub fn roots(&self) -> Vec<QuestId> {
        let mut roots: Vec<QuestId> = self
            .nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.id)
            .collect();
        roots.sort();
        roots
    }

    /// Immediate children of `id`, in backend order.
    pub fn children(&self, id: QuestId) -> Vec<&QuestNode> {
        self.nodes
            .get(&id)
            .map(|n| n.children.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// Rebuild the nested quest for `id` from the arena.
    pub fn snapshot(&self, id: QuestId) -> Option<Quest> {
        let node = self.nodes.get(&id)?;
        let mut quest = node.to_quest();
        quest.subquests = node
            .children
            .iter()
            .filter_map(|child| self.snapshot(*child))
            .collect();
        Some(quest)
    }

    /// Main quests that reached a terminal state.
    pub fn finished_main_quest_ids(&self) -> Vec<QuestId> {
        self.main_quest_ids
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.state.is_finished()))
            .collect()
    }

    /// Roots in a terminal state, ascending. These are what `clear_finished` drops.
    pub fn finished_roots(&self) -> Vec<QuestId> {
        let mut roots: Vec<QuestId> = self
            .nodes
            .values()
            .filter(|n| n.is_root() && n.state.is_finished())
            .map(|n| n.id)
            .collect();
        roots.sort();
        roots
    }

    /// Write a fetched snapshot (and its whole subtree) into the store.
    ///
    /// - Existing entries for every id in the snapshot are overwritten.
    /// - Nothing is removed. Known children the snapshot no longer lists stay
    ///   linked under their parent, after the listed ones.
    /// - A node that is already terminal keeps its fields and its children
    ///   when the snapshot reports a non-terminal state for it.
    /// - A snapshot that would break the tree is rejected as a whole and the
    ///   store stays untouched.
    pub fn upsert(&mut self, quest: &Quest, refreshed_at: DateTime<Utc>) -> Result<(), StoreError> {
        let (incoming, ids) = flatten(quest, refreshed_at)?;
        self.check_links(quest.id, &incoming, &ids)?;

        let root_parent = self.nodes.get(&quest.id).and_then(|n| n.parent);
        for mut node in incoming {
            if node.id == quest.id {
                node.parent = root_parent;
            }
            match self.nodes.get_mut(&node.id) {
                Some(existing) if existing.state.is_finished() && !node.state.is_finished() => {
                    warn!(
                        quest_id = %node.id,
                        kept = ?existing.state,
                        ignored = ?node.state,
                        "ignoring non-terminal snapshot of a finished quest"
                    );
                    existing.parent = node.parent;
                    let known = existing.children.clone();
                    existing.children = merge_children(&known, &node.children);
                }
                Some(existing) => {
                    let retained: Vec<QuestId> = existing
                        .children
                        .iter()
                        .copied()
                        .filter(|c| !ids.contains(c))
                        .collect();
                    existing.take_fields_from(&node);
                    existing.parent = node.parent;
                    existing.children = merge_children(&node.children, &retained);
                    existing.refreshed_at = node.refreshed_at;
                }
                None => {
                    self.nodes.insert(node.id, node);
                }
            }
        }
        Ok(())
    }

    /// Drop every finished root together with its subtree.
    ///
    /// Roots that are still running stay, even when some of their children
    /// are finished. Returns the removed root ids, ascending.
    pub fn clear_finished(&mut self) -> Vec<QuestId> {
        let finished_roots = self.finished_roots();
        for root in &finished_roots {
            for id in self.descendants(*root) {
                self.nodes.remove(&id);
            }
            self.nodes.remove(root);
        }
        self.main_quest_ids.retain(|id| self.nodes.contains_key(id));
        finished_roots
    }

    /// All ids below `id` in the stored tree (not including `id`).
    fn descendants(&self, id: QuestId) -> Vec<QuestId> {
        let mut out = Vec::new();
        let mut stack: Vec<QuestId> = self
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    /// Reject snapshots that would give a node two parents or close a loop.
    fn check_links(
        &self,
        root: QuestId,
        incoming: &[QuestNode],
        ids: &HashSet<QuestId>,
    ) -> Result<(), StoreError> {
        let mut cursor = self.nodes.get(&root).and_then(|n| n.parent);
        while let Some(ancestor) = cursor {
            if ids.contains(&ancestor) {
                return Err(StoreError::Cycle(ancestor));
            }
            cursor = self.nodes.get(&ancestor).and_then(|n| n.parent);
        }

        for node in incoming.iter().filter(|n| n.id != root) {
            if let Some(existing) = self.nodes.get(&node.id)
                && let Some(parent) = existing.parent
                && Some(parent) != node.parent
                && !ids.contains(&parent)
            {
                return Err(StoreError::Reparented {
                    child: node.id,
                    parent,
                });
            }
        }
        Ok(())
    }
}

/// `first`, then whatever of `rest` is not in it yet.
fn merge_children(first: &[QuestId], rest: &[QuestId]) -> Vec<QuestId> {
    let mut merged = first.to_vec();
    merged.extend(rest.iter().copied().filter(|id| !first.contains(id)));
    merged
}

/// Pre-order flattening of a snapshot. Fails on repeated ids.
fn flatten(
    root: &Quest,
    refreshed_at: DateTime<Utc>,
) -> Result<(Vec<QuestNode>, HashSet<QuestId>), StoreError> {
    let mut nodes = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<(&Quest, Option<QuestId>)> = vec![(root, None)];

    while let Some((quest, parent)) = stack.pop() {
        if !seen.insert(quest.id) {
            return Err(StoreError::DuplicateQuest(quest.id));
        }
        nodes.push(QuestNode::from_snapshot(quest, parent, refreshed_at));
        for child in quest.subquests.iter().rev() {
            stack.push((child, Some(quest.id)));
        }
    }
    Ok((nodes, seen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuestState;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 18, 12, minute, 0).unwrap()
    }

    fn install_tree(state: QuestState) -> Quest {
        Quest::new(1, state, "Install app")
            .with_subquest(
                Quest::new(2, QuestState::Success, "Download")
                    .with_subquest(Quest::new(4, QuestState::Success, "Layer 1")),
            )
            .with_subquest(Quest::new(3, QuestState::Ongoing, "Unpack"))
    }

    #[test]
    fn upsert_flattens_the_tree() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.roots(), vec![QuestId::new(1)]);
        assert_eq!(store.get(QuestId::new(4)).unwrap().parent, Some(QuestId::new(2)));
        assert_eq!(
            store.get(QuestId::new(1)).unwrap().children,
            vec![QuestId::new(2), QuestId::new(3)]
        );
        assert_eq!(store.get(QuestId::new(3)).unwrap().refreshed_at, at(0));
    }

    #[test]
    fn snapshot_rebuilds_what_was_stored() {
        let mut store = QuestStore::new();
        let tree = install_tree(QuestState::Ongoing);
        store.upsert(&tree, at(0)).unwrap();

        assert_eq!(store.snapshot(QuestId::new(1)), Some(tree));
        assert_eq!(store.snapshot(QuestId::new(99)), None);
    }

    #[test]
    fn refresh_overwrites_and_keeps_unlisted_descendants() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();

        let refreshed = Quest::new(1, QuestState::Ongoing, "Install app")
            .with_detail("Unpacking")
            .with_subquest(Quest::new(3, QuestState::Success, "Unpack"));
        store.upsert(&refreshed, at(1)).unwrap();

        assert_eq!(store.len(), 4);
        assert!(store.contains(QuestId::new(2)));
        assert!(store.contains(QuestId::new(4)));
        let root = store.get(QuestId::new(1)).unwrap();
        assert_eq!(root.detail.as_deref(), Some("Unpacking"));
        assert_eq!(root.refreshed_at, at(1));
        assert_eq!(root.children, vec![QuestId::new(3), QuestId::new(2)]);
        assert_eq!(store.get(QuestId::new(2)).unwrap().parent, Some(QuestId::new(1)));
        assert_eq!(store.get(QuestId::new(3)).unwrap().state, QuestState::Success);
    }

    #[test]
    fn stale_snapshot_keeps_the_finished_tree_whole() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Success), at(0)).unwrap();

        let stale = Quest::new(1, QuestState::Pending, "Install app")
            .with_subquest(Quest::new(2, QuestState::Pending, "Download"));
        store.upsert(&stale, at(1)).unwrap();

        let root = store.snapshot(QuestId::new(1)).unwrap();
        assert_eq!(root.state, QuestState::Success);
        assert_eq!(root.subquests.len(), 2);
        assert_eq!(root.subquests[0].state, QuestState::Success);
        assert_eq!(root.subquests[0].subquests.len(), 1);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn child_moved_inside_the_tree_is_listed_once() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();

        let moved = Quest::new(1, QuestState::Ongoing, "Install app").with_subquest(
            Quest::new(3, QuestState::Ongoing, "Unpack")
                .with_subquest(Quest::new(2, QuestState::Success, "Download")),
        );
        store.upsert(&moved, at(1)).unwrap();

        assert_eq!(store.get(QuestId::new(1)).unwrap().children, vec![QuestId::new(3)]);
        assert_eq!(store.get(QuestId::new(2)).unwrap().parent, Some(QuestId::new(3)));
        assert_eq!(store.get(QuestId::new(3)).unwrap().children, vec![QuestId::new(2)]);
    }

    #[test]
    fn refreshing_a_subquest_keeps_its_parent() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();

        store
            .upsert(&Quest::new(3, QuestState::Success, "Unpack"), at(1))
            .unwrap();

        let node = store.get(QuestId::new(3)).unwrap();
        assert_eq!(node.parent, Some(QuestId::new(1)));
        assert_eq!(node.state, QuestState::Success);
        assert_eq!(store.roots(), vec![QuestId::new(1)]);
    }

    #[test]
    fn finished_quest_never_reverts() {
        let mut store = QuestStore::new();
        store
            .upsert(&Quest::new(5, QuestState::Success, "Start instance").with_result("ok"), at(0))
            .unwrap();

        store
            .upsert(&Quest::new(5, QuestState::Ongoing, "Start instance"), at(1))
            .unwrap();

        let node = store.get(QuestId::new(5)).unwrap();
        assert_eq!(node.state, QuestState::Success);
        assert_eq!(node.result.as_deref(), Some("ok"));
        assert_eq!(node.refreshed_at, at(0));
    }

    #[test]
    fn non_terminal_values_follow_last_write() {
        let mut store = QuestStore::new();
        store
            .upsert(&Quest::new(5, QuestState::Ongoing, "Pull").with_progress(3, Some(4)), at(0))
            .unwrap();
        store
            .upsert(&Quest::new(5, QuestState::Pending, "Pull").with_progress(1, Some(4)), at(1))
            .unwrap();

        let node = store.get(QuestId::new(5)).unwrap();
        assert_eq!(node.state, QuestState::Pending);
        assert_eq!(node.progress.unwrap().current, 1);
    }

    #[test]
    fn duplicate_ids_in_one_snapshot_are_rejected() {
        let mut store = QuestStore::new();
        let bad = Quest::new(1, QuestState::Ongoing, "root")
            .with_subquest(Quest::new(2, QuestState::Pending, "a"))
            .with_subquest(Quest::new(2, QuestState::Pending, "a again"));

        assert_eq!(
            store.upsert(&bad, at(0)),
            Err(StoreError::DuplicateQuest(QuestId::new(2)))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn child_cannot_move_under_a_second_parent() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();

        let thief = Quest::new(10, QuestState::Ongoing, "other")
            .with_subquest(Quest::new(3, QuestState::Ongoing, "Unpack"));
        assert_eq!(
            store.upsert(&thief, at(1)),
            Err(StoreError::Reparented {
                child: QuestId::new(3),
                parent: QuestId::new(1),
            })
        );
        assert!(!store.contains(QuestId::new(10)));
        assert_eq!(store.get(QuestId::new(3)).unwrap().parent, Some(QuestId::new(1)));
    }

    #[test]
    fn ancestor_cannot_become_a_descendant() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();

        let looped = Quest::new(2, QuestState::Ongoing, "Download")
            .with_subquest(Quest::new(1, QuestState::Ongoing, "Install app"));
        assert_eq!(
            store.upsert(&looped, at(1)),
            Err(StoreError::Cycle(QuestId::new(1)))
        );
        assert_eq!(store.get(QuestId::new(1)).unwrap().parent, None);
    }

    #[test]
    fn a_known_root_may_be_adopted_later() {
        let mut store = QuestStore::new();
        store
            .upsert(&Quest::new(3, QuestState::Ongoing, "Unpack"), at(0))
            .unwrap();
        store.upsert(&install_tree(QuestState::Ongoing), at(1)).unwrap();

        assert_eq!(store.get(QuestId::new(3)).unwrap().parent, Some(QuestId::new(1)));
        assert_eq!(store.roots(), vec![QuestId::new(1)]);
    }

    #[test]
    fn clear_finished_keeps_running_roots() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Ongoing), at(0)).unwrap();
        store
            .upsert(
                &Quest::new(20, QuestState::Failed, "Export")
                    .with_subquest(Quest::new(21, QuestState::Failed, "Pack")),
                at(0),
            )
            .unwrap();
        store.set_main_quest_ids(vec![QuestId::new(1), QuestId::new(20)]);

        let removed = store.clear_finished();

        assert_eq!(removed, vec![QuestId::new(20)]);
        assert!(!store.contains(QuestId::new(21)));
        assert!(store.contains(QuestId::new(2)));
        assert_eq!(store.main_quest_ids(), &[QuestId::new(1)]);
    }

    #[test]
    fn clear_finished_is_idempotent() {
        let mut store = QuestStore::new();
        store.upsert(&install_tree(QuestState::Success), at(0)).unwrap();
        store
            .upsert(&Quest::new(30, QuestState::Pending, "Queued"), at(0))
            .unwrap();

        assert_eq!(store.clear_finished(), vec![QuestId::new(1)]);
        let before = store.snapshot(QuestId::new(30));
        let len = store.len();

        assert!(store.clear_finished().is_empty());
        assert_eq!(store.len(), len);
        assert_eq!(store.snapshot(QuestId::new(30)), before);
    }

    #[test]
    fn finished_main_quest_ids_preserve_listing_order() {
        let mut store = QuestStore::new();
        store.upsert(&Quest::new(8, QuestState::Skipped, "b"), at(0)).unwrap();
        store.upsert(&Quest::new(4, QuestState::Ongoing, "a"), at(0)).unwrap();
        store.upsert(&Quest::new(6, QuestState::Failed, "c"), at(0)).unwrap();
        store.set_main_quest_ids(vec![QuestId::new(8), QuestId::new(4), QuestId::new(6)]);

        assert_eq!(
            store.finished_main_quest_ids(),
            vec![QuestId::new(8), QuestId::new(6)]
        );
    }
}
