//! QuestContext - セッション全体のクエスト管理
//!
//! Owns the store, the backend handle and the poller. Cloning is cheap and
//! every clone sees the same store. Dropping the last clone stops polling.
//!
//! Writers:
//! - refresh results (`fetch_quest`, `fetch_quests`, poller ticks)
//! - `clear_quests`
//!
//! A failed refresh leaves the store as it was; the error goes back to the
//! caller only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::QuestConfig;
use crate::domain::{Quest, QuestError, QuestId, StoreError};
use crate::poller::{self, PollTarget, Poller};
use crate::ports::{Clock, JobService, SystemClock};
use crate::store::QuestStore;

#[derive(Clone)]
pub struct QuestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    service: Arc<dyn JobService>,
    clock: Arc<dyn Clock>,
    config: QuestConfig,
    store: RwLock<StoreCell>,
    poller: Mutex<Option<Poller>>,
}

/// The store plus the polling generation it accepts writes from.
///
/// `generation` changes whenever polling is switched off; a poller tick that
/// carries an older generation is dropped under the same lock it would write
/// with.
struct StoreCell {
    quests: QuestStore,
    generation: u64,
}

impl QuestContext {
    pub fn new(service: Arc<dyn JobService>, config: QuestConfig) -> Self {
        Self::with_clock(service, config, Arc::new(SystemClock))
    }

    pub fn with_clock(service: Arc<dyn JobService>, config: QuestConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                service,
                clock,
                config,
                store: RwLock::new(StoreCell {
                    quests: QuestStore::new(),
                    generation: 0,
                }),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn service(&self) -> &Arc<dyn JobService> {
        &self.inner.service
    }

    pub fn config(&self) -> &QuestConfig {
        &self.inner.config
    }

    /// Initial load: list the main quests unless something is already known.
    pub async fn load(&self) -> Result<(), QuestError> {
        if self.inner.store.read().await.quests.is_empty() {
            self.fetch_quests().await?;
        }
        Ok(())
    }

    /// Run `f` against the current store contents.
    pub async fn read<R>(&self, f: impl FnOnce(&QuestStore) -> R) -> R {
        let cell = self.inner.store.read().await;
        f(&cell.quests)
    }

    pub async fn snapshot(&self, id: QuestId) -> Option<Quest> {
        self.read(|store| store.snapshot(id)).await
    }

    pub async fn main_quest_ids(&self) -> Vec<QuestId> {
        self.read(|store| store.main_quest_ids().to_vec()).await
    }

    /// Every known quest by id, each with its subtree.
    pub async fn quests(&self) -> HashMap<QuestId, Quest> {
        self.read(|store| {
            store
                .nodes()
                .filter_map(|node| store.snapshot(node.id).map(|q| (node.id, q)))
                .collect()
        })
        .await
    }

    /// Snapshots of all main quests, in listing order.
    pub async fn main_quests(&self) -> Vec<Quest> {
        self.read(|store| {
            store
                .main_quest_ids()
                .iter()
                .filter_map(|id| store.snapshot(*id))
                .collect()
        })
        .await
    }

    /// Refresh one quest and its subtree from the backend.
    ///
    /// Returns the quest as the store now holds it, so a quest that was
    /// already finished is never reported as running again.
    pub async fn fetch_quest(&self, id: QuestId) -> Result<Quest, QuestError> {
        let fetched = self.get(id).await?;
        self.store_fetched(&fetched)
            .await
            .map_err(|source| QuestError::Rejected { id, source })
    }

    /// List the main quests, merge their trees and replace `main_quest_ids`.
    pub async fn fetch_quests(&self) -> Result<(), QuestError> {
        self.inner.refresh_main(None).await
    }

    /// Refresh `id` until it reaches a terminal state and return that snapshot.
    ///
    /// There is no timeout: a quest the backend never settles keeps this
    /// future pending. Wrap it in `tokio::time::timeout` where that matters.
    /// The first backend error is returned as is. A snapshot the store
    /// rejects does not end the wait; its own state decides and it is
    /// returned as fetched.
    pub async fn wait_for_quest(&self, id: QuestId) -> Result<Quest, QuestError> {
        loop {
            let fetched = self.get(id).await?;
            let quest = match self.store_fetched(&fetched).await {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(quest_id = %id, error = %err, "quest tree rejected; judging by the fetched state");
                    fetched
                }
            };
            if quest.state.is_finished() {
                return Ok(quest);
            }
            tokio::time::sleep(self.inner.config.wait_retry_delay).await;
        }
    }

    async fn get(&self, id: QuestId) -> Result<Quest, QuestError> {
        let quest = self
            .inner
            .service
            .get_quest(id)
            .await
            .map_err(|source| QuestError::Fetch { id, source })?;
        debug!(quest_id = %id, state = ?quest.state, "quest refreshed");
        Ok(quest)
    }

    async fn store_fetched(&self, quest: &Quest) -> Result<Quest, StoreError> {
        let now = self.inner.clock.now();
        let mut cell = self.inner.store.write().await;
        cell.quests.upsert(quest, now)?;
        Ok(cell.quests.snapshot(quest.id).unwrap_or_else(|| quest.clone()))
    }

    /// Wait for several quests at once. Results keep the order of `ids`.
    pub async fn wait_for_quests(&self, ids: &[QuestId]) -> Result<Vec<Quest>, QuestError> {
        try_join_all(ids.iter().map(|id| self.wait_for_quest(*id))).await
    }

    /// Switch polling on or off. The last call wins.
    ///
    /// Once `set_fetching(false)` has returned, no tick of the stopped poller
    /// writes to the store anymore, even one that was already in flight.
    pub async fn set_fetching(&self, fetching: bool) {
        let mut slot = self.inner.poller.lock().await;
        if fetching {
            if slot.as_ref().is_some_and(Poller::is_active) {
                return;
            }
            let generation = self.inner.store.read().await.generation;
            let interval = self.inner.config.poll_interval;
            *slot = Some(poller::spawn_for(&self.inner, generation, interval));
            info!(generation, "quest polling on");
        } else {
            let mut cell = self.inner.store.write().await;
            cell.generation += 1;
            drop(cell);
            if let Some(poller) = slot.take() {
                info!(generation = poller.generation(), "quest polling off");
                poller.stop();
            }
        }
    }

    pub async fn is_fetching(&self) -> bool {
        self.inner
            .poller
            .lock()
            .await
            .as_ref()
            .is_some_and(Poller::is_active)
    }

    /// Drop finished root quests and their subtrees from the store. Running
    /// quests stay. Returns the removed roots.
    pub async fn clear_quests(&self) -> Vec<QuestId> {
        let removed = self.inner.store.write().await.quests.clear_finished();
        if !removed.is_empty() {
            info!(count = removed.len(), "cleared finished quests");
        }
        removed
    }

    /// Delete finished main quests on the backend, then clear finished
    /// quests locally. Returns the ids deleted on the backend.
    ///
    /// Quests that were never listed as main quests are not sent to the
    /// backend. If any delete fails the store is left as it was.
    pub async fn purge_finished_quests(&self) -> Result<Vec<QuestId>, QuestError> {
        let finished = self.read(QuestStore::finished_main_quest_ids).await;
        try_join_all(finished.iter().map(|id| async move {
            self.inner
                .service
                .delete_quest(*id)
                .await
                .map_err(|source| QuestError::Delete { id: *id, source })
        }))
        .await?;
        self.clear_quests().await;
        Ok(finished)
    }
}

impl ContextInner {
    /// `generation` is `Some` for poller ticks; such a write is skipped when
    /// polling was switched off after the tick started.
    async fn refresh_main(&self, generation: Option<u64>) -> Result<(), QuestError> {
        let quests = self.service.list_quests().await.map_err(QuestError::List)?;
        let now = self.clock.now();

        let mut cell = self.store.write().await;
        if let Some(generation) = generation
            && generation != cell.generation
        {
            debug!(generation, current = cell.generation, "dropping stale poll result");
            return Ok(());
        }

        let mut main_ids = Vec::with_capacity(quests.len());
        for quest in &quests {
            match cell.quests.upsert(quest, now) {
                Ok(()) => main_ids.push(quest.id),
                Err(err) => warn!(quest_id = %quest.id, error = %err, "skipping rejected quest"),
            }
        }
        debug!(count = main_ids.len(), "main quests refreshed");
        cell.quests.set_main_quest_ids(main_ids);
        Ok(())
    }
}

#[async_trait]
impl PollTarget for ContextInner {
    async fn poll_tick(&self, generation: u64) {
        if let Err(err) = self.refresh_main(Some(generation)).await {
            warn!(error = %err, "poll tick failed; retrying on the next tick");
        }
    }
}
