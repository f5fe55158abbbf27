//! Poller - 定期リフレッシュのタスク
//!
//! Idle ⇄ Polling. A `Poller` value exists only while polling; dropping it
//! (or calling `stop`) ends the task.
//!
//! - The target is held through a `Weak`, so the poller never keeps its owner
//!   alive. When the owner goes away the loop ends on its own.
//! - Each poller carries the generation it was started under. Targets use it
//!   to refuse writes from a poller that has been stopped in the meantime.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Something the poller refreshes once per tick.
#[async_trait]
pub(crate) trait PollTarget: Send + Sync + 'static {
    async fn poll_tick(&self, generation: u64);
}

pub(crate) struct Poller {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
    generation: u64,
}

impl Poller {
    /// Start polling. The first tick fires one `interval` from now.
    pub(crate) fn spawn<T: PollTarget>(target: Weak<T>, generation: u64, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            // 遅れた tick はまとめて撃たない
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let Some(target) = target.upgrade() else {
                            break;
                        };
                        target.poll_tick(generation).await;
                    }
                }
            }
            debug!(generation, "poller stopped");
        });

        debug!(generation, interval_ms = interval.as_millis() as u64, "poller started");
        Self {
            shutdown_tx,
            join,
            generation,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop the task. An in-flight tick is cancelled at its next await point.
    pub(crate) fn stop(self) {
        // the drop below aborts the task as well
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Spawn a poller over a strong handle; convenience for owners that only
/// have an `Arc` at hand.
pub(crate) fn spawn_for<T: PollTarget>(target: &Arc<T>, generation: u64, interval: Duration) -> Poller {
    Poller::spawn(Arc::downgrade(target), generation, interval)
}
