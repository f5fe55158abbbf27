//! JobService port - the device's job/quest backend.
//!
//! The backend is fire-and-forget: every submission returns a quest id
//! immediately and the work happens asynchronously. Completion is observed by
//! polling `get_quest` until the quest reaches a terminal state.
//!
//! # 実装
//! - **HttpJobService**: REST adapter (`impls::http_job_service`)
//! - **InMemoryJobService**: scripted backend for development and tests

use async_trait::async_trait;

use crate::domain::{JobMeta, JobRequest, Quest, QuestId, ServiceError};

#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit one job. The returned id names the quest that tracks it.
    async fn submit(&self, request: JobRequest) -> Result<JobMeta, ServiceError>;

    /// Current snapshot of one quest, subquests included.
    async fn get_quest(&self, id: QuestId) -> Result<Quest, ServiceError>;

    /// Current snapshots of all main (top-level) quests.
    async fn list_quests(&self) -> Result<Vec<Quest>, ServiceError>;

    /// Forget a quest on the backend.
    async fn delete_quest(&self, id: QuestId) -> Result<(), ServiceError>;
}
