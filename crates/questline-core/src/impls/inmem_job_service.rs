//! InMemoryJobService - 開発・テスト用のバックエンド
//!
//! Every quest is a script: a queue of snapshots. `get_quest` hands out the
//! next snapshot and keeps repeating the last one once the script is
//! exhausted, which is how a real backend behaves after a quest settles.
//!
//! Submissions without a script get a default one (ongoing, then success).
//! A `create-instance` job succeeds with `inst-<id>` as its result.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{JobMeta, JobRequest, Quest, QuestId, QuestState, ServiceError};
use crate::ports::JobService;

#[derive(Default)]
struct State {
    next_id: u64,
    scripts: HashMap<QuestId, VecDeque<Quest>>,
    /// Main quests in listing order.
    listed: Vec<QuestId>,
    fetches: HashMap<QuestId, usize>,
    failing: HashSet<QuestId>,
    submissions: Vec<(QuestId, JobRequest)>,
    deleted: Vec<QuestId>,
    rejected_kinds: HashSet<&'static str>,
}

pub struct InMemoryJobService {
    state: Mutex<State>,
    latency: Mutex<Duration>,
}

impl InMemoryJobService {
    pub fn new() -> Self {
        Self::with_first_job_id(1)
    }

    /// Submissions get ids starting at `first`.
    pub fn with_first_job_id(first: u64) -> Self {
        Self {
            state: Mutex::new(State {
                next_id: first,
                ..State::default()
            }),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Snapshots `get_quest(id)` returns, in order. Replaces any earlier script
    /// and lists the quest as a main quest.
    pub fn script(&self, id: u64, snapshots: Vec<Quest>) {
        let id = QuestId::new(id);
        let mut state = self.lock();
        state.scripts.insert(id, snapshots.into());
        if !state.listed.contains(&id) {
            state.listed.push(id);
        }
    }

    /// Make `quest` the only remaining snapshot of its id.
    pub fn publish(&self, quest: Quest) {
        self.script(quest.id.get(), vec![quest]);
    }

    /// While set, fetching `id` fails with a transport error.
    pub fn fail_fetches(&self, id: u64, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(QuestId::new(id));
        } else {
            state.failing.remove(&QuestId::new(id));
        }
    }

    /// Submissions of this kind (see `JobRequest::kind`) answer with 400.
    pub fn reject_submissions(&self, kind: &'static str) {
        self.lock().rejected_kinds.insert(kind);
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    pub fn submissions(&self) -> Vec<JobRequest> {
        self.lock()
            .submissions
            .iter()
            .map(|(_, req)| req.clone())
            .collect()
    }

    pub fn submitted_kinds(&self) -> Vec<&'static str> {
        self.lock()
            .submissions
            .iter()
            .map(|(_, req)| req.kind())
            .collect()
    }

    pub fn fetch_count(&self, id: u64) -> usize {
        self.lock()
            .fetches
            .get(&QuestId::new(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn deleted(&self) -> Vec<QuestId> {
        self.lock().deleted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryJobService {
    fn default() -> Self {
        Self::new()
    }
}

/// Ongoing, then success. Only `create-instance` produces a result.
fn default_script(id: QuestId, request: &JobRequest) -> VecDeque<Quest> {
    let description = describe(request);
    let mut done = Quest::new(id.get(), QuestState::Success, description.clone()).with_progress(1, Some(1));
    if matches!(request, JobRequest::CreateInstance { .. }) {
        done = done.with_result(format!("inst-{:03}", id.get()));
    }
    VecDeque::from([
        Quest::new(id.get(), QuestState::Ongoing, description).with_progress(0, Some(1)),
        done,
    ])
}

fn describe(request: &JobRequest) -> String {
    match request {
        JobRequest::InstallApp { app } => format!("Installation of {app}"),
        JobRequest::SideloadApp { .. } => "Sideloading app".to_string(),
        JobRequest::UninstallApp { app } => format!("Uninstallation of {app}"),
        JobRequest::CreateInstance { app, .. } => format!("Creating instance of {app}"),
        JobRequest::StartInstance { instance } => format!("Starting instance {}", instance.as_str()),
        JobRequest::StopInstance { instance } => format!("Stopping instance {}", instance.as_str()),
        JobRequest::DeleteInstance { instance } => format!("Deleting instance {}", instance.as_str()),
        JobRequest::UpdateInstance { instance, to } => {
            format!("Updating instance {} to {to}", instance.as_str())
        }
        JobRequest::Export { .. } => "Exporting apps and instances".to_string(),
        JobRequest::Import { file_name, .. } => format!("Importing {file_name}"),
    }
}

#[async_trait]
impl JobService for InMemoryJobService {
    async fn submit(&self, request: JobRequest) -> Result<JobMeta, ServiceError> {
        self.delay().await;
        let mut state = self.lock();
        if state.rejected_kinds.contains(request.kind()) {
            return Err(ServiceError::Status {
                status: 400,
                body: format!("{} rejected", request.kind()),
            });
        }

        let id = QuestId::new(state.next_id);
        state.next_id += 1;
        if !state.scripts.contains_key(&id) {
            let script = default_script(id, &request);
            state.scripts.insert(id, script);
        }
        if !state.listed.contains(&id) {
            state.listed.push(id);
        }
        state.submissions.push((id, request));
        Ok(JobMeta { job_id: id })
    }

    async fn get_quest(&self, id: QuestId) -> Result<Quest, ServiceError> {
        self.delay().await;
        let mut state = self.lock();
        *state.fetches.entry(id).or_insert(0) += 1;
        if state.failing.contains(&id) {
            return Err(ServiceError::Transport(format!("connection reset while fetching {id}")));
        }

        let script = state.scripts.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        let quest = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        quest.ok_or(ServiceError::NotFound(id))
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, ServiceError> {
        self.delay().await;
        let state = self.lock();
        Ok(state
            .listed
            .iter()
            .filter_map(|id| state.scripts.get(id).and_then(|s| s.front().cloned()))
            .collect())
    }

    async fn delete_quest(&self, id: QuestId) -> Result<(), ServiceError> {
        self.delay().await;
        let mut state = self.lock();
        if state.scripts.remove(&id).is_none() {
            return Err(ServiceError::NotFound(id));
        }
        state.listed.retain(|listed| *listed != id);
        state.deleted.push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppKey;

    #[tokio::test]
    async fn script_advances_then_repeats_the_last_snapshot() {
        let service = InMemoryJobService::new();
        service.script(
            5,
            vec![
                Quest::new(5, QuestState::Pending, "job"),
                Quest::new(5, QuestState::Success, "job"),
            ],
        );

        let id = QuestId::new(5);
        assert_eq!(service.get_quest(id).await.unwrap().state, QuestState::Pending);
        assert_eq!(service.get_quest(id).await.unwrap().state, QuestState::Success);
        assert_eq!(service.get_quest(id).await.unwrap().state, QuestState::Success);
        assert_eq!(service.fetch_count(5), 3);
    }

    #[tokio::test]
    async fn submissions_get_sequential_ids_and_default_scripts() {
        let service = InMemoryJobService::with_first_job_id(10);
        let app = AppKey::new("tech.flecs.mqtt-bridge", "1.0.0");

        let first = service
            .submit(JobRequest::InstallApp { app: app.clone() })
            .await
            .unwrap();
        let second = service
            .submit(JobRequest::CreateInstance {
                app,
                instance_name: None,
            })
            .await
            .unwrap();
        assert_eq!(first.job_id, QuestId::new(10));
        assert_eq!(second.job_id, QuestId::new(11));
        assert_eq!(service.submitted_kinds(), vec!["install-app", "create-instance"]);

        assert_eq!(service.get_quest(second.job_id).await.unwrap().state, QuestState::Ongoing);
        let done = service.get_quest(second.job_id).await.unwrap();
        assert_eq!(done.result.as_deref(), Some("inst-011"));
    }

    #[tokio::test]
    async fn listing_does_not_advance_scripts() {
        let service = InMemoryJobService::new();
        service.script(
            1,
            vec![
                Quest::new(1, QuestState::Pending, "a"),
                Quest::new(1, QuestState::Success, "a"),
            ],
        );

        let listed = service.list_quests().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, QuestState::Pending);
        assert_eq!(service.fetch_count(1), 0);
        assert_eq!(service.get_quest(QuestId::new(1)).await.unwrap().state, QuestState::Pending);
    }

    #[tokio::test]
    async fn failures_and_unknown_ids() {
        let service = InMemoryJobService::new();
        service.publish(Quest::new(3, QuestState::Ongoing, "x"));
        service.fail_fetches(3, true);

        assert!(matches!(
            service.get_quest(QuestId::new(3)).await,
            Err(ServiceError::Transport(_))
        ));
        assert!(matches!(
            service.get_quest(QuestId::new(4)).await,
            Err(ServiceError::NotFound(_))
        ));

        service.fail_fetches(3, false);
        assert!(service.get_quest(QuestId::new(3)).await.is_ok());

        service.delete_quest(QuestId::new(3)).await.unwrap();
        assert_eq!(service.deleted(), vec![QuestId::new(3)]);
        assert!(service.list_quests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_kinds_answer_with_a_status() {
        let service = InMemoryJobService::new();
        service.reject_submissions("sideload-app");

        let err = service
            .submit(JobRequest::SideloadApp {
                manifest: "{}".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 400, .. }));
        assert!(service.submissions().is_empty());
    }
}
