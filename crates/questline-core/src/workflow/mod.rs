//! Workflow - 複数ジョブの逐次実行
//!
//! A workflow is an ordered list of steps. Each step submits one job, waits
//! for its quest and only continues when the quest finished ok. The first
//! failing step aborts the workflow; earlier steps are not rolled back.
//!
//! There is no resume. Running a workflow again starts at its first step and
//! resubmits jobs that already succeeded.

pub mod device;
mod events;

pub use self::device::{
    ExportApps, ImportArchive, InstallApp, InstanceAction, InstanceOp, SideloadApp, UninstallApp,
    UpdateApp,
};
pub use self::events::{NoopObserver, RefreshHook, WorkflowEvent, WorkflowObserver};

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::context::QuestContext;
use crate::domain::{JobRequest, Quest, QuestId, WorkflowError};

/// One user-facing operation made of quest-producing steps.
#[async_trait]
pub trait Workflow: Send + Sync {
    type Output: Send;

    /// Name used in events and logs.
    fn name(&self) -> &'static str;

    async fn run(&self, steps: &StepRunner<'_>) -> Result<Self::Output, WorkflowError>;
}

/// Runs workflows against one `QuestContext`.
#[derive(Clone)]
pub struct Sequencer {
    context: QuestContext,
    observer: Arc<dyn WorkflowObserver>,
    refresh: Option<Arc<dyn RefreshHook>>,
}

impl Sequencer {
    pub fn new(context: QuestContext) -> Self {
        Self {
            context,
            observer: Arc::new(NoopObserver),
            refresh: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_refresh_hook(mut self, hook: Arc<dyn RefreshHook>) -> Self {
        self.refresh = Some(hook);
        self
    }

    pub fn context(&self) -> &QuestContext {
        &self.context
    }

    /// Run `workflow` from its first step.
    pub async fn execute<W: Workflow>(&self, workflow: &W) -> Result<W::Output, WorkflowError> {
        let name = workflow.name();
        info!(workflow = name, "workflow started");
        self.observer.on_event(&WorkflowEvent::Started { workflow: name });

        let runner = StepRunner {
            context: &self.context,
            observer: self.observer.as_ref(),
            workflow: name,
        };
        match workflow.run(&runner).await {
            Ok(output) => {
                info!(workflow = name, "workflow succeeded");
                self.observer.on_event(&WorkflowEvent::Succeeded { workflow: name });
                if let Some(hook) = &self.refresh {
                    hook.refresh(name);
                }
                Ok(output)
            }
            Err(err) => {
                warn!(workflow = name, step = err.step(), error = %err, "workflow aborted");
                self.observer.on_event(&WorkflowEvent::Failed {
                    workflow: name,
                    step: err.step().map(str::to_string),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }
}

/// Step primitives handed to `Workflow::run`.
pub struct StepRunner<'a> {
    context: &'a QuestContext,
    observer: &'a dyn WorkflowObserver,
    workflow: &'static str,
}

impl StepRunner<'_> {
    pub fn context(&self) -> &QuestContext {
        self.context
    }

    /// Submit `request` and track its quest to the end.
    pub async fn step(&self, step: &str, request: JobRequest) -> Result<Quest, WorkflowError> {
        let kind = request.kind();
        let meta = self
            .context
            .service()
            .submit(request)
            .await
            .map_err(|source| WorkflowError::Submit {
                step: step.to_string(),
                source,
            })?;
        debug!(workflow = self.workflow, step, kind, job_id = %meta.job_id, "job submitted");
        self.track(step, meta.job_id).await
    }

    /// Follow an already submitted quest until it finishes.
    ///
    /// Fails with `QuestFailed` when the quest ends in any state other than
    /// success or skipped.
    pub async fn track(&self, step: &str, id: QuestId) -> Result<Quest, WorkflowError> {
        let first = self.context.fetch_quest(id).await?;
        self.observer.on_event(&WorkflowEvent::StepStarted {
            workflow: self.workflow,
            step: step.to_string(),
            quest: first.clone(),
        });

        let quest = if first.state.is_finished() {
            first
        } else {
            self.context.wait_for_quest(id).await?
        };
        self.observer.on_event(&WorkflowEvent::StepFinished {
            workflow: self.workflow,
            step: step.to_string(),
            quest: quest.clone(),
        });

        if !quest.state.is_finished_ok() {
            return Err(WorkflowError::QuestFailed {
                step: step.to_string(),
                quest_id: quest.id,
                state: quest.state,
                description: quest.description,
                detail: quest.detail,
            });
        }
        Ok(quest)
    }

    /// Submit all `requests` at once and wait for every one of them.
    ///
    /// Fails with the first error; the other quests keep running on the
    /// backend.
    pub async fn steps_concurrently(
        &self,
        step: &str,
        requests: Vec<JobRequest>,
    ) -> Result<Vec<Quest>, WorkflowError> {
        try_join_all(requests.into_iter().map(|request| self.step(step, request))).await
    }
}

/// The `result` a successful quest must carry for the next step.
pub fn require_result(step: &str, quest: &Quest) -> Result<String, WorkflowError> {
    quest
        .result
        .clone()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| WorkflowError::MissingResult {
            step: step.to_string(),
            quest_id: quest.id,
        })
}
