//! Workflow events and the collaborators that receive them.

use crate::domain::Quest;

/// What happened while a workflow ran.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Started {
        workflow: &'static str,
    },
    /// A step's job was accepted; `quest` is its first snapshot.
    StepStarted {
        workflow: &'static str,
        step: String,
        quest: Quest,
    },
    /// The step's quest reached a terminal state (ok or not).
    StepFinished {
        workflow: &'static str,
        step: String,
        quest: Quest,
    },
    Succeeded {
        workflow: &'static str,
    },
    Failed {
        workflow: &'static str,
        step: Option<String>,
        message: String,
    },
}

impl WorkflowEvent {
    pub fn workflow(&self) -> &'static str {
        match self {
            WorkflowEvent::Started { workflow }
            | WorkflowEvent::StepStarted { workflow, .. }
            | WorkflowEvent::StepFinished { workflow, .. }
            | WorkflowEvent::Succeeded { workflow }
            | WorkflowEvent::Failed { workflow, .. } => workflow,
        }
    }
}

/// Receives workflow events, e.g. to drive a progress display.
pub trait WorkflowObserver: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {
    fn on_event(&self, _event: &WorkflowEvent) {}
}

/// Called once after a workflow succeeded, so the caller can reload its app
/// and instance lists. The sequencer never reloads anything itself.
pub trait RefreshHook: Send + Sync {
    fn refresh(&self, workflow: &'static str);
}

impl<F> RefreshHook for F
where
    F: Fn(&'static str) + Send + Sync,
{
    fn refresh(&self, workflow: &'static str) {
        self(workflow)
    }
}
