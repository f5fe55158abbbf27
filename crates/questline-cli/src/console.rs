//! Terminal rendering of workflows and quest trees.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use questline_core::domain::{Quest, QuestId, QuestState};
use questline_core::progress::{ProgressView, subtree_counts};
use questline_core::{QuestContext, WorkflowEvent, WorkflowObserver};
use tokio::task::JoinHandle;

/// Prints workflow events and remembers which quest is being waited on.
#[derive(Default)]
pub struct ConsoleObserver {
    current: Mutex<Option<QuestId>>,
}

impl ConsoleObserver {
    fn current(&self) -> Option<QuestId> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current(&self, id: Option<QuestId>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }
}

impl WorkflowObserver for ConsoleObserver {
    fn on_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Started { workflow } => println!("==> {workflow}"),
            WorkflowEvent::StepStarted { step, quest, .. } => {
                println!("  -> {step}: {}", quest.description);
                self.set_current(Some(quest.id));
            }
            WorkflowEvent::StepFinished { step, quest, .. } => {
                self.set_current(None);
                let mark = if quest.state.is_finished_ok() { "ok" } else { "FAILED" };
                println!("  <- {step}: {mark} ({})", state_label(quest.state));
            }
            WorkflowEvent::Succeeded { workflow } => println!("==> {workflow} done"),
            WorkflowEvent::Failed { workflow, message, .. } => {
                println!("==> {workflow} failed: {message}")
            }
        }
    }
}

/// Print the progress of the quest the observer is waiting on whenever it
/// changes. The store is kept fresh by the workflow's own refreshes.
pub fn spawn_progress_printer(
    context: QuestContext,
    observer: std::sync::Arc<ConsoleObserver>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last: Option<(QuestId, String)> = None;
        loop {
            tokio::time::sleep(every).await;
            let Some(id) = observer.current() else {
                continue;
            };
            let Some(quest) = context.snapshot(id).await else {
                continue;
            };
            let line = progress_line(&quest);
            if last.as_ref() != Some(&(id, line.clone())) {
                println!("     {line}");
                last = Some((id, line));
            }
        }
    })
}

fn state_label(state: QuestState) -> &'static str {
    match state {
        QuestState::Pending => "pending",
        QuestState::Ongoing => "ongoing",
        QuestState::Failing => "failing",
        QuestState::Failed => "failed",
        QuestState::Success => "success",
        QuestState::Skipped => "skipped",
    }
}

pub fn progress_line(quest: &Quest) -> String {
    let mut line = format!("[{}]", state_label(quest.state));
    if let Some(progress) = &quest.progress {
        let view = ProgressView::of(progress);
        if view.indeterminate {
            line.push_str(&format!(" {}", view.caption));
        } else {
            line.push_str(&format!(" {:>3.0}% ({})", view.percent, view.caption));
        }
    }
    if quest.is_composite() {
        let counts = subtree_counts(&quest.subquests);
        line.push_str(&format!(
            " subquests: {} finished, {} running, {} pending",
            counts.finished, counts.running, counts.remaining
        ));
    }
    if let Some(detail) = &quest.detail {
        line.push_str(&format!(" - {detail}"));
    }
    line
}

/// Indented tree of one quest.
pub fn print_tree(quest: &Quest, depth: usize) {
    println!(
        "{}#{} {} {}",
        "  ".repeat(depth),
        quest.id,
        quest.description,
        progress_line(quest)
    );
    for sub in &quest.subquests {
        print_tree(sub, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_shows_counts_and_percent() {
        let quest = Quest::new(1, QuestState::Ongoing, "Install")
            .with_progress(2, Some(5))
            .with_detail("Pulling image")
            .with_subquest(Quest::new(2, QuestState::Success, "a"))
            .with_subquest(Quest::new(3, QuestState::Pending, "b"));

        let line = progress_line(&quest);
        assert!(line.starts_with("[ongoing]"));
        assert!(line.contains(" 40% (2 of 5)"));
        assert!(line.contains("1 finished, 0 running, 1 pending"));
        assert!(line.ends_with("- Pulling image"));
    }

    #[test]
    fn indeterminate_progress_has_no_percent() {
        let quest = Quest::new(1, QuestState::Ongoing, "Export").with_progress(7, None);
        assert_eq!(progress_line(&quest), "[ongoing] 7 of unknown");
    }
}
