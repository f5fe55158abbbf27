//! Scripted backend for `--demo`.

use std::time::Duration;

use questline_core::domain::{Quest, QuestState};
use questline_core::impls::InMemoryJobService;

/// The first submitted job pulls three layers; everything after it uses the
/// default script. One older, finished quest is listed as well.
pub fn backend() -> InMemoryJobService {
    let service = InMemoryJobService::new();
    service.set_latency(Duration::from_millis(150));

    service.script(
        900,
        vec![Quest::new(900, QuestState::Success, "Export of 2 apps").with_result("export-2025-06-18")],
    );

    let layers = |done: usize| -> Vec<Quest> {
        (0..3)
            .map(|i| {
                let state = match i.cmp(&done) {
                    std::cmp::Ordering::Less => QuestState::Success,
                    std::cmp::Ordering::Equal => QuestState::Ongoing,
                    std::cmp::Ordering::Greater => QuestState::Pending,
                };
                Quest::new(10 + i as u64, state, format!("Pull layer {}", i + 1))
            })
            .collect()
    };
    let snapshot = |state: QuestState, done: usize| {
        let mut quest = Quest::new(1, state, "Installation of app")
            .with_progress(done as u64, Some(3))
            .with_detail(format!("Downloading {done}/3 layers"));
        quest.subquests = layers(done);
        quest
    };
    service.script(
        1,
        vec![
            Quest::new(1, QuestState::Pending, "Installation of app"),
            snapshot(QuestState::Ongoing, 0),
            snapshot(QuestState::Ongoing, 1),
            snapshot(QuestState::Ongoing, 2),
            snapshot(QuestState::Success, 3),
        ],
    );
    service
}
