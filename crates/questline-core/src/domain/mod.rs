//! Domain model (IDs, quest snapshots, states, job requests, errors).

pub mod errors;
pub mod ids;
pub mod quest;
pub mod request;
pub mod state;

pub use errors::{QuestError, ServiceError, StoreError, WorkflowError};
pub use ids::{AppKey, InstanceId, QuestId};
pub use quest::{Quest, QuestProgress};
pub use request::{JobMeta, JobRequest};
pub use state::QuestState;
