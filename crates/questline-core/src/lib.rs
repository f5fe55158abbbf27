//! questline-core
//!
//! Client-side coordinator for long-running device jobs ("quests").
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, quest, state, request, errors）
//! - **ports**: 抽象化レイヤー（JobService, Clock）
//! - **store**: quest tree arena (`QuestStore`)
//! - **context**: `QuestContext` (store + backend + poller lifecycle)
//! - **workflow**: multi-step device operations (`Sequencer`, `Workflow`)
//! - **progress**: pure progress aggregation
//! - **config**: tuning parameters and backend location
//! - **impls**: 実装（HttpJobService, InMemoryJobService）

pub mod config;
pub mod context;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod progress;
pub mod store;
pub mod workflow;

mod poller;

pub use self::config::{ConfigError, HttpConfig, QuestConfig};
pub use self::context::QuestContext;
pub use self::progress::{ProgressView, SubtreeCounts, percent, subtree_counts};
pub use self::store::{QuestNode, QuestStore};
pub use self::workflow::{Sequencer, Workflow, WorkflowEvent, WorkflowObserver};
