//! Ports - 抽象化レイヤー
//!
//! Each trait here is a seam to something outside the engine: the job
//! backend and the wall clock.

pub mod clock;
pub mod job_service;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::job_service::JobService;
