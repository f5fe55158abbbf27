//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpJobService**: device API over HTTP
//! - **InMemoryJobService**: scripted backend for development and tests

pub mod http_job_service;
pub mod inmem_job_service;

pub use self::http_job_service::HttpJobService;
pub use self::inmem_job_service::InMemoryJobService;
