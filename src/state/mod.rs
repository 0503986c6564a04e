//! State module for tracking crawl job progress
//!
//! [`JobStatus`] is the per-job state machine persisted in the frontier table.

mod job_status;

pub use job_status::JobStatus;
