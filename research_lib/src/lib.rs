//! Tracks research jobs from submission to completion.
//!
//! The [`JobStore`](job_store::JobStore) holds every job of a session,
//! the [`JobRunner`](job_runner::JobRunner) moves jobs through their states
//! while a [`Pipeline`](pipeline::Pipeline) does the actual work.

pub mod error;
pub mod job_runner;
pub mod job_store;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use error::{PipelineError, ValidationError};
pub use job_runner::{JobRunner, JobTicket};
pub use job_store::{validate_query, JobEvent, JobStore};
pub use pipeline::{Pipeline, SimulatedPipeline};
pub use research_data::{Job, JobId, JobStatus, StatusTone};
