use thiserror::Error;

/// Raised before any job exists; never creates a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please enter a query")]
    BlankQuery,
}

/// Failure reported by (or around) the pipeline collaborator.
/// Always folded into a failed job by the runner, never returned past it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// collaborator refused the query before starting any work
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Failed(String),
    #[error("timeout")]
    Timeout,
    #[error("pipeline task panicked")]
    Panicked,
}
