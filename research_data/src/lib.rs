use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one research request and its outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub query: String,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl Job {
    /// new jobs always start out pending
    pub fn new(id: JobId, query: &str) -> Self {
        Self {
            id,
            query: query.to_string(),
            status: JobStatus::Pending,
        }
    }

    /// result payload, only present once completed
    pub fn output(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Completed { output } => Some(output),
            _ => None,
        }
    }

    /// failure description, only present once failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { error_message } => Some(error_message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed { output: String },
    Failed { error_message: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Allowed moves: pending -> running, pending -> failed (fast fail),
    /// running -> completed, running -> failed.
    /// Nothing leaves a terminal state and nothing skips running on the way to completed.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed { .. })
                | (JobStatus::Running, JobStatus::Completed { .. })
                | (JobStatus::Running, JobStatus::Failed { .. })
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed { .. } => "COMPLETED",
            JobStatus::Failed { .. } => "FAILED",
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            JobStatus::Pending => StatusTone::Informational,
            JobStatus::Running => StatusTone::InProgress,
            JobStatus::Completed { .. } => StatusTone::Success,
            JobStatus::Failed { .. } => StatusTone::Error,
        }
    }
}

/// How a presentation layer should render a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTone {
    Informational,
    InProgress,
    Success,
    Error,
}
