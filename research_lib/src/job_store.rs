use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

pub use research_data::{Job, JobId, JobStatus};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, warn};

use crate::error::ValidationError;

// enough headroom for a renderer that falls a few transitions behind
const EVENT_CAPACITY: usize = 256;

/// Published after every successful create or update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobEvent {
    pub job: Job,
}

/// queries must contain something besides whitespace
pub fn validate_query(query: &str) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        Err(ValidationError::BlankQuery)
    } else {
        Ok(())
    }
}

/// Holds every job of the session, newest first.
/// Pure container: the only rule it enforces is the job state machine.
pub struct JobStore {
    // counter instead of uuid, ids stay short for display
    // never reset, so ids are unique for the lifetime of the store
    next_job_id: AtomicU64,
    jobs: Mutex<VecDeque<Job>>,
    events: broadcast::Sender<JobEvent>,
}

impl JobStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            next_job_id: AtomicU64::new(0),
            jobs: Mutex::new(VecDeque::new()),
            events,
        }
    }

    /// create a pending job for the query and put it in front
    #[instrument(skip(self))]
    pub async fn create(&self, query: &str) -> Result<Job, ValidationError> {
        validate_query(query)?;
        let id = JobId::new(self.next_job_id.fetch_add(1, Ordering::Relaxed));
        let job = Job::new(id, query);
        self.jobs.lock().await.push_front(job.clone());
        info!("created job {}", id);
        self.publish(&job);
        Ok(job)
    }

    /// move job to the given status
    /// unknown ids and refused transitions are logged and leave the store untouched,
    /// in both cases None is returned
    #[instrument(skip(self))]
    pub async fn update(&self, id: JobId, status: JobStatus) -> Option<Job> {
        let mut jobs = self.jobs.lock().await;
        let job = match jobs.iter_mut().find(|job| job.id == id) {
            Some(job) => job,
            None => {
                warn!("update for unknown job {} ignored", id);
                return None;
            }
        };
        if !job.status.can_transition_to(&status) {
            warn!(
                "refused transition of job {} from {} to {}",
                id,
                job.status.label(),
                status.label()
            );
            return None;
        }
        info!("job {}: {} -> {}", id, job.status.label(), status.label());
        job.status = status;
        let job = job.clone();
        drop(jobs);
        self.publish(&job);
        Some(job)
    }

    /// snapshot of all jobs, newest first
    pub async fn list(&self) -> Vec<Job> {
        self.jobs.lock().await.iter().cloned().collect()
    }

    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|job| job.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// session reset, drops every job
    #[instrument(skip_all)]
    pub async fn clear(&self) {
        let mut jobs = self.jobs.lock().await;
        info!("clearing {} jobs", jobs.len());
        jobs.clear();
    }

    /// stream of job snapshots, one per create/update
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn publish(&self, job: &Job) {
        // no subscribers is fine, the store stays the source of truth
        let _ = self.events.send(JobEvent { job: job.clone() });
    }
}
