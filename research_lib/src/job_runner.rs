use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::oneshot;
use tracing::{error, info, instrument, warn};

use crate::{
    error::{PipelineError, ValidationError},
    job_store::{validate_query, Job, JobId, JobStatus, JobStore},
    pipeline::Pipeline,
};

/// Returned by `submit`, the job already exists in the store at this point.
pub struct JobTicket {
    job: Job,
    done: oneshot::Receiver<Job>,
}

impl JobTicket {
    pub fn id(&self) -> JobId {
        self.job.id
    }

    /// the job as it was created, still pending
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Waits until the job reached a terminal state and returns that snapshot.
    ///
    /// None when the job was abandoned: the store was cleared while it was still in flight,
    /// or the runner's task was torn down, e.g. the runtime shut down.
    pub async fn wait(self) -> Option<Job> {
        self.done.await.ok()
    }
}

/// Drives jobs from pending to a terminal state by delegating to the pipeline.
/// Every transition goes through the store.
pub struct JobRunner {
    store: Arc<JobStore>,
    pipeline: Arc<dyn Pipeline>,
    timeout: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
}

impl JobRunner {
    pub fn new(store: Arc<JobStore>, pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            store,
            pipeline,
            timeout: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// fail jobs whose pipeline call takes longer than `limit`
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// number of jobs between submission and terminal state
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Busy means at least one job is in flight.
    /// Submissions are never refused because of it, throttling is up to the caller.
    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    /// submit a query for research
    /// blank queries are rejected without creating a job,
    /// everything else ends up completed or failed
    #[instrument(skip(self))]
    pub async fn submit(&self, query: &str) -> Result<JobTicket, ValidationError> {
        validate_query(query)?;
        let job = self.store.create(query).await?;
        let (done_tx, done_rx) = oneshot::channel();
        let busy = BusyGuard::acquire(&self.in_flight);

        if let Err(err) = self.pipeline.admit(query) {
            info!("pipeline refused job {}: {}", job.id, err);
            let failed = finish(&self.store, job.id, fail_status(&err)).await;
            drop(busy);
            if let Some(failed) = failed {
                let _ = done_tx.send(failed);
            }
        } else {
            info!("starting job {}", job.id);
            tokio::spawn(run_job(
                Arc::clone(&self.store),
                Arc::clone(&self.pipeline),
                self.timeout,
                job.clone(),
                done_tx,
                busy,
            ));
        }

        Ok(JobTicket { job, done: done_rx })
    }
}

/// running -> run pipeline -> completed/failed, reports the terminal snapshot on `done`
async fn run_job(
    store: Arc<JobStore>,
    pipeline: Arc<dyn Pipeline>,
    timeout: Option<Duration>,
    job: Job,
    done: oneshot::Sender<Job>,
    busy: BusyGuard,
) {
    store.update(job.id, JobStatus::Running).await;

    let status = match call_pipeline(pipeline, job.query.clone(), timeout).await {
        Ok(output) => JobStatus::Completed { output },
        Err(err) => {
            info!("job {} failed: {}", job.id, err);
            fail_status(&err)
        }
    };
    let finished = finish(&store, job.id, status).await;
    drop(busy);
    if let Some(finished) = finished {
        if done.send(finished).is_err() {
            info!("nobody waiting for job {}", job.id);
        }
    }
}

/// runs the pipeline in its own task so a panic there still resolves the job
async fn call_pipeline(
    pipeline: Arc<dyn Pipeline>,
    query: String,
    timeout: Option<Duration>,
) -> Result<String, PipelineError> {
    let mut handle = tokio::spawn(async move { pipeline.run(&query).await });
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                warn!("pipeline call exceeded {:?}, aborting", limit);
                handle.abort();
                return Err(PipelineError::Timeout);
            }
        },
        None => handle.await,
    };
    match joined {
        Ok(outcome) => outcome,
        Err(join_err) => {
            error!("pipeline task did not finish: {}", join_err);
            Err(PipelineError::Panicked)
        }
    }
}

fn fail_status(err: &PipelineError) -> JobStatus {
    JobStatus::Failed {
        error_message: err.to_string(),
    }
}

/// apply the terminal status, falls back to whatever the store holds if it was refused
async fn finish(store: &JobStore, id: JobId, status: JobStatus) -> Option<Job> {
    match store.update(id, status).await {
        Some(job) => Some(job),
        None => store.get(id).await,
    }
}

/// counts a job as in flight until dropped
struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
