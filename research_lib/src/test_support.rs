use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, Once,
    },
};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::{error::PipelineError, pipeline::Pipeline};

static INIT: Once = Once::new();

pub fn setup() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::init();
    });
}

type Outcome = Result<String, PipelineError>;

/// Pipeline whose outcomes are handed in by the test, one per expected query.
pub struct ManualPipeline {
    outcomes: Mutex<HashMap<String, oneshot::Receiver<Outcome>>>,
    refusals: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl ManualPipeline {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            refusals: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// the returned sender resolves the run for `query`
    pub fn expect(&self, query: &str) -> oneshot::Sender<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.outcomes.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    pub fn refuse(&self, query: &str, reason: &str) {
        self.refusals
            .lock()
            .unwrap()
            .insert(query.to_string(), reason.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pipeline for ManualPipeline {
    fn admit(&self, query: &str) -> Result<(), PipelineError> {
        match self.refusals.lock().unwrap().get(query) {
            Some(reason) => Err(PipelineError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn run(&self, query: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.lock().unwrap().remove(query);
        match outcome {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(PipelineError::Failed("outcome dropped".to_string()))),
            None => Err(PipelineError::Failed(format!("unexpected query {:?}", query))),
        }
    }
}

pub struct PanickingPipeline;

#[async_trait]
impl Pipeline for PanickingPipeline {
    async fn run(&self, _query: &str) -> Result<String, PipelineError> {
        panic!("pipeline blew up")
    }
}
