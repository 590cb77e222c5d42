use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, instrument};

use crate::error::PipelineError;

/// The external system doing the actual research.
///
/// `run` is invoked at most once per job and must deliver exactly one outcome.
/// Timeouts may be layered on top by the runner.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Checked before any work starts. A refusal fails the job straight from pending.
    fn admit(&self, _query: &str) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn run(&self, query: &str) -> Result<String, PipelineError>;
}

const SIMULATED_DELAY: Duration = Duration::from_secs(3);

/// Stand-in used until a backend is reachable: waits, then reports a canned result.
pub struct SimulatedPipeline {
    delay: Duration,
}

impl SimulatedPipeline {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            delay: SIMULATED_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Pipeline for SimulatedPipeline {
    #[instrument(skip(self))]
    async fn run(&self, query: &str) -> Result<String, PipelineError> {
        info!("simulating research for {:?}", self.delay);
        sleep(self.delay).await;
        Ok(format!("Deep research completed for: \"{}\"", query))
    }
}
