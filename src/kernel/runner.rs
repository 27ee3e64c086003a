//! Generation Task Runner.
//!
//! Wraps one collaborator call in cooperative cancellation. The runner never
//! touches the store; the caller decides what to do with the outcome.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::services::generation::{
    DocumentGenerator, GeneratedDocument, GenerationError, GenerationRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(GeneratedDocument),
    Failed(String),
    /// Not an error. The call was abandoned before any response arrived.
    Cancelled,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

#[derive(Clone)]
pub struct GenerationRunner {
    generator: Arc<dyn DocumentGenerator>,
}

impl GenerationRunner {
    pub fn new(generator: Arc<dyn DocumentGenerator>) -> Self {
        Self { generator }
    }

    /// Runs the request until it finishes or `cancel` fires, whichever first.
    /// Losing the race drops the request future, which aborts the HTTP call.
    pub async fn run(&self, request: GenerationRequest, cancel: CancellationToken) -> RunOutcome {
        if cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("generation cancelled in flight");
                RunOutcome::Cancelled
            }
            // A response racing a late cancel is still reported; the slot
            // drops it by attempt identity.
            result = self.generator.generate(request) => match result {
                Ok(document) => RunOutcome::Completed(document),
                Err(e) => {
                    warn!("generation failed: {}", e);
                    RunOutcome::Failed(e.to_string())
                }
            },
        }
    }

    /// Direct call without cancellation, for the synchronous fallback path.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GeneratedDocument, GenerationError> {
        self.generator.generate(request).await
    }
}
