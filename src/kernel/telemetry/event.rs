use serde::{Deserialize, Serialize};

use crate::kernel::attempt::AttemptId;
use crate::kernel::cancel::CancelReason;

// Allowed: ids, reasons, durations, counts
// Forbidden: snapshot values, fingerprints, document content, error bodies

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    AttemptStarted {
        attempt_id: AttemptId,
        superseded: Option<AttemptId>,
    },

    /// `start()` skipped because the same inputs are already covered.
    DuplicateStartSkipped,

    AttemptResolved {
        attempt_id: AttemptId,
        outcome: ResolutionKind,
        latency_ms: u64,
    },

    AttemptCancelled {
        attempt_id: AttemptId,
        reason: CancelReason,
    },

    StaleCompletionDropped {
        attempt_id: AttemptId,
    },

    Await {
        kind: AwaitKind,
        waited_ms: u64,
    },

    FreshGeneration {
        succeeded: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionKind {
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwaitKind {
    /// Ready result handed over without waiting.
    Hit,
    /// Waited on the in-flight attempt and got its result.
    Waited,
    TimedOut,
    /// Nothing usable for the requested fingerprint.
    Miss,
}
