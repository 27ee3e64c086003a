//! Background-generation kernel.
//!
//! Leaves first: `fingerprint` → `runner` → `attempt`/`store` → `consumer`.

pub mod attempt;
pub mod cancel;
pub mod consumer;
pub mod fingerprint;
pub mod runner;
pub mod store;
pub mod telemetry;

pub use attempt::{AttemptId, GenerationAttempt, GenerationStatus};
pub use cancel::CancelReason;
pub use consumer::{DraftSource, FinishedDraft};
pub use fingerprint::{Fingerprint, InputSnapshot};
pub use runner::{GenerationRunner, RunOutcome};
pub use store::{BackgroundGeneration, StartDecision, StatusView};
