//! The single attempt slot and the only transitions allowed on it.
//!
//! Every mutation goes through [`AttemptSlot::reduce`]. The slot holds at most
//! one attempt; beginning a new one cancels and drops the previous one inside
//! the same call, so two attempts never coexist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cancel::CancelReason;
use super::fingerprint::Fingerprint;
use super::runner::RunOutcome;
use crate::services::generation::GeneratedDocument;

/// Identity of one attempt. Two attempts may share a fingerprint (the user
/// reverts an edit), never an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Idle,
    Pending,
    Ready,
    Error,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub id: AttemptId,
    pub fingerprint: Fingerprint,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<GeneratedDocument>,
    pub error: Option<String>,
    pub status: GenerationStatus,
}

impl GenerationAttempt {
    pub fn pending(fingerprint: Fingerprint) -> Self {
        Self {
            id: AttemptId::new(),
            fingerprint,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
            status: GenerationStatus::Pending,
        }
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds().max(0) as u64)
    }
}

/// Broadcast to waiters. `Settled` means the attempt left `pending`; waiters
/// re-read the slot to learn how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Pending,
    Settled,
}

#[derive(Debug)]
struct Tracked {
    attempt: GenerationAttempt,
    cancel: CancellationToken,
    settled: watch::Sender<AttemptPhase>,
}

#[derive(Debug)]
pub enum SlotDelta {
    Begin {
        attempt: GenerationAttempt,
        cancel: CancellationToken,
        settled: watch::Sender<AttemptPhase>,
    },
    Resolve {
        id: AttemptId,
        fingerprint: Fingerprint,
        outcome: RunOutcome,
    },
    Cancel(CancelReason),
}

/// What a reduction actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Began { id: AttemptId, superseded: Option<AttemptId> },
    Resolved { id: AttemptId, status: GenerationStatus, latency_ms: u64 },
    /// A real completion for an attempt that is no longer the live pending one.
    Dropped { id: AttemptId },
    Cancelled { id: AttemptId, status: GenerationStatus },
    Unchanged,
}

#[derive(Debug, Default)]
pub struct AttemptSlot {
    current: Option<Tracked>,
}

impl AttemptSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(&mut self, delta: SlotDelta) -> Applied {
        match delta {
            SlotDelta::Begin { attempt, cancel, settled } => {
                let id = attempt.id;
                // Dropping the old sender wakes its waiters with a closed channel.
                let superseded = self.current.take().map(|old| {
                    old.cancel.cancel();
                    old.attempt.id
                });
                self.current = Some(Tracked { attempt, cancel, settled });
                Applied::Began { id, superseded }
            }
            SlotDelta::Resolve { id, fingerprint, outcome } => {
                let (status, result, error) = match outcome {
                    RunOutcome::Completed(document) => {
                        (GenerationStatus::Ready, Some(document), None)
                    }
                    RunOutcome::Failed(message) => (GenerationStatus::Error, None, Some(message)),
                    // The token only fires after the slot has moved off this
                    // attempt, and no completion arrived.
                    RunOutcome::Cancelled => return Applied::Unchanged,
                };

                let Some(tracked) = self.current.as_mut().filter(|t| {
                    t.attempt.id == id
                        && t.attempt.fingerprint == fingerprint
                        && t.attempt.status == GenerationStatus::Pending
                }) else {
                    return Applied::Dropped { id };
                };

                tracked.attempt.status = status;
                tracked.attempt.result = result;
                tracked.attempt.error = error;
                tracked.attempt.completed_at = Some(Utc::now());
                tracked.settled.send_replace(AttemptPhase::Settled);

                Applied::Resolved {
                    id,
                    status: tracked.attempt.status,
                    latency_ms: tracked.attempt.latency_ms().unwrap_or(0),
                }
            }
            SlotDelta::Cancel(reason) => {
                let Some(tracked) = self.current.as_mut() else {
                    return Applied::Unchanged;
                };
                tracked.cancel.cancel();
                let id = tracked.attempt.id;
                let status = reason.resulting_status();

                if status == GenerationStatus::Idle {
                    self.current = None;
                } else if tracked.attempt.status == GenerationStatus::Stale {
                    return Applied::Unchanged;
                } else {
                    tracked.attempt.status = GenerationStatus::Stale;
                    tracked.attempt.result = None;
                    tracked.attempt.completed_at.get_or_insert_with(Utc::now);
                    tracked.settled.send_replace(AttemptPhase::Settled);
                }
                Applied::Cancelled { id, status }
            }
        }
    }

    pub fn status(&self) -> GenerationStatus {
        self.current
            .as_ref()
            .map_or(GenerationStatus::Idle, |t| t.attempt.status)
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.current.as_ref().map(|t| &t.attempt.fingerprint)
    }

    /// True when an attempt for `fingerprint` is in flight or already done
    /// successfully, so starting another would be duplicate work.
    pub fn covers(&self, fingerprint: &Fingerprint) -> bool {
        self.current.as_ref().is_some_and(|t| {
            &t.attempt.fingerprint == fingerprint
                && matches!(t.attempt.status, GenerationStatus::Pending | GenerationStatus::Ready)
        })
    }

    /// Ready result for `fingerprint` together with the attempt that made it.
    pub fn ready_attempt(
        &self,
        fingerprint: &Fingerprint,
    ) -> Option<(AttemptId, &GeneratedDocument)> {
        self.current
            .as_ref()
            .filter(|t| {
                &t.attempt.fingerprint == fingerprint && t.attempt.status == GenerationStatus::Ready
            })
            .and_then(|t| t.attempt.result.as_ref().map(|document| (t.attempt.id, document)))
    }

    /// Ready result for exactly this attempt, if it is still the live one.
    pub fn ready_result_of(&self, id: AttemptId) -> Option<&GeneratedDocument> {
        self.current
            .as_ref()
            .filter(|t| t.attempt.id == id && t.attempt.status == GenerationStatus::Ready)
            .and_then(|t| t.attempt.result.as_ref())
    }

    pub fn pending_waiter(
        &self,
        fingerprint: &Fingerprint,
    ) -> Option<(AttemptId, watch::Receiver<AttemptPhase>)> {
        self.current
            .as_ref()
            .filter(|t| {
                &t.attempt.fingerprint == fingerprint
                    && t.attempt.status == GenerationStatus::Pending
            })
            .map(|t| (t.attempt.id, t.settled.subscribe()))
    }

    pub fn attempt(&self) -> Option<&GenerationAttempt> {
        self.current.as_ref().map(|t| &t.attempt)
    }
}
