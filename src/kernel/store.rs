//! Background State Store.
//!
//! Session-lifetime owner of the single attempt slot plus the latest inputs
//! the wizard reported. All mutation happens under one mutex and never across
//! an `.await`, so the check-then-act in [`BackgroundGeneration::start`] is
//! atomic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::attempt::{
    Applied, AttemptId, AttemptPhase, AttemptSlot, GenerationAttempt, GenerationStatus, SlotDelta,
};
use super::cancel::CancelReason;
use super::fingerprint::{Fingerprint, InputSnapshot};
use super::runner::{GenerationRunner, RunOutcome};
use super::telemetry::event::{ResolutionKind, TelemetryEvent};
use super::telemetry::metrics::TelemetrySnapshot;
use super::telemetry::recorder::TelemetryRecorder;
use crate::services::generation::{
    DocumentGenerator, EnrichmentBundle, GeneratedDocument, GenerationRequest,
};

/// What `start()` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    Started(AttemptId),
    /// Same inputs already pending or ready.
    AlreadyCovered,
    /// Empty inputs.
    NothingToGenerate,
}

/// Read-only copy of the slot for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub status: GenerationStatus,
    pub attempt_id: Option<AttemptId>,
    pub fingerprint: Option<Fingerprint>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<GeneratedDocument>,
    pub error: Option<String>,
    /// Whether the attempt was made for the inputs as they are right now.
    pub matches_inputs: bool,
}

pub(super) struct Inner {
    pub(super) slot: AttemptSlot,
    pub(super) inputs: InputSnapshot,
    pub(super) input_fingerprint: Fingerprint,
    pub(super) enrichment: EnrichmentBundle,
    pub(super) telemetry: TelemetryRecorder,
}

impl Inner {
    fn new() -> Self {
        Self {
            slot: AttemptSlot::new(),
            inputs: InputSnapshot::Null,
            input_fingerprint: Fingerprint::empty(),
            enrichment: EnrichmentBundle::default(),
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub(super) fn request(&self) -> GenerationRequest {
        GenerationRequest::new(self.inputs.clone(), self.enrichment.clone())
    }

    fn cancel(&mut self, reason: CancelReason) -> Applied {
        let applied = self.slot.reduce(SlotDelta::Cancel(reason));
        if let Applied::Cancelled { id, status } = applied {
            info!(attempt = %id, %reason, ?status, "background generation cancelled");
            self.telemetry.record(TelemetryEvent::AttemptCancelled { attempt_id: id, reason });
        }
        applied
    }

    fn resolve(&mut self, id: AttemptId, fingerprint: Fingerprint, outcome: RunOutcome) {
        match self.slot.reduce(SlotDelta::Resolve { id, fingerprint, outcome }) {
            Applied::Resolved { id, status, latency_ms } => {
                let outcome = if status == GenerationStatus::Ready {
                    info!(attempt = %id, latency_ms, "background draft ready");
                    ResolutionKind::Ready
                } else {
                    warn!(attempt = %id, latency_ms, "background draft failed");
                    ResolutionKind::Failed
                };
                self.telemetry.record(TelemetryEvent::AttemptResolved {
                    attempt_id: id,
                    outcome,
                    latency_ms,
                });
            }
            Applied::Dropped { id } => {
                debug!(attempt = %id, "discarded completion of superseded attempt");
                self.telemetry.record(TelemetryEvent::StaleCompletionDropped { attempt_id: id });
            }
            _ => {}
        }
    }
}

/// Handle to the background generation controller. Cheap to clone; all
/// clones share one slot.
#[derive(Clone)]
pub struct BackgroundGeneration {
    pub(super) inner: Arc<Mutex<Inner>>,
    pub(super) runner: GenerationRunner,
}

impl BackgroundGeneration {
    pub fn new(generator: Arc<dyn DocumentGenerator>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
            runner: GenerationRunner::new(generator),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    /// Records the latest inputs. A live attempt made for different inputs is
    /// cancelled and left as `stale`.
    pub fn update_inputs(&self, snapshot: InputSnapshot) -> Fingerprint {
        let fingerprint = Fingerprint::of(&snapshot);
        let mut inner = self.lock();
        inner.inputs = snapshot;
        inner.input_fingerprint = fingerprint.clone();

        let outdated = inner.slot.status() != GenerationStatus::Idle
            && inner.slot.fingerprint() != Some(&fingerprint);
        if outdated {
            inner.cancel(CancelReason::FormUpdated);
        }
        fingerprint
    }

    /// Replaces the enrichment used by later starts. Does not invalidate.
    pub fn set_enrichment(&self, enrichment: EnrichmentBundle) {
        self.lock().enrichment = enrichment;
    }

    /// Begins speculative generation for the current inputs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> StartDecision {
        let mut inner = self.lock();
        let fingerprint = inner.input_fingerprint.clone();

        if fingerprint.is_empty() {
            debug!("start ignored: no inputs yet");
            return StartDecision::NothingToGenerate;
        }
        if inner.slot.covers(&fingerprint) {
            debug!(%fingerprint, "start ignored: inputs already covered");
            inner.telemetry.record(TelemetryEvent::DuplicateStartSkipped);
            return StartDecision::AlreadyCovered;
        }

        // Captured by value now; later edits must not reach this request.
        let request = inner.request();
        let attempt = GenerationAttempt::pending(fingerprint.clone());
        let id = attempt.id;
        let cancel = CancellationToken::new();
        let (settled, _) = watch::channel(AttemptPhase::Pending);

        let applied =
            inner.slot.reduce(SlotDelta::Begin { attempt, cancel: cancel.clone(), settled });
        let superseded = match applied {
            Applied::Began { superseded, .. } => superseded,
            _ => None,
        };
        info!(attempt = %id, %fingerprint, ?superseded, "background generation started");
        inner.telemetry.record(TelemetryEvent::AttemptStarted { attempt_id: id, superseded });
        drop(inner);

        let runner = self.runner.clone();
        let store: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let outcome = runner.run(request, cancel).await;
            if let Some(inner) = store.upgrade() {
                lock_inner(&inner).resolve(id, fingerprint, outcome);
            }
        });

        StartDecision::Started(id)
    }

    pub fn cancel(&self, reason: CancelReason) {
        self.lock().cancel(reason);
    }

    /// The current draft has been used; forget it.
    pub fn consume(&self) {
        self.cancel(CancelReason::Consumed);
    }

    /// Consumes only if `id` is still the live attempt. A newer attempt for
    /// the same inputs is left alone.
    pub(super) fn consume_attempt(&self, id: AttemptId) -> bool {
        let mut inner = self.lock();
        if inner.slot.attempt().map(|attempt| attempt.id) != Some(id) {
            return false;
        }
        matches!(inner.cancel(CancelReason::Consumed), Applied::Cancelled { .. })
    }

    pub fn read(&self) -> StatusView {
        let inner = self.lock();
        match inner.slot.attempt() {
            None => StatusView {
                status: GenerationStatus::Idle,
                attempt_id: None,
                fingerprint: None,
                started_at: None,
                completed_at: None,
                result: None,
                error: None,
                matches_inputs: false,
            },
            Some(attempt) => StatusView {
                status: attempt.status,
                attempt_id: Some(attempt.id),
                fingerprint: Some(attempt.fingerprint.clone()),
                started_at: Some(attempt.started_at),
                completed_at: attempt.completed_at,
                result: attempt.result.clone(),
                error: attempt.error.clone(),
                matches_inputs: attempt.fingerprint == inner.input_fingerprint,
            },
        }
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.lock().telemetry.snapshot()
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // Nothing panics while holding the lock; recover rather than propagate.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generation::GenerationError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Never;

    #[async_trait]
    impl DocumentGenerator for Never {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GeneratedDocument, GenerationError> {
            std::future::pending().await
        }
    }

    fn begin(inner: &mut Inner, fingerprint: &Fingerprint) -> AttemptId {
        let attempt = GenerationAttempt::pending(fingerprint.clone());
        let id = attempt.id;
        let (settled, _) = watch::channel(AttemptPhase::Pending);
        inner.slot.reduce(SlotDelta::Begin { attempt, cancel: CancellationToken::new(), settled });
        id
    }

    fn doc(text: &str) -> GeneratedDocument {
        GeneratedDocument { content: text.to_string(), metadata: json!({}) }
    }

    #[test]
    fn cancellation_is_not_counted_as_a_dropped_completion() {
        let mut inner = Inner::new();
        let key = Fingerprint::of(&json!({ "a": 1 }));
        let id = begin(&mut inner, &key);

        inner.cancel(CancelReason::Manual);
        inner.resolve(id, key, RunOutcome::Cancelled);

        let stats = inner.telemetry.snapshot().attempt_stats;
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.dropped_completions, 0);
        assert_eq!(inner.slot.status(), GenerationStatus::Idle);
    }

    #[test]
    fn only_real_completions_of_superseded_attempts_are_dropped() {
        let mut inner = Inner::new();
        let key = Fingerprint::of(&json!({ "a": 1 }));
        let first = begin(&mut inner, &key);
        let second = begin(&mut inner, &key);
        let third = begin(&mut inner, &key);

        inner.resolve(first, key.clone(), RunOutcome::Cancelled);
        assert_eq!(inner.telemetry.snapshot().attempt_stats.dropped_completions, 0);

        inner.resolve(first, key.clone(), RunOutcome::Completed(doc("late")));
        inner.resolve(second, key.clone(), RunOutcome::Failed("502".to_string()));
        let stats = inner.telemetry.snapshot().attempt_stats;
        assert_eq!(stats.dropped_completions, 2);
        assert_eq!(stats.ready + stats.failed, 0);

        inner.resolve(third, key.clone(), RunOutcome::Completed(doc("live")));
        let stats = inner.telemetry.snapshot().attempt_stats;
        assert_eq!(stats.dropped_completions, 2);
        assert_eq!(stats.ready, 1);
        assert_eq!(inner.slot.ready_attempt(&key), Some((third, &doc("live"))));
    }

    #[tokio::test]
    async fn consuming_a_replaced_attempt_leaves_the_new_one_alone() {
        let drafts = BackgroundGeneration::new(Arc::new(Never));
        let key = drafts.update_inputs(json!({ "a": 1 }));
        let StartDecision::Started(old) = drafts.start() else {
            panic!("expected a start");
        };
        drafts.lock().resolve(old, key.clone(), RunOutcome::Completed(doc("draft")));
        assert_eq!(drafts.read().status, GenerationStatus::Ready);

        // Same inputs, new attempt, before the old draft is consumed
        drafts.cancel(CancelReason::Navigation);
        let StartDecision::Started(new) = drafts.start() else {
            panic!("expected a restart");
        };

        assert!(!drafts.consume_attempt(old));
        let view = drafts.read();
        assert_eq!(view.status, GenerationStatus::Pending);
        assert_eq!(view.attempt_id, Some(new));

        assert!(drafts.consume_attempt(new));
        assert_eq!(drafts.read().status, GenerationStatus::Idle);
    }
}
