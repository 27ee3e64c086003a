//! Consumer side of the store: the terminal "generate now" action.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::attempt::{AttemptId, AttemptPhase};
use super::fingerprint::Fingerprint;
use super::store::BackgroundGeneration;
use super::telemetry::event::{AwaitKind, TelemetryEvent};
use crate::services::generation::{GeneratedDocument, GenerationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftSource {
    /// Reused from speculative work.
    Background,
    /// Produced by a synchronous call at finish time.
    Fresh,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedDraft {
    pub document: GeneratedDocument,
    pub source: DraftSource,
}

impl BackgroundGeneration {
    /// Result of background work for `fingerprint`, if there is one to hand
    /// over within `timeout`.
    ///
    /// Returns immediately for a ready attempt. Waits on a pending one. Every
    /// other state, and a timeout, yields `None` so the caller falls back to
    /// its own synchronous call. Never mutates the slot; a timed-out attempt
    /// keeps running for the next caller.
    pub async fn await_result(
        &self,
        fingerprint: &Fingerprint,
        timeout: Duration,
    ) -> Option<GeneratedDocument> {
        self.await_attempt(fingerprint, timeout).await.map(|(_, document)| document)
    }

    /// Like [`await_result`](Self::await_result), also naming the attempt
    /// that produced the document.
    pub(super) async fn await_attempt(
        &self,
        fingerprint: &Fingerprint,
        timeout: Duration,
    ) -> Option<(AttemptId, GeneratedDocument)> {
        let (id, mut settled) = {
            let mut inner = self.lock();
            let ready = inner.slot.ready_attempt(fingerprint).map(|(id, doc)| (id, doc.clone()));
            if let Some(ready) = ready {
                inner.telemetry.record(TelemetryEvent::Await {
                    kind: AwaitKind::Hit,
                    waited_ms: 0,
                });
                return Some(ready);
            }
            let waiter = inner.slot.pending_waiter(fingerprint);
            match waiter {
                Some(waiter) => waiter,
                None => {
                    inner.telemetry.record(TelemetryEvent::Await {
                        kind: AwaitKind::Miss,
                        waited_ms: 0,
                    });
                    return None;
                }
            }
        };

        let began = Instant::now();
        // The timer is owned by this future and dropped on either branch.
        let settle = settled.wait_for(|phase| *phase == AttemptPhase::Settled);
        let waited = tokio::time::timeout(timeout, settle).await.map(|changed| changed.is_ok());
        let waited_ms = began.elapsed().as_millis() as u64;

        let mut inner = self.lock();
        let (kind, document) = match waited {
            Ok(true) => match inner.slot.ready_result_of(id).cloned() {
                Some(document) => (AwaitKind::Waited, Some((id, document))),
                None => (AwaitKind::Miss, None),
            },
            // Sender dropped: the attempt was replaced or cleared.
            Ok(false) => (AwaitKind::Miss, None),
            Err(_) => {
                debug!(attempt = %id, waited_ms, "await timed out; caller falls back");
                (AwaitKind::TimedOut, None)
            }
        };
        inner.telemetry.record(TelemetryEvent::Await { kind, waited_ms });
        document
    }

    /// The wizard's finish action. Reuses the background draft for the current
    /// inputs when it arrives within `timeout`, otherwise generates
    /// synchronously. A reused draft is consumed.
    pub async fn generate_now(&self, timeout: Duration) -> Result<FinishedDraft, GenerationError> {
        let (fingerprint, request) = {
            let inner = self.lock();
            (inner.input_fingerprint.clone(), inner.request())
        };

        if !fingerprint.is_empty() {
            if let Some((id, document)) = self.await_attempt(&fingerprint, timeout).await {
                self.consume_attempt(id);
                info!(attempt = %id, %fingerprint, "finished with background draft");
                return Ok(FinishedDraft { document, source: DraftSource::Background });
            }
        }

        info!(%fingerprint, "no usable background draft; generating synchronously");
        let result = self.runner.generate(request).await;
        self.lock()
            .telemetry
            .record(TelemetryEvent::FreshGeneration { succeeded: result.is_ok() });

        match result {
            Ok(document) => Ok(FinishedDraft { document, source: DraftSource::Fresh }),
            Err(e) => {
                warn!("synchronous generation failed: {}", e);
                Err(e)
            }
        }
    }
}
