use std::collections::VecDeque;
use serde::Serialize;

use super::event::{AwaitKind, ResolutionKind, TelemetryEvent};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub attempt_stats: AttemptStats,
    pub await_stats: AwaitStats,
    pub fresh_stats: FreshStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttemptStats {
    pub started: u64,
    pub superseded: u64,
    pub duplicate_starts: u64,
    pub ready: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub dropped_completions: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AwaitStats {
    pub hits: u64,
    pub waited: u64,
    pub timeouts: u64,
    pub misses: u64,
    pub avg_wait_ms: f64,
    /// Share of awaits answered from background work.
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FreshStats {
    pub succeeded: u64,
    pub failed: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    let mut latency_total = 0u64;
    let mut wait_total = 0u64;
    let mut wait_count = 0u64;

    for event in events {
        match event {
            TelemetryEvent::AttemptStarted { superseded, .. } => {
                snap.attempt_stats.started += 1;
                if superseded.is_some() {
                    snap.attempt_stats.superseded += 1;
                }
            }
            TelemetryEvent::DuplicateStartSkipped => snap.attempt_stats.duplicate_starts += 1,
            TelemetryEvent::AttemptResolved { outcome, latency_ms, .. } => {
                match outcome {
                    ResolutionKind::Ready => snap.attempt_stats.ready += 1,
                    ResolutionKind::Failed => snap.attempt_stats.failed += 1,
                }
                latency_total += latency_ms;
                snap.attempt_stats.max_latency_ms = snap.attempt_stats.max_latency_ms.max(*latency_ms);
            }
            TelemetryEvent::AttemptCancelled { .. } => snap.attempt_stats.cancelled += 1,
            TelemetryEvent::StaleCompletionDropped { .. } => snap.attempt_stats.dropped_completions += 1,
            TelemetryEvent::Await { kind, waited_ms } => {
                match kind {
                    AwaitKind::Hit => snap.await_stats.hits += 1,
                    AwaitKind::Waited => snap.await_stats.waited += 1,
                    AwaitKind::TimedOut => snap.await_stats.timeouts += 1,
                    AwaitKind::Miss => snap.await_stats.misses += 1,
                }
                if matches!(kind, AwaitKind::Waited | AwaitKind::TimedOut) {
                    wait_total += waited_ms;
                    wait_count += 1;
                }
            }
            TelemetryEvent::FreshGeneration { succeeded } => {
                if *succeeded {
                    snap.fresh_stats.succeeded += 1;
                } else {
                    snap.fresh_stats.failed += 1;
                }
            }
        }
    }

    let resolved = snap.attempt_stats.ready + snap.attempt_stats.failed;
    if resolved > 0 {
        snap.attempt_stats.avg_latency_ms = latency_total as f64 / resolved as f64;
    }

    if wait_count > 0 {
        snap.await_stats.avg_wait_ms = wait_total as f64 / wait_count as f64;
    }

    let awaits = snap.await_stats.hits + snap.await_stats.waited + snap.await_stats.timeouts + snap.await_stats.misses;
    if awaits > 0 {
        snap.await_stats.hit_rate = (snap.await_stats.hits + snap.await_stats.waited) as f64 / awaits as f64;
    }

    snap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::attempt::AttemptId;
    use crate::kernel::cancel::CancelReason;

    #[test]
    fn counts_and_rates() {
        let a = AttemptId::new();
        let b = AttemptId::new();
        let events: VecDeque<TelemetryEvent> = vec![
            TelemetryEvent::AttemptStarted { attempt_id: a, superseded: None },
            TelemetryEvent::DuplicateStartSkipped,
            TelemetryEvent::AttemptCancelled { attempt_id: a, reason: CancelReason::FormUpdated },
            TelemetryEvent::AttemptStarted { attempt_id: b, superseded: Some(a) },
            TelemetryEvent::StaleCompletionDropped { attempt_id: a },
            TelemetryEvent::AttemptResolved { attempt_id: b, outcome: ResolutionKind::Ready, latency_ms: 300 },
            TelemetryEvent::Await { kind: AwaitKind::Hit, waited_ms: 0 },
            TelemetryEvent::Await { kind: AwaitKind::Waited, waited_ms: 100 },
            TelemetryEvent::Await { kind: AwaitKind::TimedOut, waited_ms: 50 },
            TelemetryEvent::Await { kind: AwaitKind::Miss, waited_ms: 0 },
            TelemetryEvent::FreshGeneration { succeeded: true },
        ]
        .into();

        let snap = compute_snapshot(&events);
        assert_eq!(snap.attempt_stats.started, 2);
        assert_eq!(snap.attempt_stats.superseded, 1);
        assert_eq!(snap.attempt_stats.duplicate_starts, 1);
        assert_eq!(snap.attempt_stats.cancelled, 1);
        assert_eq!(snap.attempt_stats.dropped_completions, 1);
        assert_eq!(snap.attempt_stats.avg_latency_ms, 300.0);
        assert_eq!(snap.await_stats.avg_wait_ms, 75.0);
        assert_eq!(snap.await_stats.hit_rate, 0.5);
        assert_eq!(snap.fresh_stats.succeeded, 1);
    }

    #[test]
    fn empty_buffer_is_all_zero() {
        assert_eq!(compute_snapshot(&VecDeque::new()), TelemetrySnapshot::default());
    }
}
