//! Callback dispatch telemetry.
//!
//! `CallTelemetry` splits every synchronous call into the time spent waiting
//! for the interpreter lock and the time spent inside the callback. A long
//! lock wait means the async worker was busy; a long callback means the
//! script itself is slow. `DispatchStats` holds counters both threads update.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Running totals for one phase of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub total_us: u64,
    pub max_us: u32,
}

impl PhaseTiming {
    fn add(&mut self, us: u32) {
        self.total_us += us as u64;
        self.max_us = self.max_us.max(us);
    }

    /// Mean over `calls`, zero when there were none.
    pub fn avg_us(&self, calls: u64) -> u32 {
        if calls == 0 {
            0
        } else {
            (self.total_us / calls) as u32
        }
    }
}

/// Synchronous call timing since the last [`CallTelemetry::take_summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSummary {
    pub calls: u64,
    /// Time between requesting the interpreter lock and getting it
    pub lock_wait: PhaseTiming,
    /// Time inside the callback, result conversion included
    pub callback: PhaseTiming,
    /// Calls whose callback phase exceeded the budget
    pub overruns: u64,
}

/// Per-window timing of synchronous calls. Owned by the real-time thread, so
/// recording is plain arithmetic with no atomics or allocation.
#[derive(Debug, Default)]
pub struct CallTelemetry {
    window: CallSummary,
}

fn micros(duration: Duration) -> u32 {
    duration.as_micros().min(u32::MAX as u128) as u32
}

impl CallTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call. Only `callback` counts against `budget_us`: lock wait
    /// is time the script did not spend.
    pub fn record(&mut self, lock_wait: Duration, callback: Duration, budget_us: u32) {
        let callback_us = micros(callback);
        self.window.calls += 1;
        self.window.lock_wait.add(micros(lock_wait));
        self.window.callback.add(callback_us);
        if callback_us > budget_us {
            self.window.overruns += 1;
        }
    }

    /// Return the current window and start a new one.
    pub fn take_summary(&mut self) -> CallSummary {
        std::mem::take(&mut self.window)
    }
}

/// Counters shared by the dispatcher and its worker.
#[derive(Debug, Default)]
pub struct DispatchStats {
    immediate_calls: AtomicU64,
    deferred_calls: AtomicU64,
    completed_deferred: AtomicU64,
    callback_errors: AtomicU64,
    /// Deferred requests whose callable was gone by the time they ran
    skipped_requests: AtomicU64,
    queue_high_water: AtomicUsize,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub immediate_calls: u64,
    pub deferred_calls: u64,
    pub completed_deferred: u64,
    pub callback_errors: u64,
    pub skipped_requests: u64,
    pub queue_high_water: usize,
}

impl DispatchStats {
    pub(crate) fn record_immediate(&self) {
        self.immediate_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self, queue_len: usize) {
        self.deferred_calls.fetch_add(1, Ordering::Relaxed);
        self.queue_high_water.fetch_max(queue_len, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.callback_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            immediate_calls: self.immediate_calls.load(Ordering::Relaxed),
            deferred_calls: self.deferred_calls.load(Ordering::Relaxed),
            completed_deferred: self.completed_deferred.load(Ordering::Relaxed),
            callback_errors: self.callback_errors.load(Ordering::Relaxed),
            skipped_requests: self.skipped_requests.load(Ordering::Relaxed),
            queue_high_water: self.queue_high_water.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_are_tracked_separately() {
        let mut t = CallTelemetry::new();
        t.record(Duration::from_micros(5), Duration::from_micros(100), 500);
        t.record(Duration::from_micros(900), Duration::from_micros(300), 500);

        let s = t.take_summary();
        assert_eq!(s.calls, 2);
        assert_eq!(s.lock_wait.max_us, 900);
        assert_eq!(s.lock_wait.avg_us(s.calls), 452);
        assert_eq!(s.callback.max_us, 300);
        assert_eq!(s.callback.avg_us(s.calls), 200);
        // A long wait for the lock is not the callback's overrun
        assert_eq!(s.overruns, 0);
    }

    #[test]
    fn test_overrun_counts_callback_time() {
        let mut t = CallTelemetry::new();
        t.record(Duration::ZERO, Duration::from_micros(501), 500);
        t.record(Duration::ZERO, Duration::from_micros(500), 500);
        assert_eq!(t.take_summary().overruns, 1);
    }

    #[test]
    fn test_take_summary_starts_new_window() {
        let mut t = CallTelemetry::new();
        t.record(Duration::from_micros(10), Duration::from_micros(700), 500);
        assert_eq!(t.take_summary().calls, 1);
        assert_eq!(t.take_summary(), CallSummary::default());
        assert_eq!(CallSummary::default().callback.avg_us(0), 0);
    }

    #[test]
    fn test_stats_high_water_keeps_max() {
        let stats = DispatchStats::default();
        stats.record_deferred(3);
        stats.record_deferred(1);
        let snap = stats.snapshot();
        assert_eq!(snap.deferred_calls, 2);
        assert_eq!(snap.queue_high_water, 3);
    }
}
