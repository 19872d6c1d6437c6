//! Global atomic counters for docflow observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch of documents).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters: no allocations, no locking.
pub struct Metrics {
    checks_invoked: AtomicU64,
    checks_skipped: AtomicU64,
    checks_timed_out: AtomicU64,
    checks_failed: AtomicU64,
    flows_executed: AtomicU64,
    flows_terminated: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            checks_invoked: AtomicU64::new(0),
            checks_skipped: AtomicU64::new(0),
            checks_timed_out: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
            flows_executed: AtomicU64::new(0),
            flows_terminated: AtomicU64::new(0),
        }
    }

    pub fn inc_checks_invoked(&self) {
        self.checks_invoked.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_invoked", "counter incremented");
    }

    pub fn inc_checks_skipped(&self) {
        self.checks_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_skipped", "counter incremented");
    }

    pub fn inc_checks_timed_out(&self) {
        self.checks_timed_out.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_timed_out", "counter incremented");
    }

    pub fn inc_checks_failed(&self) {
        self.checks_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_failed", "counter incremented");
    }

    pub fn inc_flows_executed(&self) {
        self.flows_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "flows_executed", "counter incremented");
    }

    pub fn inc_flows_terminated(&self) {
        self.flows_terminated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "flows_terminated", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            checks_invoked = self.checks_invoked(),
            checks_skipped = self.checks_skipped(),
            checks_timed_out = self.checks_timed_out(),
            checks_failed = self.checks_failed(),
            flows_executed = self.flows_executed(),
            flows_terminated = self.flows_terminated(),
        );
    }

    pub fn checks_invoked(&self) -> u64 {
        self.checks_invoked.load(Ordering::Relaxed)
    }

    pub fn checks_skipped(&self) -> u64 {
        self.checks_skipped.load(Ordering::Relaxed)
    }

    pub fn checks_timed_out(&self) -> u64 {
        self.checks_timed_out.load(Ordering::Relaxed)
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks_failed.load(Ordering::Relaxed)
    }

    pub fn flows_executed(&self) -> u64 {
        self.flows_executed.load(Ordering::Relaxed)
    }

    pub fn flows_terminated(&self) -> u64 {
        self.flows_terminated.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.checks_invoked.store(0, Ordering::Relaxed);
        self.checks_skipped.store(0, Ordering::Relaxed);
        self.checks_timed_out.store(0, Ordering::Relaxed);
        self.checks_failed.store(0, Ordering::Relaxed);
        self.flows_executed.store(0, Ordering::Relaxed);
        self.flows_terminated.store(0, Ordering::Relaxed);
    }
}
