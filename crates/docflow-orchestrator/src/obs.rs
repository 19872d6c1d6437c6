//! Structured observability hooks for flow lifecycle events.
//!
//! Each function emits one named `tracing` event. Flow-level events carry
//! the run id; check-level events inherit it from the enclosing
//! `docflow.flow` span.

use docflow_domain::{OutcomeStatus, TierId};
use tracing::{debug, info, warn};

/// Emit event: flow started.
pub fn emit_flow_started(run_id: &str, flow: &str, profile: Option<&str>, enabled: usize) {
    info!(
        event = "flow.started",
        run_id = %run_id,
        flow = %flow,
        profile = profile.unwrap_or("-"),
        enabled = enabled,
    );
}

/// Emit event: one check finished (any status).
pub fn emit_check_completed(check_id: &str, status: OutcomeStatus, duration_ms: u64) {
    debug!(
        event = "check.completed",
        check = %check_id,
        status = ?status,
        duration_ms = duration_ms,
    );
}

/// Emit event: a tier finished.
pub fn emit_tier_completed(
    tier: TierId,
    executed: usize,
    critical: usize,
    duration_ms: u64,
    terminated_early: bool,
) {
    info!(
        event = "tier.completed",
        tier = %tier,
        executed = executed,
        critical = critical,
        duration_ms = duration_ms,
        terminated_early = terminated_early,
    );
}

/// Emit event: the flow stopped before running every tier (warning level).
pub fn emit_flow_terminated(run_id: &str, after: TierId, reason: &str) {
    warn!(
        event = "flow.terminated",
        run_id = %run_id,
        after = %after,
        reason = %reason,
    );
}

/// Emit event: flow finished with totals.
pub fn emit_flow_finished(
    run_id: &str,
    duration_ms: u64,
    results: usize,
    critical: usize,
    terminated_early: bool,
) {
    info!(
        event = "flow.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        results = results,
        critical = critical,
        terminated_early = terminated_early,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitters_do_not_panic_without_subscriber() {
        emit_flow_started("run-1", "docs", Some("strict"), 3);
        emit_check_completed("yaml", OutcomeStatus::Ok, 4);
        emit_tier_completed(TierId::Tier1, 3, 0, 12, false);
        emit_flow_terminated("run-1", TierId::Tier1, "critical budget");
        emit_flow_finished("run-1", 20, 3, 0, false);
    }
}
