//! Execution of one tier as readiness waves.
//!
//! A wave is the set of pending checks whose dependencies have all
//! completed. Each wave is launched together (or one check at a time for a
//! sequential tier) and joined before readiness is recomputed. The
//! `completed` set and the severity counters are only touched at those join
//! points, by this task alone, so no locking is needed around them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::{Duration, Instant};

use docflow_domain::{
    FlowSettings, OutcomeStatus, Tier, TierId, TierResult, ValidationOutcome,
    ValidatorDescriptor,
};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::graph::DependencyGraph;
use crate::invoker::{Document, ValidatorInvoker};
use crate::obs;

/// Termination reason used when the caller cancels.
pub const CANCELLED_REASON: &str = "cancelled by caller";

/// Runs a single tier.
pub struct TierExecutor<'a> {
    invoker: &'a ValidatorInvoker,
    graph: &'a DependencyGraph,
    validators: &'a BTreeMap<String, ValidatorDescriptor>,
    cancel: Option<&'a CancelSignal>,
}

impl<'a> TierExecutor<'a> {
    pub fn new(
        invoker: &'a ValidatorInvoker,
        graph: &'a DependencyGraph,
        validators: &'a BTreeMap<String, ValidatorDescriptor>,
    ) -> Self {
        Self {
            invoker,
            graph,
            validators,
            cancel: None,
        }
    }

    /// Poll `cancel` before every wave.
    pub fn with_cancel(mut self, cancel: &'a CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.map(CancelSignal::is_cancelled).unwrap_or(false)
    }

    /// Descriptor deadline if set, else the tier's check timeout.
    fn check_deadline(&self, check_id: &str, settings: &FlowSettings) -> Duration {
        self.validators
            .get(check_id)
            .and_then(|d| d.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or_else(|| settings.check_timeout())
    }

    /// Run `tier` against `document`.
    ///
    /// Only members in `enabled` and not already in `completed` are
    /// scheduled. Every check that returns is added to `completed`.
    /// `settings` are the flow settings; the tier's own overrides are
    /// applied on top.
    #[instrument(skip_all, fields(tier = %tier_id))]
    pub async fn run(
        &self,
        tier_id: TierId,
        tier: &Tier,
        document: &Document,
        enabled: &BTreeSet<String>,
        completed: &mut HashSet<String>,
        settings: &FlowSettings,
    ) -> TierResult {
        let start = Instant::now();
        let settings = settings.merged(&tier.overrides);
        let name = if tier.name.is_empty() {
            tier_id.as_str().to_string()
        } else {
            tier.name.clone()
        };
        let mut result = TierResult::new(tier_id, name);

        let members = tier.runnable_members(enabled, completed);

        if members.is_empty() {
            debug!("No enabled checks in tier");
        } else if tier.parallel && !tier.respect_dependencies {
            self.run_unordered(members, document, completed, &settings, &mut result)
                .await;
        } else {
            self.run_waves(
                tier.parallel,
                members,
                document,
                completed,
                &settings,
                start,
                &mut result,
            )
            .await;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_tier_completed(
            tier_id,
            result.schedule.len(),
            result.counts.critical,
            result.duration_ms,
            result.terminated_early,
        );
        result
    }

    /// Launch every member at once, ignoring dependencies.
    async fn run_unordered(
        &self,
        members: Vec<String>,
        document: &Document,
        completed: &mut HashSet<String>,
        settings: &FlowSettings,
        result: &mut TierResult,
    ) {
        if self.cancelled() {
            mark_cancelled(result);
            return;
        }
        let tier_timeout = settings.tier_timeout();
        let outcomes = self
            .launch(&members, document, |id| {
                self.check_deadline(id, settings).max(tier_timeout)
            })
            .await;
        self.fold_wave(result, outcomes, completed, settings);
    }

    /// Dependency-respecting wave loop.
    #[allow(clippy::too_many_arguments)]
    async fn run_waves(
        &self,
        parallel: bool,
        members: Vec<String>,
        document: &Document,
        completed: &mut HashSet<String>,
        settings: &FlowSettings,
        start: Instant,
        result: &mut TierResult,
    ) {
        let tier_deadline = start + settings.tier_timeout();
        let mut pending = members;

        while !pending.is_empty() {
            if self.cancelled() {
                mark_cancelled(result);
                return;
            }

            let ready = self.graph.ready_subset(&pending, completed);
            if ready.is_empty() {
                warn!(pending = ?pending, "No pending check is ready, recording unmet dependencies");
                for id in pending.drain(..) {
                    let missing = self.graph.missing(&id, completed);
                    let outcome = ValidationOutcome::dependency_unmet(&id, &missing);
                    result.counts.record_all(&outcome.issues);
                    result.outcomes.insert(id, outcome);
                }
                return;
            }
            pending.retain(|id| !ready.contains(id));

            let mut groups = if parallel {
                vec![ready].into_iter()
            } else {
                ready
                    .into_iter()
                    .map(|id| vec![id])
                    .collect::<Vec<_>>()
                    .into_iter()
            };

            while let Some(group) = groups.next() {
                if self.cancelled() {
                    mark_cancelled(result);
                    return;
                }

                let remaining = tier_deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    warn!(
                        tier_timeout_ms = settings.tier_timeout_ms,
                        "Tier budget exhausted, abandoning pending checks"
                    );
                    let abandoned = group
                        .into_iter()
                        .chain(groups.by_ref().flatten())
                        .chain(pending.drain(..));
                    for id in abandoned {
                        let outcome = ValidationOutcome::tier_deadline_exceeded(&id);
                        result.counts.record_all(&outcome.issues);
                        result.outcomes.insert(id, outcome);
                    }
                    return;
                }

                let outcomes = self
                    .launch(&group, document, |id| {
                        self.check_deadline(id, settings).min(remaining)
                    })
                    .await;
                if self.fold_wave(result, outcomes, completed, settings) {
                    return;
                }
            }
        }
    }

    /// Launch `ids` concurrently; outcomes come back in launch order.
    async fn launch<F>(
        &self,
        ids: &[String],
        document: &Document,
        deadline_for: F,
    ) -> Vec<ValidationOutcome>
    where
        F: Fn(&str) -> Duration,
    {
        debug!(wave = ?ids, "Launching wave");
        join_all(ids.iter().map(|id| {
            let deadline = deadline_for(id);
            self.invoker
                .invoke(id, self.validators.get(id.as_str()), document, deadline)
        }))
        .await
    }

    /// Record a joined wave. Returns true when the tier must stop.
    fn fold_wave(
        &self,
        result: &mut TierResult,
        outcomes: Vec<ValidationOutcome>,
        completed: &mut HashSet<String>,
        settings: &FlowSettings,
    ) -> bool {
        let mut wave = Vec::with_capacity(outcomes.len());
        let mut first_failure = None;

        for outcome in outcomes {
            let id = outcome.check_id.clone();
            result.counts.record_all(&outcome.issues);
            if outcome.status == OutcomeStatus::Error && first_failure.is_none() {
                first_failure = Some(id.clone());
            }
            completed.insert(id.clone());
            result.schedule.push(id.clone());
            wave.push(id.clone());
            result.outcomes.insert(id, outcome);
        }
        result.waves.push(wave);

        if settings.critical_budget_exceeded(result.counts.critical) {
            let reason = format!(
                "{} critical issue(s) in tier '{}' reached the limit of {}",
                result.counts.critical, result.name, settings.max_critical_errors
            );
            info!(reason = %reason, "Stopping tier early");
            result.terminated_early = true;
            result.termination_reason = Some(reason);
            return true;
        }

        if !settings.continue_on_error {
            if let Some(id) = first_failure {
                let reason = format!("check '{id}' failed and continue_on_error is disabled");
                info!(reason = %reason, "Stopping tier early");
                result.terminated_early = true;
                result.termination_reason = Some(reason);
                return true;
            }
        }

        false
    }
}

fn mark_cancelled(result: &mut TierResult) {
    result.terminated_early = true;
    result.termination_reason = Some(CANCELLED_REASON.to_string());
}
