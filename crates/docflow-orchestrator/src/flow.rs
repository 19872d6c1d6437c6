//! Flow execution: the three tiers in order.
//!
//! State machine: `NotStarted -> Tier1 -> Tier2 -> Tier3 -> Completed`.
//! `TerminatedEarly` is absorbing and can be entered at the end of any tier
//! (critical budget, failed check with `continue_on_error` off, or caller
//! cancellation). Tiers already run keep their results.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use docflow_domain::{
    AgentRegistry, ConfigProvider, FlowConfig, FlowResult, SeverityCounts, ValidationContext,
    ValidationOutcome,
};
use tracing::{info, instrument, Span};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::invoker::{Document, ValidatorInvoker};
use crate::metrics::METRICS;
use crate::obs;
use crate::resolver::EnabledSetResolver;
use crate::tier::{TierExecutor, CANCELLED_REASON};

/// Runs one named flow configuration against documents.
///
/// Holds no per-run state, so one orchestrator can serve concurrent
/// `execute` calls.
pub struct FlowOrchestrator {
    flow: String,
    config: Arc<dyn ConfigProvider>,
    invoker: ValidatorInvoker,
}

impl FlowOrchestrator {
    pub fn new(
        flow: impl Into<String>,
        config: Arc<dyn ConfigProvider>,
        agents: Arc<dyn AgentRegistry>,
    ) -> Self {
        Self {
            flow: flow.into(),
            config,
            invoker: ValidatorInvoker::new(agents),
        }
    }

    pub fn flow(&self) -> &str {
        &self.flow
    }

    /// Current configuration snapshot for this flow.
    pub fn snapshot(&self) -> Result<Arc<FlowConfig>> {
        Ok(self.config.flow(&self.flow)?)
    }

    /// Reload the configuration source. The next `execute` sees the change.
    pub fn reload(&self) -> Result<()> {
        self.config.reload()?;
        info!(flow = %self.flow, "Configuration reloaded");
        Ok(())
    }

    /// Validate `content`. Fails only when the flow configuration cannot be
    /// obtained; every per-check failure is folded into the result.
    pub async fn execute(
        &self,
        content: &str,
        context: &ValidationContext,
        profile: Option<&str>,
        selection: &[String],
    ) -> Result<FlowResult> {
        self.execute_with_cancel(content, context, profile, selection, &CancelSignal::never())
            .await
    }

    /// Like [`execute`](Self::execute), stopping at the next join point once
    /// `cancel` is raised.
    #[instrument(
        name = "docflow.flow",
        skip_all,
        fields(flow = %self.flow, run_id = tracing::field::Empty)
    )]
    pub async fn execute_with_cancel(
        &self,
        content: &str,
        context: &ValidationContext,
        profile: Option<&str>,
        selection: &[String],
        cancel: &CancelSignal,
    ) -> Result<FlowResult> {
        let config = self.config.flow(&self.flow)?;
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));
        let run_label = run_id.to_string();
        let start = Instant::now();

        let family = context.family.as_deref();
        let effective = config.effective_profile(profile, family);
        let settings = config.settings_for(effective.map(|(_, p)| p));
        let enabled = EnabledSetResolver::new(&config).resolve(profile, family, selection);
        let graph = DependencyGraph::build(&config);
        let document = Document::new(content, context);

        METRICS.inc_flows_executed();
        obs::emit_flow_started(
            &run_label,
            &self.flow,
            effective.map(|(name, _)| name),
            enabled.len(),
        );

        let mut result = FlowResult {
            run_id,
            flow: self.flow.clone(),
            started_at: Utc::now(),
            config_digest: config.digest(),
            profile: effective.map(|(name, _)| name.to_string()),
            family: family.map(str::to_string),
            enabled: enabled.iter().cloned().collect(),
            tiers: Vec::new(),
            results: BTreeMap::new(),
            routing: BTreeMap::new(),
            totals: SeverityCounts::default(),
            terminated_early: false,
            termination_reason: None,
            duration_ms: 0,
        };

        let executor =
            TierExecutor::new(&self.invoker, &graph, &config.validators).with_cancel(cancel);
        let mut completed = HashSet::new();

        for (tier_id, tier) in config.tiers.iter() {
            if cancel.is_cancelled() {
                obs::emit_flow_terminated(&run_label, tier_id, CANCELLED_REASON);
                result.terminated_early = true;
                result.termination_reason = Some(CANCELLED_REASON.to_string());
                break;
            }

            let tier_result = executor
                .run(tier_id, tier, &document, &enabled, &mut completed, &settings)
                .await;

            for (id, outcome) in &tier_result.outcomes {
                result.routing.insert(id.clone(), outcome.routing());
                result.results.insert(id.clone(), outcome.clone());
            }
            result.totals.absorb(&tier_result.counts);

            let stop = if tier_result.terminated_early {
                Some(
                    tier_result
                        .termination_reason
                        .clone()
                        .unwrap_or_else(|| format!("tier '{}' terminated early", tier_result.name)),
                )
            } else if settings.critical_budget_exceeded(result.totals.critical) {
                Some(format!(
                    "{} critical issue(s) across the flow reached the limit of {}",
                    result.totals.critical, settings.max_critical_errors
                ))
            } else {
                None
            };
            result.tiers.push(tier_result);

            if let Some(reason) = stop {
                obs::emit_flow_terminated(&run_label, tier_id, &reason);
                result.terminated_early = true;
                result.termination_reason = Some(reason);
                break;
            }
        }

        if !result.terminated_early {
            for id in &enabled {
                if !result.results.contains_key(id) && config.tiers.tier_of(id).is_none() {
                    let outcome = ValidationOutcome::unscheduled(id);
                    result.routing.insert(id.clone(), outcome.routing());
                    result.results.insert(id.clone(), outcome);
                }
            }
        } else {
            METRICS.inc_flows_terminated();
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_flow_finished(
            &run_label,
            result.duration_ms,
            result.results.len(),
            result.totals.critical,
            result.terminated_early,
        );
        Ok(result)
    }
}
