//! Single-check invocation with a bounded deadline.
//!
//! Every way a check can end (normal report, deadline, missing agent,
//! returned error, panic) is captured as an [`Invocation`] and normalised
//! into a [`ValidationOutcome`]. Nothing here returns an error.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docflow_domain::{
    AgentRegistry, CheckReport, OutcomeStatus, ValidationContext, ValidationOutcome,
    ValidatorDescriptor,
};
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::metrics::METRICS;
use crate::obs;

/// The document under validation, shared by every check of a flow.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: Arc<str>,
    pub context: Arc<ValidationContext>,
}

impl Document {
    pub fn new(content: &str, context: &ValidationContext) -> Self {
        Self {
            content: Arc::from(content),
            context: Arc::new(context.clone()),
        }
    }
}

/// How one invocation ended, before normalisation.
#[derive(Debug)]
pub enum Invocation {
    /// The check returned a report.
    Completed(CheckReport),
    /// The deadline passed first.
    TimedOut(Duration),
    /// No agent is registered and the check has no descriptor.
    Unavailable,
    /// The check has a descriptor but its agent is not registered.
    Misconfigured { agent_id: String },
    /// The check returned an error or panicked.
    Failed(String),
}

impl Invocation {
    pub fn into_outcome(self, check_id: &str, elapsed: Duration) -> ValidationOutcome {
        match self {
            Invocation::Completed(report) => {
                ValidationOutcome::from_report(check_id, report, elapsed)
            }
            Invocation::TimedOut(deadline) => ValidationOutcome::timed_out(check_id, deadline),
            Invocation::Unavailable => ValidationOutcome::agent_unavailable(check_id),
            Invocation::Misconfigured { agent_id } => {
                ValidationOutcome::configuration_error(check_id, &agent_id)
            }
            Invocation::Failed(message) => ValidationOutcome::failed(check_id, message, elapsed),
        }
    }
}

/// Runs one check against its agent binding.
#[derive(Clone)]
pub struct ValidatorInvoker {
    agents: Arc<dyn AgentRegistry>,
}

impl ValidatorInvoker {
    pub fn new(agents: Arc<dyn AgentRegistry>) -> Self {
        Self { agents }
    }

    /// Invoke `check_id`, waiting at most `deadline`.
    ///
    /// The check runs on its own task; on timeout the task is aborted and
    /// the orchestrator moves on without waiting for it to wind down.
    pub async fn invoke(
        &self,
        check_id: &str,
        descriptor: Option<&ValidatorDescriptor>,
        document: &Document,
        deadline: Duration,
    ) -> ValidationOutcome {
        let start = Instant::now();
        let invocation = self.call(check_id, descriptor, document, deadline).await;
        let outcome = invocation.into_outcome(check_id, start.elapsed());

        METRICS.inc_checks_invoked();
        match outcome.status {
            OutcomeStatus::Ok => {}
            OutcomeStatus::Skipped => METRICS.inc_checks_skipped(),
            OutcomeStatus::Timeout => METRICS.inc_checks_timed_out(),
            OutcomeStatus::Error => METRICS.inc_checks_failed(),
        }
        obs::emit_check_completed(check_id, outcome.status, outcome.duration_ms);

        outcome
    }

    async fn call(
        &self,
        check_id: &str,
        descriptor: Option<&ValidatorDescriptor>,
        document: &Document,
        deadline: Duration,
    ) -> Invocation {
        let agent_id = descriptor
            .map(|d| d.agent_id(check_id))
            .unwrap_or(check_id);

        let Some(check) = self.agents.lookup(agent_id) else {
            return match descriptor {
                Some(_) => {
                    warn!(check = %check_id, agent = %agent_id, "Configured check has no registered agent");
                    Invocation::Misconfigured {
                        agent_id: agent_id.to_string(),
                    }
                }
                None => {
                    debug!(check = %check_id, "No agent registered, skipping");
                    Invocation::Unavailable
                }
            };
        };

        let content = Arc::clone(&document.content);
        let context = Arc::clone(&document.context);
        let mut handle =
            tokio::spawn(async move { check.validate(&content, &context).await });

        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(Ok(Ok(report))) => Invocation::Completed(report),
            Ok(Ok(Err(e))) => {
                warn!(check = %check_id, error = %e, "Check returned an error");
                Invocation::Failed(format!("check '{check_id}' failed: {e:#}"))
            }
            Ok(Err(join_err)) => {
                let message = join_failure_message(check_id, join_err);
                warn!(check = %check_id, error = %message, "Check task did not complete");
                Invocation::Failed(message)
            }
            Err(_) => {
                handle.abort();
                warn!(
                    check = %check_id,
                    deadline_ms = deadline.as_millis() as u64,
                    "Check timed out"
                );
                Invocation::TimedOut(deadline)
            }
        }
    }
}

fn join_failure_message(check_id: &str, join_err: JoinError) -> String {
    if join_err.is_panic() {
        let detail = panic_message(join_err.into_panic());
        format!("check '{check_id}' panicked: {detail}")
    } else {
        format!("check '{check_id}' was cancelled before finishing: {join_err}")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
