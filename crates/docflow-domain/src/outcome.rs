//! Per-check outcomes.
//!
//! Every invocation, whatever happened to it, is normalised into a
//! [`ValidationOutcome`]: the orchestrator never sees a raised error from a
//! check.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::issue::{Severity, ValidationIssue};

/// What a check returns on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub confidence: f64,

    #[serde(default)]
    pub issues: Vec<ValidationIssue>,

    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl CheckReport {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            ..Default::default()
        }
    }

    pub fn with_issue(mut self, issue: ValidationIssue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ok,
    Skipped,
    Timeout,
    Error,
}

/// Where a check's result was routed in the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    TieredExecution,
    Skipped,
    Error,
}

impl Routing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Routing::TieredExecution => "tiered_execution",
            Routing::Skipped => "skipped",
            Routing::Error => "error",
        }
    }
}

impl From<OutcomeStatus> for Routing {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Ok | OutcomeStatus::Timeout => Routing::TieredExecution,
            OutcomeStatus::Skipped => Routing::Skipped,
            OutcomeStatus::Error => Routing::Error,
        }
    }
}

/// Issue category used for synthesized timeout findings.
pub const CATEGORY_TIMEOUT: &str = "timeout";
/// Issue category used for synthesized check failures.
pub const CATEGORY_EXECUTION: &str = "execution";
/// Issue category used for unmet dependencies.
pub const CATEGORY_DEPENDENCY: &str = "dependency";
/// Issue category used for configuration problems.
pub const CATEGORY_CONFIGURATION: &str = "configuration";

/// One check's normalised result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub check_id: String,
    pub status: OutcomeStatus,

    /// Always within `[0, 1]`.
    pub confidence: f64,

    pub issues: Vec<ValidationIssue>,

    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,

    /// Why the check did not produce a normal result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub duration_ms: u64,
}

impl ValidationOutcome {
    fn synthesized(check_id: &str, status: OutcomeStatus, reason: String) -> Self {
        Self {
            check_id: check_id.to_string(),
            status,
            confidence: 0.0,
            issues: Vec::new(),
            metrics: BTreeMap::new(),
            reason: Some(reason),
            duration_ms: 0,
        }
    }

    /// Wrap a check's own report verbatim (confidence clamped).
    pub fn from_report(check_id: &str, report: CheckReport, elapsed: Duration) -> Self {
        Self {
            check_id: check_id.to_string(),
            status: OutcomeStatus::Ok,
            confidence: clamp_confidence(report.confidence),
            issues: report.issues,
            metrics: report.metrics,
            reason: None,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// No agent is bound for this check; not an error.
    pub fn agent_unavailable(check_id: &str) -> Self {
        Self::synthesized(check_id, OutcomeStatus::Skipped, "agent not registered".to_string())
    }

    /// The check is configured but its agent binding is missing.
    pub fn configuration_error(check_id: &str, agent_id: &str) -> Self {
        let mut outcome = Self::synthesized(
            check_id,
            OutcomeStatus::Skipped,
            "agent not registered".to_string(),
        );
        outcome.issues.push(ValidationIssue::error(
            CATEGORY_CONFIGURATION,
            format!("check '{check_id}' is enabled but agent '{agent_id}' is not registered"),
        ));
        outcome
    }

    /// The enabled check is not listed by any tier.
    pub fn unscheduled(check_id: &str) -> Self {
        Self::synthesized(
            check_id,
            OutcomeStatus::Skipped,
            "not assigned to any tier".to_string(),
        )
    }

    /// The check did not finish within its deadline.
    pub fn timed_out(check_id: &str, deadline: Duration) -> Self {
        let reason = format!("check exceeded deadline of {} ms", deadline.as_millis());
        let mut outcome = Self::synthesized(check_id, OutcomeStatus::Timeout, reason.clone());
        outcome
            .issues
            .push(ValidationIssue::warning(CATEGORY_TIMEOUT, reason));
        outcome.duration_ms = deadline.as_millis() as u64;
        outcome
    }

    /// The tier's own budget ran out before this check could start.
    pub fn tier_deadline_exceeded(check_id: &str) -> Self {
        let reason = "tier deadline exceeded".to_string();
        let mut outcome = Self::synthesized(check_id, OutcomeStatus::Timeout, reason.clone());
        outcome
            .issues
            .push(ValidationIssue::warning(CATEGORY_TIMEOUT, reason));
        outcome
    }

    /// The check raised (or panicked).
    pub fn failed(check_id: &str, message: impl Into<String>, elapsed: Duration) -> Self {
        let message = message.into();
        let mut outcome = Self::synthesized(check_id, OutcomeStatus::Error, message.clone());
        outcome
            .issues
            .push(ValidationIssue::error(CATEGORY_EXECUTION, message));
        outcome.duration_ms = elapsed.as_millis() as u64;
        outcome
    }

    /// The check never became ready: some dependency did not complete.
    pub fn dependency_unmet(check_id: &str, missing: &[String]) -> Self {
        let reason = format!("unmet dependencies: {}", missing.join(", "));
        let mut outcome = Self::synthesized(check_id, OutcomeStatus::Error, reason.clone());
        outcome
            .issues
            .push(ValidationIssue::error(CATEGORY_DEPENDENCY, reason));
        outcome
    }

    pub fn routing(&self) -> Routing {
        Routing::from(self.status)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_report_clamps_confidence() {
        let high = ValidationOutcome::from_report("yaml", CheckReport::new(1.7), Duration::ZERO);
        assert_eq!(high.confidence, 1.0);

        let low = ValidationOutcome::from_report("yaml", CheckReport::new(-0.2), Duration::ZERO);
        assert_eq!(low.confidence, 0.0);

        let nan = ValidationOutcome::from_report("yaml", CheckReport::new(f64::NAN), Duration::ZERO);
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn test_from_report_keeps_issues_and_metrics() {
        let report = CheckReport::new(0.8)
            .with_issue(ValidationIssue::warning("seo", "title too long"))
            .with_metric("headings", serde_json::json!(4));
        let outcome = ValidationOutcome::from_report("seo", report, Duration::from_millis(12));

        assert_eq!(outcome.status, OutcomeStatus::Ok);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.metrics["headings"], serde_json::json!(4));
        assert_eq!(outcome.duration_ms, 12);
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn test_timed_out_carries_warning() {
        let outcome = ValidationOutcome::timed_out("links", Duration::from_millis(50));
        assert_eq!(outcome.status, OutcomeStatus::Timeout);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].severity, Severity::Warning);
        assert_eq!(outcome.issues[0].category, CATEGORY_TIMEOUT);
        assert_eq!(outcome.routing(), Routing::TieredExecution);
    }

    #[test]
    fn test_failed_carries_error_text() {
        let outcome = ValidationOutcome::failed("code", "parser crashed", Duration::ZERO);
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.issues[0].severity, Severity::Error);
        assert!(outcome.issues[0].message.contains("parser crashed"));
        assert_eq!(outcome.routing(), Routing::Error);
    }

    #[test]
    fn test_agent_unavailable_has_no_issues() {
        let outcome = ValidationOutcome::agent_unavailable("nonexistent");
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.reason.as_deref(), Some("agent not registered"));
        assert_eq!(outcome.routing(), Routing::Skipped);
    }

    #[test]
    fn test_configuration_error_is_skipped_with_error_issue() {
        let outcome = ValidationOutcome::configuration_error("truth", "truth-agent");
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(outcome.count(Severity::Error), 1);
        assert_eq!(outcome.issues[0].category, CATEGORY_CONFIGURATION);
    }

    #[test]
    fn test_dependency_unmet_lists_missing() {
        let outcome =
            ValidationOutcome::dependency_unmet("truth", &["fuzzy_logic".to_string()]);
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.reason.unwrap().contains("fuzzy_logic"));
    }

    #[test]
    fn test_routing_serializes_snake_case() {
        let json = serde_json::to_string(&Routing::TieredExecution).unwrap();
        assert_eq!(json, "\"tiered_execution\"");
        assert_eq!(Routing::Skipped.as_str(), "skipped");
    }

    #[test]
    fn test_check_report_defaults_missing_fields() {
        let report: CheckReport = serde_json::from_str(r#"{"confidence": 0.5}"#).unwrap();
        assert!(report.issues.is_empty());
        assert!(report.metrics.is_empty());
    }
}
