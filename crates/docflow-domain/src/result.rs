//! Tier and flow results.
//!
//! Both are fully self-contained and serializable; the orchestrator keeps
//! no reference to them once returned.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TierId;
use crate::issue::SeverityCounts;
use crate::outcome::{OutcomeStatus, Routing, ValidationOutcome};

/// Result of one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResult {
    pub tier: TierId,
    pub name: String,

    /// Check ids in launch order.
    pub schedule: Vec<String>,

    /// Launch groups, in order. Every id in `schedule` appears in exactly
    /// one wave.
    pub waves: Vec<Vec<String>>,

    pub outcomes: BTreeMap<String, ValidationOutcome>,
    pub counts: SeverityCounts,
    pub duration_ms: u64,
    pub terminated_early: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

impl TierResult {
    pub fn new(tier: TierId, name: impl Into<String>) -> Self {
        Self {
            tier,
            name: name.into(),
            schedule: Vec::new(),
            waves: Vec::new(),
            outcomes: BTreeMap::new(),
            counts: SeverityCounts::default(),
            duration_ms: 0,
            terminated_early: false,
            termination_reason: None,
        }
    }

    /// Index of the wave that launched `check_id`.
    pub fn wave_of(&self, check_id: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|id| id == check_id))
    }

    /// Position of `check_id` in the schedule.
    pub fn position_of(&self, check_id: &str) -> Option<usize> {
        self.schedule.iter().position(|id| id == check_id)
    }
}

/// Result of a whole flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub run_id: Uuid,
    pub flow: String,
    pub started_at: DateTime<Utc>,

    /// SHA-256 of the configuration snapshot used for this run.
    pub config_digest: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    /// Resolved set of checks to run, sorted.
    pub enabled: Vec<String>,

    /// Tiers that ran, in execution order.
    pub tiers: Vec<TierResult>,

    pub results: BTreeMap<String, ValidationOutcome>,
    pub routing: BTreeMap<String, Routing>,
    pub totals: SeverityCounts,
    pub terminated_early: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,

    pub duration_ms: u64,
}

impl FlowResult {
    pub fn tiers_executed(&self) -> usize {
        self.tiers.len()
    }

    pub fn total_critical(&self) -> usize {
        self.totals.critical
    }

    /// Check ids whose outcome has `status`, sorted.
    pub fn with_status(&self, status: OutcomeStatus) -> Vec<&str> {
        self.results
            .values()
            .filter(|o| o.status == status)
            .map(|o| o.check_id.as_str())
            .collect()
    }

    /// Mean confidence over checks that produced a normal result.
    pub fn mean_confidence(&self) -> Option<f64> {
        let ok: Vec<f64> = self
            .results
            .values()
            .filter(|o| o.status == OutcomeStatus::Ok)
            .map(|o| o.confidence)
            .collect();
        if ok.is_empty() {
            None
        } else {
            Some(ok.iter().sum::<f64>() / ok.len() as f64)
        }
    }
}
