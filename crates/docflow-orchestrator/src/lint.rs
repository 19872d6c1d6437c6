//! Static checks over a flow configuration.
//!
//! Linting never changes runtime behaviour. A cycle found here still runs
//! and ends as unmet-dependency outcomes.

use std::collections::BTreeSet;

use docflow_domain::FlowConfig;
use serde::Serialize;

use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LintLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    pub level: LintLevel,
    /// Stable machine-readable code, e.g. `dependency-cycle`.
    pub code: &'static str,
    pub message: String,
}

impl LintFinding {
    fn error(code: &'static str, message: String) -> Self {
        Self {
            level: LintLevel::Error,
            code,
            message,
        }
    }

    fn warning(code: &'static str, message: String) -> Self {
        Self {
            level: LintLevel::Warning,
            code,
            message,
        }
    }
}

/// All findings for `config`, errors first.
pub fn lint_config(config: &FlowConfig) -> Vec<LintFinding> {
    let mut findings = Vec::new();
    let graph = DependencyGraph::build(config);
    let known: BTreeSet<&str> = config.validators.keys().map(String::as_str).collect();

    if let Some(cycle) = graph.find_cycle() {
        findings.push(LintFinding::error(
            "dependency-cycle",
            format!("dependency cycle: {}", cycle.join(" -> ")),
        ));
    }

    for id in graph.nodes() {
        for dep in graph.dependencies(id) {
            if !known.contains(dep) {
                findings.push(LintFinding::error(
                    "unknown-dependency",
                    format!("'{id}' depends on unknown check '{dep}'"),
                ));
            }
        }
    }

    for (tier_id, tier) in config.tiers.iter() {
        for member in &tier.members {
            if !known.contains(member.as_str()) {
                findings.push(LintFinding::warning(
                    "undeclared-member",
                    format!("{tier_id} lists '{member}' which has no validator descriptor"),
                ));
            }
        }
    }

    for (id, descriptor) in &config.validators {
        match (config.tiers.tier_of(id), descriptor.tier) {
            (None, _) => findings.push(LintFinding::warning(
                "unassigned-check",
                format!("'{id}' is not listed by any tier and will never run"),
            )),
            (Some(actual), Some(declared)) if actual != declared => {
                findings.push(LintFinding::warning(
                    "tier-mismatch",
                    format!("'{id}' declares {declared} but is listed by {actual}"),
                ))
            }
            _ => {}
        }
    }

    for (name, profile) in &config.profiles {
        for id in profile.checks.keys() {
            if !known.contains(id.as_str()) {
                findings.push(LintFinding::warning(
                    "unknown-override",
                    format!("profile '{name}' overrides unknown check '{id}'"),
                ));
            }
        }
    }

    for (name, family) in &config.families {
        if let Some(profile) = &family.profile {
            if !config.profiles.contains_key(profile) {
                findings.push(LintFinding::error(
                    "unknown-profile",
                    format!("family '{name}' redirects to unknown profile '{profile}'"),
                ));
            }
        }
        for id in family.checks.keys() {
            if !known.contains(id.as_str()) {
                findings.push(LintFinding::warning(
                    "unknown-override",
                    format!("family '{name}' overrides unknown check '{id}'"),
                ));
            }
        }
    }

    findings.sort_by_key(|f| f.level);
    findings
}
