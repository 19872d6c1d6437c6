//! Docflow - tiered validation of documentation pages
//!
//! The `docflow` command runs a configured validation flow over a document.
//!
//! ## Commands
//!
//! - `lint`: check a flow configuration file for problems
//! - `plan`: show which checks would run, tier by tier and wave by wave
//! - `run`: validate a document with the command agents from the config

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docflow_domain::{
    ConfigProvider, FileConfigProvider, FlowConfig, FlowResult, OutcomeStatus, ValidationContext,
};
use docflow_orchestrator::{
    init_tracing, lint_config, registry_from_agents, DependencyGraph, EnabledSetResolver,
    FlowOrchestrator, LintLevel, METRICS,
};
use tracing::{info, Level};

const DEFAULT_FLOW: &str = "default";

#[derive(Parser)]
#[command(name = "docflow")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tiered validation of documentation pages", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which flow to use and which checks to enable.
#[derive(Args, Debug, Clone)]
struct Selection {
    /// Flow name in the configuration file
    #[arg(long, default_value = DEFAULT_FLOW)]
    flow: String,

    /// Profile to apply
    #[arg(long)]
    profile: Option<String>,

    /// Content family of the document
    #[arg(long)]
    family: Option<String>,

    /// Run only these checks (comma separated), ignoring all enablement rules
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file for problems
    Lint {
        /// Configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Lint only this flow (default: every flow)
        #[arg(long)]
        flow: Option<String>,
    },

    /// Show the resolved checks and their waves without running anything
    Plan {
        /// Configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },

    /// Validate a document
    Run {
        /// Configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Document to validate
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.log_json, level);

    match cli.command {
        Commands::Lint { config, flow } => cmd_lint(&config, flow.as_deref()),
        Commands::Plan { config, selection } => cmd_plan(&config, &selection),
        Commands::Run {
            config,
            file,
            selection,
            json,
        } => cmd_run(&config, &file, &selection, json).await,
    }
}

fn open_config(path: &Path) -> Result<FileConfigProvider> {
    FileConfigProvider::open(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Lint one or all flows; fails when any finding is an error.
fn cmd_lint(path: &Path, flow: Option<&str>) -> Result<()> {
    let provider = open_config(path)?;
    let names = match flow {
        Some(name) => vec![name.to_string()],
        None => provider.flow_names()?,
    };

    let mut errors = 0;
    for name in &names {
        let config = provider.flow(name)?;
        let findings = lint_config(&config);
        if findings.is_empty() {
            println!("{name}: ok");
            continue;
        }
        println!("{name}:");
        for finding in &findings {
            let level = match finding.level {
                LintLevel::Error => {
                    errors += 1;
                    "error"
                }
                LintLevel::Warning => "warning",
            };
            println!("  {level}[{}]: {}", finding.code, finding.message);
        }
    }

    if errors > 0 {
        bail!("{errors} lint error(s)");
    }
    Ok(())
}

fn cmd_plan(path: &Path, selection: &Selection) -> Result<()> {
    let provider = open_config(path)?;
    let config = provider.flow(&selection.flow)?;
    for line in render_plan(&config, selection) {
        println!("{line}");
    }
    Ok(())
}

/// Static wave plan, assuming every launched check completes.
fn render_plan(config: &FlowConfig, selection: &Selection) -> Vec<String> {
    let family = selection.family.as_deref();
    let profile = selection.profile.as_deref();
    let enabled =
        EnabledSetResolver::new(config).resolve(profile, family, &selection.only);
    let graph = DependencyGraph::build(config);

    let mut lines = Vec::new();
    if let Some((name, _)) = config.effective_profile(profile, family) {
        lines.push(format!("profile: {name}"));
    }
    lines.push(format!("enabled: {}", join(&enabled)));

    let mut completed = HashSet::new();
    let mut assigned = BTreeSet::new();
    for (tier_id, tier) in config.tiers.iter() {
        let members = tier.runnable_members(&enabled, &completed);
        assigned.extend(members.iter().cloned());

        let (waves, blocked) = if tier.parallel && !tier.respect_dependencies {
            (vec![members.clone()], Vec::new())
        } else {
            let plan = graph.plan_waves(&members, &completed);
            let waves = if tier.parallel {
                plan.waves
            } else {
                plan.waves.into_iter().flatten().map(|id| vec![id]).collect()
            };
            (waves, plan.blocked)
        };

        let label = if tier.name.is_empty() {
            tier_id.to_string()
        } else {
            format!("{tier_id} ({})", tier.name)
        };
        lines.push(label);
        if waves.iter().all(Vec::is_empty) && blocked.is_empty() {
            lines.push("  (nothing to run)".to_string());
        }
        for (i, wave) in waves.iter().filter(|w| !w.is_empty()).enumerate() {
            lines.push(format!("  wave {}: {}", i + 1, wave.join(", ")));
            completed.extend(wave.iter().cloned());
        }
        if !blocked.is_empty() {
            lines.push(format!("  blocked: {}", blocked.join(", ")));
        }
    }

    let unassigned: Vec<&String> = enabled.iter().filter(|id| !assigned.contains(*id)).collect();
    if !unassigned.is_empty() {
        lines.push(format!("unassigned: {}", join(unassigned)));
    }
    lines
}

async fn cmd_run(path: &Path, file: &Path, selection: &Selection, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let provider = Arc::new(open_config(path)?);
    let agents = registry_from_agents(&provider.document()?.agents);
    info!(agents = ?agents.agent_ids(), "Registered command agents");

    let orchestrator = FlowOrchestrator::new(&selection.flow, provider, Arc::new(agents));
    let mut context = ValidationContext::new().with_path(file.display().to_string());
    if let Some(family) = &selection.family {
        context = context.with_family(family);
    }

    let result = orchestrator
        .execute(&content, &context, selection.profile.as_deref(), &selection.only)
        .await
        .context("Flow execution failed")?;
    METRICS.flush();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_summary(&result));
    }

    if result.total_critical() > 0 {
        bail!("{} critical issue(s) found", result.total_critical());
    }
    Ok(())
}

fn render_summary(result: &FlowResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Run ID: {}\n", result.run_id));
    out.push_str(&format!("Flow: {}\n", result.flow));
    if let Some(profile) = &result.profile {
        out.push_str(&format!("Profile: {profile}\n"));
    }
    out.push_str(&format!("Duration: {}ms\n\n", result.duration_ms));

    for tier in &result.tiers {
        out.push_str(&format!("{} ({} checks, {}ms)\n", tier.tier, tier.schedule.len(), tier.duration_ms));
        for id in &tier.schedule {
            if let Some(outcome) = tier.outcomes.get(id) {
                out.push_str(&format!(
                    "  {} {} ({} issues, confidence {:.2})\n",
                    status_mark(outcome.status),
                    id,
                    outcome.issues.len(),
                    outcome.confidence
                ));
            }
        }
    }

    let not_run: Vec<&str> = result
        .results
        .values()
        .filter(|o| o.status == OutcomeStatus::Skipped || o.status == OutcomeStatus::Error)
        .filter(|o| !result.tiers.iter().any(|t| t.schedule.contains(&o.check_id)))
        .map(|o| o.check_id.as_str())
        .collect();
    if !not_run.is_empty() {
        out.push_str(&format!("\nNot run: {}\n", not_run.join(", ")));
    }

    let totals = &result.totals;
    out.push_str(&format!(
        "\nSummary: {} critical, {} error, {} warning, {} info\n",
        totals.critical, totals.error, totals.warning, totals.info
    ));
    if let Some(reason) = &result.termination_reason {
        out.push_str(&format!("Terminated early: {reason}\n"));
    }
    out
}

fn status_mark(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Ok => "✓",
        OutcomeStatus::Skipped => "-",
        OutcomeStatus::Timeout => "⏱",
        OutcomeStatus::Error => "✗",
    }
}

fn join<'a>(ids: impl IntoIterator<Item = &'a String>) -> String {
    let ids: Vec<&str> = ids.into_iter().map(String::as_str).collect();
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[flows.default.settings]
check_timeout_ms = 5000

[flows.default.tiers.tier1]
name = "fast"
members = ["yaml", "markdown"]

[flows.default.tiers.tier3]
name = "deep"
members = ["truth", "fuzzy"]
parallel = false

[flows.default.dependencies]
truth = ["fuzzy"]

[flows.default.validators.yaml]
tier = "tier1"
category = "frontmatter"

[flows.default.validators.markdown]
tier = "tier1"
category = "syntax"

[flows.default.validators.fuzzy]
tier = "tier3"
category = "truth"
enabled = false

[flows.default.validators.truth]
tier = "tier3"
category = "truth"

[flows.default.profiles.deep.checks]
fuzzy = true

[agents.yaml]
command = ["sh", "-c", "cat >/dev/null; echo '{\"confidence\":1.0}'"]

[agents.markdown]
command = ["sh", "-c", "cat >/dev/null; echo '{\"confidence\":0.9,\"issues\":[{\"severity\":\"warning\",\"category\":\"syntax\",\"message\":\"trailing space\"}]}'"]
"#;

    fn write_config(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("docflow.toml");
        std::fs::write(&path, CONFIG).unwrap();
        path
    }

    fn selection(profile: Option<&str>, only: &[&str]) -> Selection {
        Selection {
            flow: DEFAULT_FLOW.to_string(),
            profile: profile.map(str::to_string),
            family: None,
            only: only.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_cli_parses_run_with_selection() {
        let cli = Cli::try_parse_from([
            "docflow", "-v", "run", "--config", "flows.toml", "--file", "intro.md", "--only",
            "yaml,links", "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { selection, json, .. } => {
                assert!(json);
                assert_eq!(selection.flow, DEFAULT_FLOW);
                assert_eq!(selection.only, vec!["yaml", "links"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_plan_orders_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let provider = open_config(&write_config(&dir)).unwrap();
        let config = provider.flow(DEFAULT_FLOW).unwrap();

        let lines = render_plan(&config, &selection(Some("deep"), &[]));
        assert_eq!(lines[0], "profile: deep");
        assert_eq!(lines[1], "enabled: fuzzy, markdown, truth, yaml");
        assert!(lines.contains(&"  wave 1: yaml, markdown".to_string()));
        assert!(lines.contains(&"  wave 1: fuzzy".to_string()));
        assert!(lines.contains(&"  wave 2: truth".to_string()));
    }

    #[test]
    fn test_plan_reports_blocked_checks() {
        let dir = tempfile::tempdir().unwrap();
        let provider = open_config(&write_config(&dir)).unwrap();
        let config = provider.flow(DEFAULT_FLOW).unwrap();

        // fuzzy is disabled by default, so truth can never start.
        let lines = render_plan(&config, &selection(None, &[]));
        assert!(lines.contains(&"  blocked: truth".to_string()));
    }

    #[test]
    fn test_lint_passes_on_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        assert!(cmd_lint(&path, None).is_ok());
        assert!(cmd_lint(&path, Some("missing")).is_err());
    }

    #[tokio::test]
    async fn test_run_with_command_agents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        let doc = dir.path().join("intro.md");
        std::fs::write(&doc, "# Intro\n").unwrap();

        let result = cmd_run(&path, &doc, &selection(None, &["yaml", "markdown"]), true).await;
        assert!(result.is_ok(), "run failed: {:?}", result.err());
    }

    #[test]
    fn test_summary_lists_unrun_checks() {
        let result: FlowResult = serde_json::from_value(serde_json::json!({
            "run_id": "00000000-0000-0000-0000-000000000000",
            "flow": "default",
            "started_at": "2026-01-01T00:00:00Z",
            "config_digest": "abc",
            "enabled": ["ghost"],
            "tiers": [],
            "results": {
                "ghost": {
                    "check_id": "ghost",
                    "status": "skipped",
                    "confidence": 0.0,
                    "issues": [],
                    "reason": "not assigned to any tier",
                    "duration_ms": 0
                }
            },
            "routing": {"ghost": "skipped"},
            "totals": {"critical": 0, "error": 0, "warning": 0, "info": 0},
            "terminated_early": false,
            "duration_ms": 3
        }))
        .unwrap();

        let summary = render_summary(&result);
        assert!(summary.contains("Not run: ghost"));
        assert!(summary.contains("Summary: 0 critical"));
    }
}
