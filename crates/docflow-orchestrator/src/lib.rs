//! Docflow Orchestrator - tiered validation of documentation pages
//!
//! Provides a validation orchestrator that:
//! - Resolves which checks run from the registry, profiles, family overrides
//!   and an explicit caller selection
//! - Runs three fixed tiers in order, each as dependency-ordered waves of
//!   concurrently launched checks
//! - Bounds every check by a deadline and normalises every outcome
//! - Stops early once the critical-issue budget is spent
//!
//! A flow always returns a complete [`FlowResult`], even under partial failure.

pub mod cancel;
pub mod command_check;
pub mod error;
pub mod flow;
pub mod graph;
pub mod invoker;
pub mod lint;
pub mod metrics;
pub mod obs;
pub mod resolver;
pub mod telemetry;
pub mod tier;

// Re-export key types
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use command_check::{registry_from_agents, CommandCheck};
pub use error::{OrchestratorError, Result};
pub use flow::FlowOrchestrator;
pub use graph::{DependencyGraph, WavePlan};
pub use invoker::{Document, Invocation, ValidatorInvoker};
pub use lint::{lint_config, LintFinding, LintLevel};
pub use metrics::METRICS;
pub use resolver::EnabledSetResolver;
pub use telemetry::init_tracing;
pub use tier::TierExecutor;

pub use docflow_domain::{FlowResult, TierResult, ValidationOutcome};
