//! Docflow Domain Model
//!
//! Defines the typed shapes shared by the validation orchestrator and its
//! callers:
//! - Issues, severities and per-check outcomes
//! - Tier and flow results (serializable, self-contained)
//! - Flow configuration: settings, tiers, validators, profiles, family overrides
//! - Capability traits consumed by the orchestrator (`Check`, `AgentRegistry`,
//!   `ConfigProvider`) and a file-backed configuration provider
//!
//! In-memory fakes for the capability traits live in [`fakes`].

pub mod config;
pub mod context;
pub mod error;
pub mod fakes;
pub mod issue;
pub mod loader;
pub mod outcome;
pub mod registry;
pub mod result;
pub mod traits;

pub use config::{
    CommandAgentSpec, ConfigDocument, FamilyOverride, FlowConfig, FlowSettings, Profile,
    SettingOverrides, Tier, TierId, TierSet, ValidatorDescriptor,
};
pub use context::ValidationContext;
pub use error::{ConfigError, Result};
pub use issue::{Severity, SeverityCounts, ValidationIssue};
pub use loader::FileConfigProvider;
pub use outcome::{CheckReport, OutcomeStatus, Routing, ValidationOutcome};
pub use registry::MemoryAgentRegistry;
pub use result::{FlowResult, TierResult};
pub use traits::{AgentRegistry, Check, ConfigProvider};

/// Docflow domain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
