//! Typed flow configuration.
//!
//! A configuration document holds any number of named flows plus the
//! external-command agents that back their checks. The orchestrator only
//! ever sees an immutable [`FlowConfig`] snapshot.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One of the three fixed, strictly ordered stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierId {
    Tier1,
    Tier2,
    Tier3,
}

impl TierId {
    /// Execution order.
    pub const ALL: [TierId; 3] = [TierId::Tier1, TierId::Tier2, TierId::Tier3];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierId::Tier1 => "tier1",
            TierId::Tier2 => "tier2",
            TierId::Tier3 => "tier3",
        }
    }
}

impl std::fmt::Display for TierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Global flow policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// Deadline for a single check invocation.
    pub check_timeout_ms: u64,

    /// Budget for a whole tier.
    pub tier_timeout_ms: u64,

    /// Critical issues tolerated before early termination.
    pub max_critical_errors: usize,

    pub early_termination_on_critical: bool,

    /// When false, the first failed check stops the flow.
    pub continue_on_error: bool,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            check_timeout_ms: 30_000,
            tier_timeout_ms: 120_000,
            max_critical_errors: 1,
            early_termination_on_critical: true,
            continue_on_error: true,
        }
    }
}

impl FlowSettings {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    /// Return a copy with every override that is set applied.
    pub fn merged(&self, overrides: &SettingOverrides) -> FlowSettings {
        FlowSettings {
            check_timeout_ms: overrides.check_timeout_ms.unwrap_or(self.check_timeout_ms),
            tier_timeout_ms: overrides.tier_timeout_ms.unwrap_or(self.tier_timeout_ms),
            max_critical_errors: overrides
                .max_critical_errors
                .unwrap_or(self.max_critical_errors),
            early_termination_on_critical: overrides
                .early_termination_on_critical
                .unwrap_or(self.early_termination_on_critical),
            continue_on_error: overrides.continue_on_error.unwrap_or(self.continue_on_error),
        }
    }

    /// Whether `critical` issues exhaust the budget under this policy.
    ///
    /// A zero count never terminates, even with `max_critical_errors == 0`.
    pub fn critical_budget_exceeded(&self, critical: usize) -> bool {
        self.early_termination_on_critical
            && critical > 0
            && critical >= self.max_critical_errors
    }
}

/// Partial settings, applied by profiles and tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_critical_errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_termination_on_critical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
}

impl SettingOverrides {
    pub fn is_empty(&self) -> bool {
        *self == SettingOverrides::default()
    }
}

/// One ordered stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub members: Vec<String>,

    /// Launch each wave concurrently rather than one check at a time.
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// When false (and `parallel`), every member launches at once with no
    /// readiness waves.
    #[serde(default = "default_true")]
    pub respect_dependencies: bool,

    #[serde(default)]
    pub overrides: SettingOverrides,
}

impl Default for Tier {
    fn default() -> Self {
        Self {
            name: String::new(),
            members: Vec::new(),
            parallel: true,
            respect_dependencies: true,
            overrides: SettingOverrides::default(),
        }
    }
}

impl Tier {
    /// Create a parallel, dependency-respecting tier.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Run checks one at a time.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Launch all members together without readiness waves.
    pub fn ignoring_dependencies(mut self) -> Self {
        self.respect_dependencies = false;
        self
    }

    pub fn with_overrides(mut self, overrides: SettingOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Members still to schedule, in listed order: enabled, not yet
    /// completed, and each id only once.
    pub fn runnable_members(
        &self,
        enabled: &BTreeSet<String>,
        completed: &HashSet<String>,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        self.members
            .iter()
            .filter(|id| enabled.contains(id.as_str()) && !completed.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

/// The three fixed tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierSet {
    pub tier1: Tier,
    pub tier2: Tier,
    pub tier3: Tier,
}

impl TierSet {
    pub fn get(&self, id: TierId) -> &Tier {
        match id {
            TierId::Tier1 => &self.tier1,
            TierId::Tier2 => &self.tier2,
            TierId::Tier3 => &self.tier3,
        }
    }

    pub fn get_mut(&mut self, id: TierId) -> &mut Tier {
        match id {
            TierId::Tier1 => &mut self.tier1,
            TierId::Tier2 => &mut self.tier2,
            TierId::Tier3 => &mut self.tier3,
        }
    }

    /// Tiers in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (TierId, &Tier)> {
        TierId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }

    /// First tier listing `check_id`, if any.
    pub fn tier_of(&self, check_id: &str) -> Option<TierId> {
        self.iter()
            .find(|(_, tier)| tier.members.iter().any(|m| m == check_id))
            .map(|(id, _)| id)
    }
}

/// One pluggable check in the base registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    /// Agent id to look up; defaults to the check id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierId>,

    #[serde(default)]
    pub category: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Per-check deadline, overriding the flow's `check_timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for ValidatorDescriptor {
    fn default() -> Self {
        Self {
            agent: None,
            tier: None,
            category: String::new(),
            enabled: true,
            depends_on: Vec::new(),
            timeout_ms: None,
        }
    }
}

impl ValidatorDescriptor {
    pub fn new(tier: TierId, category: impl Into<String>) -> Self {
        Self {
            tier: Some(tier),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Agent id this check is bound to.
    pub fn agent_id<'a>(&'a self, check_id: &'a str) -> &'a str {
        self.agent.as_deref().unwrap_or(check_id)
    }
}

/// Named bundle of setting and check-enablement overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub settings: SettingOverrides,
    pub checks: BTreeMap<String, bool>,
}

/// Per-content-family override bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyOverride {
    /// Profile to use instead of the caller's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub checks: BTreeMap<String, bool>,
}

/// One named flow configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub settings: FlowSettings,
    pub tiers: TierSet,
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub validators: BTreeMap<String, ValidatorDescriptor>,
    pub profiles: BTreeMap<String, Profile>,
    pub families: BTreeMap<String, FamilyOverride>,
}

impl FlowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: FlowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_tier(mut self, id: TierId, tier: Tier) -> Self {
        *self.tiers.get_mut(id) = tier;
        self
    }

    pub fn with_validator(mut self, id: impl Into<String>, descriptor: ValidatorDescriptor) -> Self {
        self.validators.insert(id.into(), descriptor);
        self
    }

    pub fn with_dependency<I, S>(mut self, id: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .entry(id.into())
            .or_default()
            .extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_profile(mut self, name: impl Into<String>, profile: Profile) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }

    pub fn with_family(mut self, name: impl Into<String>, family: FamilyOverride) -> Self {
        self.families.insert(name.into(), family);
        self
    }

    /// Profile in force for a run: a known family's redirect to a known
    /// profile wins over the caller's request. Unknown names are ignored.
    pub fn effective_profile(
        &self,
        requested: Option<&str>,
        family: Option<&str>,
    ) -> Option<(&str, &Profile)> {
        let redirect = family
            .and_then(|f| self.families.get(f))
            .and_then(|f| f.profile.as_deref())
            .and_then(|name| self.profiles.get_key_value(name));
        redirect
            .or_else(|| requested.and_then(|name| self.profiles.get_key_value(name)))
            .map(|(name, profile)| (name.as_str(), profile))
    }

    /// Global settings with the profile's overrides applied.
    pub fn settings_for(&self, profile: Option<&Profile>) -> FlowSettings {
        match profile {
            Some(p) => self.settings.merged(&p.settings),
            None => self.settings.clone(),
        }
    }

    /// Deterministic SHA-256 of the configuration.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

/// External executable backing an agent id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAgentSpec {
    /// Executable followed by its arguments.
    pub command: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub flows: BTreeMap<String, FlowConfig>,
    pub agents: BTreeMap<String, CommandAgentSpec>,
}
