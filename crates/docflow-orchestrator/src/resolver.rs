//! Enabled-set resolution.
//!
//! Layering, each layer overriding the previous:
//! 1. base registry `enabled` flags
//! 2. the effective profile's check overrides (a known family may redirect
//!    the profile, in which case the caller's profile is not applied)
//! 3. the family's own check overrides
//! 4. a non-empty caller selection replaces everything above
//!
//! Unknown profile and family names are ignored. Overrides naming checks
//! absent from the registry are dropped.

use std::collections::{BTreeMap, BTreeSet};

use docflow_domain::FlowConfig;
use tracing::debug;

pub struct EnabledSetResolver<'a> {
    config: &'a FlowConfig,
}

impl<'a> EnabledSetResolver<'a> {
    pub fn new(config: &'a FlowConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        profile: Option<&str>,
        family: Option<&str>,
        selection: &[String],
    ) -> BTreeSet<String> {
        if !selection.is_empty() {
            debug!(selection = ?selection, "Explicit selection replaces resolved set");
            return selection.iter().cloned().collect();
        }

        let mut flags: BTreeMap<&str, bool> = self
            .config
            .validators
            .iter()
            .map(|(id, descriptor)| (id.as_str(), descriptor.enabled))
            .collect();

        if let Some((_, effective)) = self.config.effective_profile(profile, family) {
            apply(&mut flags, &effective.checks);
        }

        if let Some(family_override) = family.and_then(|f| self.config.families.get(f)) {
            apply(&mut flags, &family_override.checks);
        }

        flags
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

fn apply(flags: &mut BTreeMap<&str, bool>, overrides: &BTreeMap<String, bool>) {
    for (id, enabled) in overrides {
        if let Some(flag) = flags.get_mut(id.as_str()) {
            *flag = *enabled;
        }
    }
}
