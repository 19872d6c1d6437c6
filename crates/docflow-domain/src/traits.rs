//! Capability traits consumed by the orchestrator.
//!
//! These traits are backend-agnostic. In-memory fakes live in
//! [`crate::fakes`]; a file-backed [`ConfigProvider`] lives in
//! [`crate::loader`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::FlowConfig;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::outcome::CheckReport;

/// A pluggable document check.
///
/// Implementations must be safe to call concurrently with other checks.
/// Ordinary findings belong in the returned report; `Err` is reserved for
/// environmental or programming failures.
#[async_trait]
pub trait Check: Send + Sync {
    async fn validate(
        &self,
        content: &str,
        context: &ValidationContext,
    ) -> anyhow::Result<CheckReport>;
}

/// Lookup of checks by agent id.
pub trait AgentRegistry: Send + Sync {
    fn lookup(&self, agent_id: &str) -> Option<Arc<dyn Check>>;
}

/// Source of flow configurations.
pub trait ConfigProvider: Send + Sync {
    /// Current snapshot of the named flow.
    fn flow(&self, name: &str) -> Result<Arc<FlowConfig>>;

    /// Re-read the underlying source. Takes effect for the next snapshot;
    /// snapshots already handed out are unaffected.
    fn reload(&self) -> Result<()>;
}
