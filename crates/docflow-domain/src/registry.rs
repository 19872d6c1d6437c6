//! In-process agent registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::traits::{AgentRegistry, Check};

/// Agent registry backed by a `HashMap<agent_id, Arc<dyn Check>>`.
///
/// A poisoned lock is recovered with a warning; the map only holds `Arc`s.
#[derive(Default)]
pub struct MemoryAgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Check>>>,
}

impl MemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Check>>> {
        self.agents.read().unwrap_or_else(|poisoned| {
            warn!("Agent registry lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Check>>> {
        self.agents.write().unwrap_or_else(|poisoned| {
            warn!("Agent registry lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Bind `check` to `agent_id`, replacing any previous binding.
    pub fn register(&self, agent_id: impl Into<String>, check: Arc<dyn Check>) {
        self.write().insert(agent_id.into(), check);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(self, agent_id: impl Into<String>, check: Arc<dyn Check>) -> Self {
        self.register(agent_id, check);
        self
    }

    pub fn unregister(&self, agent_id: &str) -> bool {
        self.write().remove(agent_id).is_some()
    }

    /// Registered agent ids, sorted.
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl AgentRegistry for MemoryAgentRegistry {
    fn lookup(&self, agent_id: &str) -> Option<Arc<dyn Check>> {
        self.read().get(agent_id).cloned()
    }
}

impl std::fmt::Debug for MemoryAgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAgentRegistry")
            .field("agents", &self.agent_ids())
            .finish()
    }
}
