//! Check dependency graph and readiness.
//!
//! Maps each check to the checks that must complete before it may start.
//! There is no cycle detection at build time: at run time a cycle shows up
//! as pending checks with no ready member, which the tier executor records
//! as unmet dependencies. [`DependencyGraph::find_cycle`] exists for config
//! linting only.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use docflow_domain::FlowConfig;

/// Static wave plan for a set of checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WavePlan {
    /// Launch groups in order.
    pub waves: Vec<Vec<String>>,
    /// Checks that would never become ready.
    pub blocked: Vec<String>,
}

/// `check → {required predecessor, ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    requires: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Union of the flow's dependency map and every descriptor's `depends_on`.
    pub fn build(config: &FlowConfig) -> Self {
        let mut graph = Self::default();
        for (id, deps) in &config.dependencies {
            graph.add(id, deps.iter().map(String::as_str));
        }
        for (id, descriptor) in &config.validators {
            graph.add(id, descriptor.depends_on.iter().map(String::as_str));
        }
        graph
    }

    /// Build from explicit `(check, dependencies)` pairs.
    pub fn from_edges<'a, I, D>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let mut graph = Self::default();
        for (id, deps) in edges {
            graph.add(id, deps);
        }
        graph
    }

    fn add<'a>(&mut self, id: &str, deps: impl IntoIterator<Item = &'a str>) {
        let entry = self.requires.entry(id.to_string()).or_default();
        // A self-edge would block the check forever; drop it.
        entry.extend(deps.into_iter().filter(|d| *d != id).map(str::to_string));
    }

    /// Checks that `id` requires.
    pub fn dependencies(&self, id: &str) -> impl Iterator<Item = &str> {
        self.requires
            .get(id)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// All checks with at least one dependency declared.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.requires
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(id, _)| id.as_str())
    }

    /// True iff every dependency of `id` is in `completed`.
    pub fn ready(&self, id: &str, completed: &HashSet<String>) -> bool {
        self.dependencies(id).all(|dep| completed.contains(dep))
    }

    /// Dependencies of `id` not yet in `completed`, sorted.
    pub fn missing(&self, id: &str, completed: &HashSet<String>) -> Vec<String> {
        self.dependencies(id)
            .filter(|dep| !completed.contains(*dep))
            .map(str::to_string)
            .collect()
    }

    /// Members of `pending` that are ready, in `pending` order.
    pub fn ready_subset(&self, pending: &[String], completed: &HashSet<String>) -> Vec<String> {
        pending
            .iter()
            .filter(|id| self.ready(id, completed))
            .cloned()
            .collect()
    }

    /// Simulate the wave protocol assuming every launched check completes.
    pub fn plan_waves(&self, members: &[String], completed: &HashSet<String>) -> WavePlan {
        let mut done = completed.clone();
        let mut pending: Vec<String> = members.to_vec();
        let mut plan = WavePlan::default();

        while !pending.is_empty() {
            let ready = self.ready_subset(&pending, &done);
            if ready.is_empty() {
                plan.blocked = pending;
                break;
            }
            pending.retain(|id| !ready.contains(id));
            done.extend(ready.iter().cloned());
            plan.waves.push(ready);
        }
        plan
    }

    /// One dependency cycle, if any, as the list of checks on it.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a DependencyGraph,
            id: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    return Some(path[start..].iter().map(|s| s.to_string()).collect());
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            path.push(id);
            for dep in graph.dependencies(id) {
                if let Some(cycle) = visit(graph, dep, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        for id in self.requires.keys() {
            let mut path = Vec::new();
            if let Some(cycle) = visit(self, id, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
        None
    }
}
