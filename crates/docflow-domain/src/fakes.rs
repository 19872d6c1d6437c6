//! In-memory fakes for the capability traits (testing only)
//!
//! Provides stub checks with fixed behaviour (clean, failing, slow,
//! panicking, recording) and `StaticConfigProvider`, which satisfies the
//! `ConfigProvider` contract without touching the filesystem.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::FlowConfig;
use crate::context::ValidationContext;
use crate::error::{ConfigError, Result};
use crate::issue::ValidationIssue;
use crate::outcome::CheckReport;
use crate::traits::{Check, ConfigProvider};

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Returns the same report on every call.
#[derive(Debug, Clone)]
pub struct StaticCheck {
    report: CheckReport,
    calls: Arc<AtomicUsize>,
}

impl StaticCheck {
    pub fn new(report: CheckReport) -> Self {
        Self {
            report,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Confidence 1.0, no issues.
    pub fn clean() -> Self {
        Self::new(CheckReport::new(1.0))
    }

    pub fn with_issues(confidence: f64, issues: Vec<ValidationIssue>) -> Self {
        Self::new(CheckReport {
            confidence,
            issues,
            metrics: BTreeMap::new(),
        })
    }

    /// One critical issue in `category`.
    pub fn critical(category: &str) -> Self {
        Self::with_issues(
            0.0,
            vec![ValidationIssue::critical(category, format!("{category} is broken"))],
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Check for StaticCheck {
    async fn validate(
        &self,
        _content: &str,
        _context: &ValidationContext,
    ) -> anyhow::Result<CheckReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }
}

/// Sleeps before returning a clean report.
#[derive(Debug, Clone)]
pub struct DelayedCheck {
    delay: Duration,
    report: CheckReport,
}

impl DelayedCheck {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            report: CheckReport::new(1.0),
        }
    }

    pub fn with_report(mut self, report: CheckReport) -> Self {
        self.report = report;
        self
    }
}

#[async_trait]
impl Check for DelayedCheck {
    async fn validate(
        &self,
        _content: &str,
        _context: &ValidationContext,
    ) -> anyhow::Result<CheckReport> {
        tokio::time::sleep(self.delay).await;
        Ok(self.report.clone())
    }
}

/// Always returns `Err(message)`.
#[derive(Debug, Clone)]
pub struct FailingCheck {
    message: String,
}

impl FailingCheck {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Check for FailingCheck {
    async fn validate(
        &self,
        _content: &str,
        _context: &ValidationContext,
    ) -> anyhow::Result<CheckReport> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Panics when called.
#[derive(Debug, Clone, Default)]
pub struct PanickingCheck;

#[async_trait]
impl Check for PanickingCheck {
    async fn validate(
        &self,
        _content: &str,
        _context: &ValidationContext,
    ) -> anyhow::Result<CheckReport> {
        panic!("check panicked on purpose");
    }
}

/// Appends its name to a shared journal on start and on finish, then
/// returns a clean report. Used to observe scheduling order.
#[derive(Debug, Clone)]
pub struct RecordingCheck {
    name: String,
    journal: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl RecordingCheck {
    pub fn new(name: impl Into<String>, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            journal,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn note(&self, event: &str) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(format!("{}:{event}", self.name));
        }
    }
}

#[async_trait]
impl Check for RecordingCheck {
    async fn validate(
        &self,
        _content: &str,
        _context: &ValidationContext,
    ) -> anyhow::Result<CheckReport> {
        self.note("start");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.note("end");
        Ok(CheckReport::new(1.0))
    }
}

// ---------------------------------------------------------------------------
// StaticConfigProvider
// ---------------------------------------------------------------------------

/// In-memory configuration provider.
///
/// `replace` stages a new set of flows; it becomes visible after `reload`,
/// mirroring a file edited on disk.
#[derive(Debug, Default)]
pub struct StaticConfigProvider {
    current: RwLock<BTreeMap<String, Arc<FlowConfig>>>,
    staged: Mutex<Option<BTreeMap<String, Arc<FlowConfig>>>>,
    reloads: AtomicUsize,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider serving a single flow.
    pub fn single(name: impl Into<String>, config: FlowConfig) -> Self {
        let provider = Self::new();
        if let Ok(mut current) = provider.current.write() {
            current.insert(name.into(), Arc::new(config));
        }
        provider
    }

    /// Stage `config` under `name` for the next reload.
    pub fn replace(&self, name: impl Into<String>, config: FlowConfig) {
        let snapshot = self
            .current
            .read()
            .map(|c| c.clone())
            .unwrap_or_default();
        if let Ok(mut staged) = self.staged.lock() {
            let next = staged.get_or_insert(snapshot);
            next.insert(name.into(), Arc::new(config));
        }
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn flow(&self, name: &str) -> Result<Arc<FlowConfig>> {
        let current = self.current.read().map_err(|_| ConfigError::Poisoned)?;
        current
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFlow {
                name: name.to_string(),
            })
    }

    fn reload(&self) -> Result<()> {
        let staged = self
            .staged
            .lock()
            .map_err(|_| ConfigError::Poisoned)?
            .take();
        if let Some(next) = staged {
            *self.current.write().map_err(|_| ConfigError::Poisoned)? = next;
        }
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
