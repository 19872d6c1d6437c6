//! File-backed configuration provider.
//!
//! Parses a [`ConfigDocument`] from `.json` or `.toml` and serves immutable
//! [`FlowConfig`] snapshots. [`FileConfigProvider::reload`] swaps the
//! document atomically; executions that already took a snapshot keep it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::config::{ConfigDocument, FlowConfig};
use crate::error::{ConfigError, Result};
use crate::traits::ConfigProvider;

/// Supported configuration encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parse a configuration document from text.
pub fn parse_document(text: &str, format: ConfigFormat) -> Result<ConfigDocument> {
    let document = match format {
        ConfigFormat::Json => serde_json::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    Ok(document)
}

/// Read and parse a configuration file.
pub fn load_document(path: &Path) -> Result<ConfigDocument> {
    let format = ConfigFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = parse_document(&text, format)?;
    debug!(
        path = %path.display(),
        flows = document.flows.len(),
        agents = document.agents.len(),
        "Parsed config document"
    );
    Ok(document)
}

/// [`ConfigProvider`] over a configuration file on disk.
#[derive(Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
    document: RwLock<Arc<ConfigDocument>>,
}

impl FileConfigProvider {
    /// Load `path` once; fails if the file is unreadable or malformed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = load_document(&path)?;
        Ok(Self {
            path,
            document: RwLock::new(Arc::new(document)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document snapshot.
    pub fn document(&self) -> Result<Arc<ConfigDocument>> {
        self.document
            .read()
            .map(|doc| Arc::clone(&doc))
            .map_err(|_| ConfigError::Poisoned)
    }

    /// Names of all configured flows, sorted.
    pub fn flow_names(&self) -> Result<Vec<String>> {
        Ok(self.document()?.flows.keys().cloned().collect())
    }
}

impl ConfigProvider for FileConfigProvider {
    fn flow(&self, name: &str) -> Result<Arc<FlowConfig>> {
        self.document()?
            .flows
            .get(name)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| ConfigError::UnknownFlow {
                name: name.to_string(),
            })
    }

    fn reload(&self) -> Result<()> {
        // Parse before taking the write lock so a bad file leaves the
        // current snapshot in place.
        let document = load_document(&self.path)?;
        let mut guard = self.document.write().map_err(|_| ConfigError::Poisoned)?;
        *guard = Arc::new(document);
        info!(path = %self.path.display(), "Reloaded flow configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("flows.json")).unwrap(),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("flows.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("flows.yaml")).is_err());
        assert!(ConfigFormat::from_path(Path::new("flows")).is_err());
    }

    #[test]
    fn test_parse_json_document() {
        let text = r#"{
            "flows": {
                "docs": {
                    "settings": { "max_critical_errors": 3 },
                    "tiers": { "tier1": { "name": "fast", "members": ["yaml", "markdown"] } },
                    "validators": { "yaml": { "tier": "tier1", "category": "frontmatter" } }
                }
            },
            "agents": { "yaml": { "command": ["yaml-check", "--json"] } }
        }"#;
        let doc = parse_document(text, ConfigFormat::Json).unwrap();
        let flow = &doc.flows["docs"];

        assert_eq!(flow.settings.max_critical_errors, 3);
        assert_eq!(flow.settings.check_timeout_ms, 30_000);
        assert_eq!(flow.tiers.tier1.members, vec!["yaml", "markdown"]);
        assert!(flow.tiers.tier2.members.is_empty());
        assert!(flow.validators["yaml"].enabled);
        assert_eq!(doc.agents["yaml"].command[0], "yaml-check");
    }

    #[test]
    fn test_parse_toml_document() {
        let text = r#"
            [flows.docs.settings]
            check_timeout_ms = 250

            [flows.docs.tiers.tier2]
            name = "content"
            members = ["code", "links"]
            parallel = false

            [flows.docs.dependencies]
            links = ["code"]

            [flows.docs.families.cells]
            profile = "strict"
        "#;
        let doc = parse_document(text, ConfigFormat::Toml).unwrap();
        let flow = &doc.flows["docs"];

        assert_eq!(flow.settings.check_timeout_ms, 250);
        assert!(!flow.tiers.tier2.parallel);
        assert_eq!(flow.dependencies["links"], vec!["code"]);
        assert_eq!(flow.families["cells"].profile.as_deref(), Some("strict"));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = parse_document("{ not json", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
