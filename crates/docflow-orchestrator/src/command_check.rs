//! Checks backed by external executables.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use docflow_domain::{Check, CheckReport, CommandAgentSpec, MemoryAgentRegistry, ValidationContext};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the validation context as JSON.
pub const CONTEXT_ENV: &str = "DOCFLOW_CONTEXT";

/// Runs an executable per validation.
///
/// The document is written to stdin and stdout must be a JSON
/// [`CheckReport`]. The child is killed if the invocation is dropped, so an
/// orchestrator deadline does not leave it running.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    agent_id: String,
    spec: CommandAgentSpec,
}

impl CommandCheck {
    pub fn new(agent_id: impl Into<String>, spec: CommandAgentSpec) -> Self {
        Self {
            agent_id: agent_id.into(),
            spec,
        }
    }
}

#[async_trait]
impl Check for CommandCheck {
    async fn validate(
        &self,
        content: &str,
        context: &ValidationContext,
    ) -> anyhow::Result<CheckReport> {
        let Some((exe, args)) = self.spec.command.split_first() else {
            bail!("agent {} has empty command", self.agent_id);
        };

        let context_json = serde_json::to_string(context)?;
        let mut child = Command::new(exe)
            .args(args)
            .envs(&self.spec.env)
            .env(CONTEXT_ENV, context_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {exe} for agent {}", self.agent_id))?;

        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(content.as_bytes()).await {
                    // The command may exit without reading its input.
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        written.context("failed to write document to stdin")?;
        let output = output.context("failed to wait for command")?;

        debug!(
            agent = %self.agent_id,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            "Command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "agent {} exited with {}: {}",
                self.agent_id,
                output.status,
                stderr.trim()
            );
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("agent {} produced an invalid report", self.agent_id))
    }
}

/// Registry with one [`CommandCheck`] per configured agent.
pub fn registry_from_agents(agents: &BTreeMap<String, CommandAgentSpec>) -> MemoryAgentRegistry {
    let registry = MemoryAgentRegistry::new();
    for (id, spec) in agents {
        registry.register(id.clone(), Arc::new(CommandCheck::new(id.clone(), spec.clone())));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use docflow_domain::{AgentRegistry, OutcomeStatus, Severity};

    use crate::invoker::{Document, ValidatorInvoker};

    fn sh(script: &str) -> CommandAgentSpec {
        CommandAgentSpec {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            env: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_parses_report_from_stdout() {
        let check = CommandCheck::new(
            "seo",
            sh(r#"cat >/dev/null; echo '{"confidence":0.5,"issues":[{"severity":"critical","category":"seo","message":"no h1"}]}'"#),
        );
        let report = check
            .validate("# doc", &ValidationContext::new())
            .await
            .unwrap();

        assert_eq!(report.confidence, 0.5);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_extra_issue_fields_survive_invocation() {
        let agents: BTreeMap<String, CommandAgentSpec> = [(
            "links".to_string(),
            sh(r#"cat >/dev/null; echo '{"confidence":0.8,"issues":[{"severity":"warning","category":"links","message":"dead link","rule_id":"LNK001","url":"http://x"}]}'"#),
        )]
        .into_iter()
        .collect();
        let invoker = ValidatorInvoker::new(Arc::new(registry_from_agents(&agents)));
        let document = Document::new("[x](http://x)", &ValidationContext::new());

        let outcome = invoker
            .invoke("links", None, &document, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Ok);
        let json = serde_json::to_value(&outcome.issues[0]).unwrap();
        assert_eq!(json["rule_id"], "LNK001");
        assert_eq!(json["url"], "http://x");
        assert_eq!(json["message"], "dead link");
    }

    #[tokio::test]
    async fn test_receives_content_and_context() {
        let mut spec = sh(
            r#"body=$(cat); printf '{"confidence":1.0,"metrics":{"body":"%s","ctx":%s,"mode":"%s"}}' "$body" "$DOCFLOW_CONTEXT" "$MODE""#,
        );
        spec.env.insert("MODE".to_string(), "strict".to_string());
        let check = CommandCheck::new("echo", spec);
        let context = ValidationContext::new().with_family("words");

        let report = check.validate("hello", &context).await.unwrap();

        assert_eq!(report.metrics["body"], "hello");
        assert_eq!(report.metrics["ctx"]["family"], "words");
        assert_eq!(report.metrics["mode"], "strict");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let check = CommandCheck::new("broken", sh("echo boom >&2; exit 3"));
        let err = check
            .validate("", &ValidationContext::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }

    #[tokio::test]
    async fn test_garbage_output_is_an_error() {
        let check = CommandCheck::new("garbage", sh("echo not-json"));
        assert!(check.validate("", &ValidationContext::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_command_is_an_error() {
        let check = CommandCheck::new("empty", CommandAgentSpec::default());
        assert!(check.validate("", &ValidationContext::new()).await.is_err());
    }

    #[test]
    fn test_registry_from_agents() {
        let agents: BTreeMap<String, CommandAgentSpec> = [
            ("yaml".to_string(), sh("true")),
            ("links".to_string(), sh("true")),
        ]
        .into_iter()
        .collect();
        let registry = registry_from_agents(&agents);

        assert!(registry.lookup("yaml").is_some());
        assert!(registry.lookup("links").is_some());
        assert!(registry.lookup("seo").is_none());
    }
}
