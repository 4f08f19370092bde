use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rollout_core::api::{ConfigSchema, ExecutionContext, JobConfig, Plugin, PluginResult};
use serde_json::{json, Map, Value};
use tokio::process::Command;

use crate::command::{parse_duration, run_command, scalar_to_string, tail, TAIL_CHARS};

pub const KUBERNETES_PLUGIN_NAME: &str = "kubernetes";

const REQUIRED_FIELDS: [&str; 3] = ["namespace", "resource", "action"];

/// Runs whose touched resources are remembered until rolled back. Older
/// runs are forgotten first.
const MAX_TRACKED_RUNS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubernetesAction {
    Apply,
    Delete,
    Restart,
    Scale,
}

impl KubernetesAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Delete => "delete",
            Self::Restart => "restart",
            Self::Scale => "scale",
        }
    }

    /// Whether `kubectl rollout undo` can revert this action.
    fn is_undoable(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl FromStr for KubernetesAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(Self::Apply),
            "delete" => Ok(Self::Delete),
            "restart" => Ok(Self::Restart),
            "scale" => Ok(Self::Scale),
            other => anyhow::bail!("invalid action: {other}"),
        }
    }
}

/// Validated view over a `kubernetes` job config.
#[derive(Debug, Clone, PartialEq)]
struct KubernetesJob {
    namespace: String,
    resource: String,
    action: KubernetesAction,
    manifest: Option<String>,
    replicas: Option<String>,
    wait: bool,
    timeout: Option<String>,
}

impl KubernetesJob {
    fn parse(config: &JobConfig) -> anyhow::Result<Self> {
        for field in REQUIRED_FIELDS {
            if string_field(config, field).is_none() {
                anyhow::bail!("missing required field: {field}");
            }
        }
        let field = |name: &str| string_field(config, name).unwrap_or_default();

        let action: KubernetesAction = field("action").parse()?;
        let manifest = string_field(config, "manifest");
        if action == KubernetesAction::Apply && manifest.is_none() {
            anyhow::bail!("manifest is required for apply action");
        }
        let replicas = string_field(config, "replicas");
        if action == KubernetesAction::Scale && replicas.is_none() {
            anyhow::bail!("replicas is required for scale action");
        }

        let timeout = string_field(config, "timeout");
        if let Some(raw) = &timeout {
            if parse_duration(raw).is_none() {
                anyhow::bail!("invalid timeout: {raw}");
            }
        }

        Ok(Self {
            namespace: field("namespace"),
            resource: field("resource"),
            action,
            manifest,
            replicas,
            wait: config.get("wait").and_then(Value::as_bool).unwrap_or(false),
            timeout,
        })
    }

    /// kubectl invocations for this job, in order.
    fn commands(&self) -> Vec<Vec<String>> {
        let ns = ["-n".to_string(), self.namespace.clone()];
        let mut commands = Vec::new();

        let main: Vec<String> = match self.action {
            KubernetesAction::Apply => vec![
                "apply".into(),
                "-f".into(),
                self.manifest.clone().unwrap_or_default(),
            ],
            KubernetesAction::Delete => match &self.manifest {
                Some(manifest) => vec!["delete".into(), "-f".into(), manifest.clone()],
                None => vec!["delete".into(), self.resource.clone()],
            },
            KubernetesAction::Restart => {
                vec!["rollout".into(), "restart".into(), self.resource.clone()]
            }
            KubernetesAction::Scale => vec![
                "scale".into(),
                self.resource.clone(),
                format!("--replicas={}", self.replicas.clone().unwrap_or_default()),
            ],
        };
        commands.push(main.into_iter().chain(ns.clone()).collect());

        if self.wait && self.action.is_undoable() {
            let mut status = vec!["rollout".into(), "status".into(), self.resource.clone()];
            status.extend(ns);
            if let Some(timeout) = &self.timeout {
                status.push(format!("--timeout={timeout}"));
            }
            commands.push(status);
        }

        commands
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout.as_deref().and_then(parse_duration)
    }
}

fn string_field(config: &JobConfig, name: &str) -> Option<String> {
    config
        .get(name)
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TouchedResource {
    namespace: String,
    resource: String,
}

/// Manages Kubernetes workloads through `kubectl`.
///
/// Resources changed by a run are remembered so `rollback` can undo them.
/// Only the latest [`MAX_TRACKED_RUNS`] runs are kept; a run that is never
/// rolled back is eventually dropped.
pub struct KubernetesPlugin {
    kubectl: String,
    /// (execution id, resources changed in that run), oldest run first
    touched: Mutex<Vec<(String, Vec<TouchedResource>)>>,
}

impl KubernetesPlugin {
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            touched: Mutex::new(Vec::new()),
        }
    }

    async fn kubectl(
        &self,
        args: &[String],
        timeout: Option<Duration>,
    ) -> anyhow::Result<crate::command::CommandOutput> {
        tracing::debug!(kubectl = %self.kubectl, args = ?args, "running kubectl");
        let mut cmd = Command::new(&self.kubectl);
        cmd.args(args);
        run_command(&mut cmd, None, timeout).await
    }

    fn record(&self, execution_id: &str, job: &KubernetesJob) {
        let entry = TouchedResource {
            namespace: job.namespace.clone(),
            resource: job.resource.clone(),
        };
        let mut touched = self.touched.lock().unwrap_or_else(PoisonError::into_inner);
        let index = match touched.iter().position(|(id, _)| id == execution_id) {
            Some(index) => index,
            None => {
                if touched.len() >= MAX_TRACKED_RUNS {
                    let (evicted, _) = touched.remove(0);
                    tracing::warn!(
                        execution_id = %evicted,
                        "forgetting kubernetes resources of an old run"
                    );
                }
                touched.push((execution_id.to_string(), Vec::new()));
                touched.len() - 1
            }
        };
        let list = &mut touched[index].1;
        if !list.contains(&entry) {
            list.push(entry);
        }
    }

    fn take_touched(&self, execution_id: &str) -> Vec<TouchedResource> {
        let mut touched = self.touched.lock().unwrap_or_else(PoisonError::into_inner);
        match touched.iter().position(|(id, _)| id == execution_id) {
            Some(index) => touched.remove(index).1,
            None => Vec::new(),
        }
    }
}

impl Default for KubernetesPlugin {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl Plugin for KubernetesPlugin {
    fn name(&self) -> &str {
        KUBERNETES_PLUGIN_NAME
    }

    fn description(&self) -> &str {
        "Manages Kubernetes deployments, services, and other resources"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        Some(ConfigSchema::object(
            [
                ("namespace", ConfigSchema::of("string")),
                ("resource", ConfigSchema::of("string")),
                ("manifest", ConfigSchema::of("string")),
                ("action", ConfigSchema::of("string")),
                ("replicas", ConfigSchema::of("integer")),
                ("wait", ConfigSchema::of("boolean")),
                ("timeout", ConfigSchema::of("string")),
            ],
            &REQUIRED_FIELDS,
        ))
    }

    async fn validate(&self, _ctx: &ExecutionContext, config: &JobConfig) -> anyhow::Result<()> {
        KubernetesJob::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &JobConfig,
    ) -> anyhow::Result<PluginResult> {
        let job = KubernetesJob::parse(config)?;
        let mut stdout = String::new();

        for (step, args) in job.commands().into_iter().enumerate() {
            let output = self.kubectl(&args, job.timeout()).await?;
            if !output.success() {
                tracing::warn!(
                    args = ?args,
                    exit_code = output.exit_code,
                    "kubectl command failed"
                );
                let mut data = Map::new();
                data.insert("exit_code".into(), json!(output.exit_code));
                data.insert("stderr".into(), json!(tail(&output.stderr, TAIL_CHARS)));
                return Ok(PluginResult::failure(
                    ctx,
                    format!(
                        "kubectl {} failed with exit code {}",
                        args.first().map(String::as_str).unwrap_or_default(),
                        output.exit_code
                    ),
                )
                .with_data(data));
            }
            // the change is live once the main command succeeds, even if
            // the status wait after it fails
            if step == 0 && job.action.is_undoable() {
                self.record(ctx.execution_id(), &job);
            }
            stdout.push_str(&output.stdout);
        }

        let mut data = Map::new();
        data.insert("namespace".into(), json!(job.namespace));
        data.insert("resource".into(), json!(job.resource));
        data.insert("action".into(), json!(job.action.as_str()));
        data.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        data.insert("stdout".into(), json!(tail(&stdout, TAIL_CHARS)));

        Ok(PluginResult::success(
            ctx,
            format!(
                "Successfully executed {} on {} in namespace {}",
                job.action.as_str(),
                job.resource,
                job.namespace
            ),
        )
        .with_data(data))
    }

    async fn rollback(&self, _ctx: &ExecutionContext, execution_id: &str) -> anyhow::Result<()> {
        let touched = self.take_touched(execution_id);
        if touched.is_empty() {
            tracing::info!(execution_id, "no kubernetes resources to roll back");
            return Ok(());
        }

        let mut failures = Vec::new();
        for target in touched.iter().rev() {
            let args = vec![
                "rollout".to_string(),
                "undo".to_string(),
                target.resource.clone(),
                "-n".to_string(),
                target.namespace.clone(),
            ];
            match self.kubectl(&args, None).await {
                Ok(output) if output.success() => {
                    tracing::info!(resource = %target.resource, namespace = %target.namespace, "rolled back");
                }
                Ok(output) => failures.push(format!(
                    "{}/{}: exit code {}",
                    target.namespace, target.resource, output.exit_code
                )),
                Err(e) => failures.push(format!("{}/{}: {e:#}", target.namespace, target.resource)),
            }
        }

        if !failures.is_empty() {
            anyhow::bail!("rollout undo failed for {}", failures.join(", "));
        }
        Ok(())
    }
}
