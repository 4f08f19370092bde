use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rollout_core::api::{
    ConfigSchema, ExecutionContext, JobConfig, Plugin, PluginResult, PluginSource,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::command::{parse_duration, run_command, tail, TAIL_CHARS};

/// `<plugin_dir>/*.toml` describing an external handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_manifest_version")]
    pub version: String,

    /// Program to run. A relative path containing a separator is resolved
    /// against the manifest's directory.
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Config keys that must be present for `validate` to pass
    #[serde(default)]
    pub required: Vec<String>,

    /// Arguments for the rollback invocation; no rollback when absent
    #[serde(default)]
    pub rollback_args: Option<Vec<String>>,

    /// e.g. "30s", "5m"
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_manifest_version() -> String {
    "0.0.0".to_string()
}

impl PluginManifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest: Self = toml::from_str(&raw)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        if manifest.name.trim().is_empty() {
            anyhow::bail!("manifest {} has an empty name", path.display());
        }
        if let Some(raw) = &manifest.timeout {
            if parse_duration(raw).is_none() {
                anyhow::bail!("manifest {} has an invalid timeout: {raw}", path.display());
            }
        }
        Ok(manifest)
    }
}

/// Request written to the child's stdin as one JSON document.
#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    action: &'a str,
    execution_id: &'a str,
    stage: Option<&'a str>,
    config: &'a JobConfig,
}

/// Handler backed by an external program speaking JSON over stdio.
#[derive(Debug)]
pub struct ProcessPlugin {
    manifest: PluginManifest,
    program: PathBuf,
}

impl ProcessPlugin {
    pub fn new(manifest: PluginManifest, base_dir: &Path) -> Self {
        let command = Path::new(&manifest.command);
        let program = if command.is_relative() && command.components().count() > 1 {
            base_dir.join(command)
        } else {
            command.to_path_buf()
        };
        Self { manifest, program }
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn invoke(
        &self,
        args: &[String],
        request: &ProcessRequest<'_>,
    ) -> anyhow::Result<crate::command::CommandOutput> {
        let payload = serde_json::to_vec(request)?;
        let mut cmd = Command::new(&self.program);
        cmd.args(args);

        tracing::debug!(
            plugin = %self.manifest.name,
            program = %self.program.display(),
            action = request.action,
            "invoking plugin process"
        );

        let timeout = self.manifest.timeout.as_deref().and_then(parse_duration);
        let output = run_command(&mut cmd, Some(&payload), timeout).await?;
        if !output.success() {
            anyhow::bail!(
                "plugin process {} exited with code {}: {}",
                self.manifest.name,
                output.exit_code,
                tail(output.stderr.trim(), TAIL_CHARS)
            );
        }
        Ok(output)
    }
}

#[async_trait]
impl Plugin for ProcessPlugin {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn version(&self) -> &str {
        &self.manifest.version
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        Some(ConfigSchema {
            kind: "object".to_string(),
            required: self.manifest.required.clone(),
            ..Default::default()
        })
    }

    async fn validate(&self, _ctx: &ExecutionContext, config: &JobConfig) -> anyhow::Result<()> {
        for key in &self.manifest.required {
            match config.get(key) {
                None | Some(Value::Null) => anyhow::bail!("missing required field: {key}"),
                Some(_) => {}
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &JobConfig,
    ) -> anyhow::Result<PluginResult> {
        let request = ProcessRequest {
            action: "execute",
            execution_id: ctx.execution_id(),
            stage: ctx.stage_name(),
            config,
        };
        let output = self.invoke(&self.manifest.args, &request).await?;

        let mut result: PluginResult = serde_json::from_str(output.stdout.trim())
            .with_context(|| {
                format!(
                    "plugin process {} wrote an invalid result: {}",
                    self.manifest.name,
                    tail(output.stdout.trim(), 200)
                )
            })?;
        if result.execution_id.is_empty() {
            result.execution_id = ctx.execution_id().to_string();
        }
        Ok(result)
    }

    async fn rollback(&self, ctx: &ExecutionContext, execution_id: &str) -> anyhow::Result<()> {
        let Some(args) = &self.manifest.rollback_args else {
            tracing::debug!(plugin = %self.manifest.name, execution_id, "no rollback command");
            return Ok(());
        };

        let empty = Map::new();
        let request = ProcessRequest {
            action: "rollback",
            execution_id,
            stage: ctx.stage_name(),
            config: &empty,
        };
        self.invoke(args, &request).await?;
        Ok(())
    }
}

/// Discovers [`ProcessPlugin`]s from `*.toml` manifests in one directory.
#[derive(Debug, Clone)]
pub struct ManifestPluginSource {
    dir: PathBuf,
}

impl ManifestPluginSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PluginSource for ManifestPluginSource {
    fn name(&self) -> &str {
        "manifest"
    }

    fn discover(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            anyhow::bail!("plugin directory does not exist: {}", self.dir.display());
        }

        let pattern = self.dir.join("*.toml");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non UTF-8 plugin directory: {}", self.dir.display()))?;

        let mut found: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable plugin manifest");
                    None
                }
            })
            .collect();
        found.sort();
        Ok(found)
    }

    fn load(&self, candidate: &Path) -> anyhow::Result<Arc<dyn Plugin>> {
        let manifest = PluginManifest::from_file(candidate)?;
        let base_dir = candidate.parent().unwrap_or(&self.dir);
        Ok(Arc::new(ProcessPlugin::new(manifest, base_dir)))
    }
}
