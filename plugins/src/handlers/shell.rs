use async_trait::async_trait;
use rollout_core::api::{ConfigSchema, ExecutionContext, JobConfig, Plugin, PluginResult};
use serde_json::{json, Map, Value};
use tokio::process::Command;

use crate::command::{parse_duration, run_command, scalar_to_string, tail, TAIL_CHARS};

pub const SHELL_PLUGIN_NAME: &str = "shell";

/// Runs a local command; succeeds on exit code 0.
#[derive(Debug, Default)]
pub struct ShellPlugin;

impl ShellPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn build_command(config: &JobConfig) -> anyhow::Result<Command> {
    let program = config
        .get("command")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required field: command"))?;

    let mut cmd = Command::new(program);

    match config.get("args") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for item in items {
                let arg = scalar_to_string(item)
                    .ok_or_else(|| anyhow::anyhow!("args must be a list of scalars"))?;
                cmd.arg(arg);
            }
        }
        Some(_) => anyhow::bail!("args must be a list"),
    }

    match config.get("env") {
        None | Some(Value::Null) => {}
        Some(Value::Object(vars)) => {
            for (key, value) in vars {
                let value = scalar_to_string(value)
                    .ok_or_else(|| anyhow::anyhow!("env value for {key} must be a scalar"))?;
                cmd.env(key, value);
            }
        }
        Some(_) => anyhow::bail!("env must be a mapping"),
    }

    if let Some(dir) = config.get("workdir").and_then(Value::as_str) {
        cmd.current_dir(shellexpand::tilde(dir).into_owned());
    }

    Ok(cmd)
}

fn timeout_of(config: &JobConfig) -> anyhow::Result<Option<std::time::Duration>> {
    match config.get("timeout").and_then(scalar_to_string) {
        None => Ok(None),
        Some(raw) => parse_duration(&raw)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("invalid timeout: {raw}")),
    }
}

#[async_trait]
impl Plugin for ShellPlugin {
    fn name(&self) -> &str {
        SHELL_PLUGIN_NAME
    }

    fn description(&self) -> &str {
        "Runs a local command and fails on a non-zero exit code"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        Some(ConfigSchema::object(
            [
                ("command", ConfigSchema::of("string")),
                ("args", ConfigSchema::array_of(ConfigSchema::of("string"))),
                ("env", ConfigSchema::of("object")),
                ("workdir", ConfigSchema::of("string")),
                ("timeout", ConfigSchema::of("string")),
            ],
            &["command"],
        ))
    }

    async fn validate(&self, _ctx: &ExecutionContext, config: &JobConfig) -> anyhow::Result<()> {
        build_command(config)?;
        timeout_of(config)?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &JobConfig,
    ) -> anyhow::Result<PluginResult> {
        let mut cmd = build_command(config)?;
        let output = run_command(&mut cmd, None, timeout_of(config)?).await?;

        let mut data = Map::new();
        data.insert("exit_code".into(), json!(output.exit_code));
        data.insert("stdout".into(), json!(tail(&output.stdout, TAIL_CHARS)));
        data.insert("stderr".into(), json!(tail(&output.stderr, TAIL_CHARS)));

        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let result = if output.success() {
            PluginResult::success(ctx, format!("{program} completed"))
        } else {
            tracing::warn!(command = %program, exit_code = output.exit_code, "command failed");
            PluginResult::failure(
                ctx,
                format!("{program} exited with code {}", output.exit_code),
            )
        };
        Ok(result.with_data(data))
    }

    async fn rollback(&self, _ctx: &ExecutionContext, execution_id: &str) -> anyhow::Result<()> {
        // commands are opaque; undo belongs in the plan's rollback stages
        tracing::debug!(execution_id, "shell handler has nothing to roll back");
        Ok(())
    }
}
