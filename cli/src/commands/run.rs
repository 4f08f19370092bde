use std::sync::Arc;

use rollout_core::api::{
    AppConfig, CliError, ExecuteOptions, ExecutionResult, ExecutorOptions, Orchestrator,
    PlanLoader, PlanValidator,
};
use rollout_plugins::factory::{build_approval_gate, build_plugin_manager, build_renderer};
use tokio_util::sync::CancellationToken;

use super::cli::RunArgs;

/// Load, validate and execute a plan. Returns the process exit code.
pub async fn run_plan(
    args: &RunArgs,
    cfg: &AppConfig,
    cancel: CancellationToken,
) -> Result<i32, CliError> {
    let plan = PlanLoader::new().load_plan(&args.plan)?;
    PlanValidator::new().validate_plan(&plan)?;

    let mut cfg = cfg.clone();
    if let Some(dir) = &args.plugin_dir {
        cfg.plugins.directory = dir.clone();
    }

    let plugins = Arc::new(build_plugin_manager(&cfg)?);
    tracing::info!(plugins = plugins.len(), dir = %plugins.plugin_dir().display(), "plugins ready");

    let format = args
        .format
        .map(|f| f.as_str().to_string())
        .unwrap_or_else(|| cfg.execution.output_format.clone());
    let human = format != "jsonl";

    let orchestrator = Orchestrator::new(plugins, build_approval_gate(&cfg))
        .with_renderer(build_renderer(&format, &cfg))
        .with_executor_options(ExecutorOptions::from(&cfg.execution));

    let options = ExecuteOptions {
        auto_rollback: args.auto_rollback,
        skip_approval: args.skip_approval,
        dry_run: args.dry_run,
    };

    if human {
        println!("Starting execution of plan: {}", plan.metadata.name);
    }

    match orchestrator.execute_plan(cancel, &plan, options).await {
        Ok(result) => {
            if human {
                println!("{}", format_summary(&result));
            }
            Ok(0)
        }
        Err(failure) => {
            if human {
                println!("{}", format_summary(&failure.result));
            }
            Err(CliError::Run(failure))
        }
    }
}

pub fn format_summary(result: &ExecutionResult) -> String {
    let mut out = format!(
        "\nExecution {}\n  ID: {}\n  Stages: {}/{}\n  Jobs: {} completed, {} failed (of {})\n  Duration: {}ms",
        if result.success { "completed" } else { "failed" },
        result.id,
        result.stages.iter().filter(|s| s.success).count(),
        result.total_stages,
        result.completed_jobs,
        result.failed_jobs,
        result.total_jobs,
        result.duration_ms,
    );
    if !result.rollback_stages.is_empty() {
        let ok = result.rollback_stages.iter().filter(|s| s.success).count();
        out.push_str(&format!(
            "\n  Rollback: {}/{} stages succeeded",
            ok,
            result.rollback_stages.len()
        ));
    }
    out
}
