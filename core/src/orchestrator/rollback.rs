use super::run::Orchestrator;
use crate::context::ExecutionContext;
use crate::executor::RenderEvent;
use crate::model::{ExecutionResult, Plan, Stage, StageResult, StageStatus};

impl Orchestrator {
    /// Best-effort recovery after `failed_stage` failed. Never returns an
    /// error; every failure is logged and recorded on `result`.
    ///
    /// Runs on a context with its own cancellation token so a cancelled
    /// release still gets rolled back.
    pub(super) async fn roll_back(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        failed_stage: &str,
        result: &mut ExecutionResult,
        dry_run: bool,
    ) {
        let ctx = ctx.with_fresh_cancellation();
        match plan.rollback.as_ref().filter(|r| !r.stages.is_empty()) {
            Some(rollback) => {
                self.run_rollback_plan(&ctx, &rollback.stages, failed_stage, result, dry_run)
                    .await
            }
            None if dry_run => {
                tracing::info!(failed_stage, "dry run: skipping handler rollback");
            }
            None => self.rollback_handlers(&ctx, failed_stage, result).await,
        }
    }

    async fn run_rollback_plan(
        &self,
        ctx: &ExecutionContext,
        stages: &[Stage],
        failed_stage: &str,
        result: &mut ExecutionResult,
        dry_run: bool,
    ) {
        tracing::info!(failed_stage, stages = stages.len(), "executing rollback plan");
        self.emit(RenderEvent::RollbackStart {
            execution_id: ctx.execution_id().to_string(),
            failed_stage: failed_stage.to_string(),
            steps: stages.iter().map(|s| s.name.clone()).collect(),
        });

        let (mut succeeded, mut failed) = (0, 0);
        for stage in stages {
            let stage_ctx = ctx.with_stage(&stage.name);
            let mut stage_result = StageResult::new(&stage.name);
            stage_result.transition(StageStatus::Running);

            match self
                .run_stage(&stage_ctx, stage, &mut stage_result, dry_run)
                .await
            {
                Ok(()) => {
                    stage_result.transition(StageStatus::Succeeded);
                    succeeded += 1;
                    tracing::info!(stage = %stage.name, "rollback stage succeeded");
                }
                Err(e) => {
                    stage_result.transition(StageStatus::Failed);
                    failed += 1;
                    tracing::error!(stage = %stage.name, error = %e, "rollback stage failed");
                }
            }

            self.emit(RenderEvent::StageEnd {
                execution_id: ctx.execution_id().to_string(),
                result: stage_result.clone(),
            });
            result.rollback_stages.push(stage_result);
        }

        self.emit(RenderEvent::RollbackEnd {
            execution_id: ctx.execution_id().to_string(),
            succeeded,
            failed,
        });
    }

    /// Ask each handler that ran a job in this run to undo its work, most
    /// recent stage first. Handlers of failed jobs are included since a job
    /// can fail after it already changed something.
    async fn rollback_handlers(
        &self,
        ctx: &ExecutionContext,
        failed_stage: &str,
        result: &ExecutionResult,
    ) {
        let handlers = handlers_to_roll_back(result);
        if handlers.is_empty() {
            tracing::info!(failed_stage, "no jobs ran, nothing to roll back");
            return;
        }

        tracing::info!(failed_stage, handlers = ?handlers, "rolling back handlers");
        self.emit(RenderEvent::RollbackStart {
            execution_id: ctx.execution_id().to_string(),
            failed_stage: failed_stage.to_string(),
            steps: handlers.clone(),
        });

        let (mut succeeded, mut failed) = (0, 0);
        for handler in &handlers {
            match self
                .plugins
                .rollback_plugin(ctx, handler, ctx.execution_id())
                .await
            {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(handler = %handler, error = %e, "handler rollback failed");
                }
            }
        }

        self.emit(RenderEvent::RollbackEnd {
            execution_id: ctx.execution_id().to_string(),
            succeeded,
            failed,
        });
    }
}

/// Distinct job types that ran in this run, most recent first.
fn handlers_to_roll_back(result: &ExecutionResult) -> Vec<String> {
    let mut handlers: Vec<String> = Vec::new();
    for job in result
        .stages
        .iter()
        .rev()
        .flat_map(|stage| stage.jobs.iter().rev())
    {
        if !handlers.contains(&job.job_type) {
            handlers.push(job.job_type.clone());
        }
    }
    handlers
}
