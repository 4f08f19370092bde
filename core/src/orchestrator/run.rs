use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::traits::ApprovalGate;
use super::types::ExecuteOptions;
use crate::context::ExecutionContext;
use crate::error::{ExecutionFailure, ExecutorError, RunError};
use crate::executor::{Executor, ExecutorOptions, JobGraph, OutputRendererPlugin, RenderEvent};
use crate::model::{ExecutionResult, Plan, Stage, StageResult, StageStatus};
use crate::plugin::PluginManager;

/// Drives a [`Plan`] from the first stage to a terminal result.
pub struct Orchestrator {
    pub(super) plugins: Arc<PluginManager>,
    approval: Arc<dyn ApprovalGate>,
    pub(super) renderer: Option<Arc<dyn OutputRendererPlugin>>,
    executor_options: ExecutorOptions,
}

impl Orchestrator {
    pub fn new(plugins: Arc<PluginManager>, approval: Arc<dyn ApprovalGate>) -> Self {
        Self {
            plugins,
            approval,
            renderer: None,
            executor_options: ExecutorOptions::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_executor_options(mut self, options: ExecutorOptions) -> Self {
        self.executor_options = options;
        self
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    /// Execute `plan` stage by stage.
    ///
    /// On failure the returned [`ExecutionFailure`] still carries everything
    /// recorded up to that point, including rollback stages.
    pub async fn execute_plan(
        &self,
        cancel: CancellationToken,
        plan: &Plan,
        options: ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        let ctx = ExecutionContext::new(plan.variables.clone(), cancel);
        let mut result = ExecutionResult::new(
            ctx.execution_id().to_string(),
            plan.metadata.name.clone(),
            plan.stages.len(),
            plan.total_jobs(),
        );

        tracing::info!(
            execution_id = ctx.execution_id(),
            plan = %plan.metadata.name,
            stages = plan.stages.len(),
            jobs = plan.total_jobs(),
            dry_run = options.dry_run,
            "starting plan execution"
        );
        self.emit(RenderEvent::RunStart {
            execution_id: ctx.execution_id().to_string(),
            plan_name: plan.metadata.name.clone(),
            total_stages: plan.stages.len(),
            total_jobs: plan.total_jobs(),
            dry_run: options.dry_run,
        });

        for stage in &plan.stages {
            if ctx.is_cancelled() {
                tracing::warn!(stage = %stage.name, "execution cancelled before stage");
                let cause = RunError::Cancelled {
                    stage: stage.name.clone(),
                };
                return Err(self.fail(result, cause));
            }

            let stage_ctx = ctx.with_stage(&stage.name);
            let mut stage_result = StageResult::new(&stage.name);
            self.emit(RenderEvent::StageStart {
                execution_id: ctx.execution_id().to_string(),
                stage: stage.name.clone(),
                job_names: stage.jobs.iter().map(|j| j.name.clone()).collect(),
            });

            if stage.require_approval && !options.skip_approval {
                if let Err(cause) = self.await_approval(&stage_ctx, stage, &mut stage_result).await {
                    self.record_stage(&ctx, &mut result, stage_result);
                    return Err(self.fail(result, cause));
                }
            }

            stage_result.transition(StageStatus::Running);
            tracing::info!(stage = %stage.name, jobs = stage.jobs.len(), "executing stage");

            match self
                .run_stage(&stage_ctx, stage, &mut stage_result, options.dry_run)
                .await
            {
                Ok(()) => {
                    stage_result.transition(StageStatus::Succeeded);
                    tracing::info!(
                        stage = %stage.name,
                        duration_ms = stage_result.duration_ms,
                        "stage succeeded"
                    );
                    self.record_stage(&ctx, &mut result, stage_result);
                }
                Err(source) => {
                    stage_result.transition(StageStatus::Failed);
                    tracing::error!(stage = %stage.name, error = %source, "stage failed");
                    self.record_stage(&ctx, &mut result, stage_result);

                    if options.auto_rollback {
                        self.roll_back(&ctx, plan, &stage.name, &mut result, options.dry_run)
                            .await;
                    }

                    let cause = RunError::StageFailed {
                        stage: stage.name.clone(),
                        source,
                    };
                    return Err(self.fail(result, cause));
                }
            }
        }

        result.finalize(true);
        tracing::info!(
            execution_id = %result.id,
            completed_jobs = result.completed_jobs,
            duration_ms = result.duration_ms,
            "plan execution succeeded"
        );
        self.emit(RenderEvent::RunEnd {
            execution_id: result.id.clone(),
            result: result.clone(),
            error: None,
        });
        Ok(result)
    }

    async fn await_approval(
        &self,
        ctx: &ExecutionContext,
        stage: &Stage,
        stage_result: &mut StageResult,
    ) -> Result<(), RunError> {
        stage_result.transition(StageStatus::AwaitingApproval);
        tracing::info!(stage = %stage.name, approvers = ?stage.approvers, "waiting for approval");
        self.emit(RenderEvent::ApprovalRequested {
            execution_id: ctx.execution_id().to_string(),
            stage: stage.name.clone(),
            approvers: stage.approvers.clone(),
        });

        let decision = self.approval.request_approval(ctx, stage).await;
        let approved = matches!(decision, Ok(true));
        self.emit(RenderEvent::ApprovalResolved {
            execution_id: ctx.execution_id().to_string(),
            stage: stage.name.clone(),
            approved,
        });

        match decision {
            Ok(true) => {
                tracing::info!(stage = %stage.name, "stage approved");
                Ok(())
            }
            Ok(false) => {
                tracing::warn!(stage = %stage.name, "stage was not approved");
                stage_result.transition(StageStatus::Rejected);
                Err(RunError::ApprovalRejected {
                    stage: stage.name.clone(),
                })
            }
            Err(e) => {
                tracing::error!(stage = %stage.name, error = %format!("{e:#}"), "approval failed");
                stage_result.transition(StageStatus::Failed);
                Err(RunError::ApprovalFailed {
                    stage: stage.name.clone(),
                    reason: format!("{e:#}"),
                })
            }
        }
    }

    /// Build a fresh graph and executor for `stage` and run it.
    pub(super) async fn run_stage(
        &self,
        ctx: &ExecutionContext,
        stage: &Stage,
        stage_result: &mut StageResult,
        dry_run: bool,
    ) -> Result<(), ExecutorError> {
        let mut graph = JobGraph::from_jobs(&stage.jobs);
        let executor = Executor::new(self.plugins.clone())
            .with_options(self.executor_options.clone())
            .with_renderer(self.renderer.clone());
        executor
            .execute_graph(ctx, &mut graph, stage_result, dry_run)
            .await
    }

    fn record_stage(
        &self,
        ctx: &ExecutionContext,
        result: &mut ExecutionResult,
        stage_result: StageResult,
    ) {
        self.emit(RenderEvent::StageEnd {
            execution_id: ctx.execution_id().to_string(),
            result: stage_result.clone(),
        });
        result.stages.push(stage_result);
    }

    fn fail(&self, mut result: ExecutionResult, cause: RunError) -> ExecutionFailure {
        result.finalize(false);
        tracing::error!(
            execution_id = %result.id,
            stage = cause.stage(),
            completed_jobs = result.completed_jobs,
            failed_jobs = result.failed_jobs,
            error = %cause,
            "plan execution failed"
        );
        self.emit(RenderEvent::RunEnd {
            execution_id: result.id.clone(),
            result: result.clone(),
            error: Some(cause.to_string()),
        });
        ExecutionFailure::new(result, cause)
    }

    pub(super) fn emit(&self, event: RenderEvent) {
        if let Some(renderer) = &self.renderer {
            renderer.render(&event);
        }
    }
}
