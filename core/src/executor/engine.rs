use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Map;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::model::{Job, JobResult, StageResult};
use crate::plan::VariableResolver;
use crate::plugin::PluginManager;

use super::graph::JobGraph;
use super::scheduler::execute_wave;
use super::traits::{OutputRendererPlugin, RenderEvent};
use super::types::ExecutorOptions;

pub const DRY_RUN_MESSAGE: &str = "Dry run simulation";

/// Runs one stage's [`JobGraph`] wave by wave.
pub struct Executor {
    plugins: Arc<PluginManager>,
    options: ExecutorOptions,
    resolver: VariableResolver,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
}

impl Executor {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self {
            plugins,
            options: ExecutorOptions::default(),
            resolver: VariableResolver::new(),
            renderer: None,
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_renderer(mut self, renderer: Option<Arc<dyn OutputRendererPlugin>>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Execute every job of `graph`, appending results to `stage_result`.
    ///
    /// Each wave is the current ready set, dispatched concurrently and joined
    /// before the graph is updated. The first failed job in dispatch order
    /// stops the stage; nothing from later waves is dispatched.
    pub async fn execute_graph(
        &self,
        ctx: &ExecutionContext,
        graph: &mut JobGraph,
        stage_result: &mut StageResult,
        dry_run: bool,
    ) -> Result<(), ExecutorError> {
        if let Some(cycle) = graph.find_cycle() {
            tracing::error!(stage = %stage_result.name, cycle = %cycle, "job graph has a cycle");
            return Err(ExecutorError::CircularDependency(cycle));
        }

        let dispatch = {
            let ctx = ctx.clone();
            let plugins = self.plugins.clone();
            let resolver = self.resolver;
            let delay = self.options.dry_run_delay;
            move |job: Job| dispatch_job(ctx.clone(), plugins.clone(), resolver, job, dry_run, delay)
        };

        let mut ready = graph.get_ready_jobs();
        let mut wave = 0;

        while !ready.is_empty() {
            if ctx.is_cancelled() {
                tracing::warn!(stage = %stage_result.name, wave, "execution cancelled, not dispatching next wave");
                return Err(ExecutorError::Cancelled);
            }

            wave += 1;
            let job_names: Vec<String> = ready.iter().map(|j| j.name.clone()).collect();
            tracing::info!(
                stage = %stage_result.name,
                wave,
                jobs = ?job_names,
                dry_run,
                "dispatching wave"
            );
            self.emit(RenderEvent::WaveStart {
                execution_id: ctx.execution_id().to_string(),
                stage: stage_result.name.clone(),
                wave,
                job_names,
            });

            let results = execute_wave(ready, self.options.max_parallel_jobs, &dispatch).await;

            let mut failure = None;
            for result in results {
                self.emit(RenderEvent::JobComplete {
                    execution_id: ctx.execution_id().to_string(),
                    stage: stage_result.name.clone(),
                    result: result.clone(),
                });

                if failure.is_none() {
                    if result.success {
                        graph.mark_completed(&result.name);
                    } else {
                        tracing::error!(
                            stage = %stage_result.name,
                            job = %result.name,
                            message = %result.message,
                            "job failed"
                        );
                        failure = Some((result.name.clone(), result.message.clone()));
                    }
                }
                stage_result.jobs.push(result);
            }

            if let Some((job, message)) = failure {
                return Err(ExecutorError::JobFailed { job, message });
            }

            ready = graph.get_ready_jobs();
        }

        if graph.is_completed() {
            tracing::info!(stage = %stage_result.name, waves = wave, "stage graph completed");
            return Ok(());
        }

        let remaining: Vec<String> = graph.remaining_jobs().into_iter().map(|j| j.name).collect();
        tracing::error!(stage = %stage_result.name, remaining = ?remaining, "jobs can never become ready");
        Err(ExecutorError::Unschedulable { remaining })
    }

    fn emit(&self, event: RenderEvent) {
        if let Some(renderer) = &self.renderer {
            renderer.render(&event);
        }
    }
}

async fn dispatch_job(
    ctx: ExecutionContext,
    plugins: Arc<PluginManager>,
    resolver: VariableResolver,
    job: Job,
    dry_run: bool,
    dry_run_delay: Duration,
) -> JobResult {
    let started = Utc::now();

    if dry_run {
        tokio::time::sleep(dry_run_delay).await;
        return JobResult::new(job.name, job.job_type, started, true, DRY_RUN_MESSAGE, Map::new());
    }

    let config = match resolver.resolve_values(&job.config, &ctx.resolution_scope()) {
        Ok(config) => config,
        Err(e) => {
            return JobResult::new(
                job.name,
                job.job_type,
                started,
                false,
                format!("Failed to resolve configuration: {e}"),
                Map::new(),
            )
        }
    };

    tracing::debug!(job = %job.name, job_type = %job.job_type, "dispatching job");

    match plugins.execute_plugin(&ctx, &job.job_type, &config).await {
        Ok(result) => JobResult::new(
            job.name,
            job.job_type,
            started,
            result.success,
            result.message,
            result.data,
        ),
        Err(e) => JobResult::new(
            job.name,
            job.job_type,
            started,
            false,
            format!("Failed to execute job: {e}"),
            Map::new(),
        ),
    }
}
