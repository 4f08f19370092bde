use rollout_core::api::{OutputRendererPlugin, RenderEvent, StageStatus};

pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn marker(&self, ok: bool) -> &'static str {
        match (ok, self.ascii_only) {
            (true, true) => "OK",
            (true, false) => "✓",
            (false, true) => "FAIL",
            (false, false) => "✗",
        }
    }

    pub(crate) fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                execution_id,
                plan_name,
                total_stages,
                total_jobs,
                dry_run,
            } => {
                let mut line = format!(
                    "RUN START {} (plan {}, stages: {}, jobs: {})",
                    execution_id, plan_name, total_stages, total_jobs
                );
                if *dry_run {
                    line.push_str(" [dry run]");
                }
                line
            }
            RenderEvent::StageStart {
                stage, job_names, ..
            } => format!("STAGE START {} (jobs: {})", stage, job_names.join(", ")),
            RenderEvent::ApprovalRequested {
                stage, approvers, ..
            } => {
                if approvers.is_empty() {
                    format!("APPROVAL REQUESTED {}", stage)
                } else {
                    format!("APPROVAL REQUESTED {} (approvers: {})", stage, approvers.join(", "))
                }
            }
            RenderEvent::ApprovalResolved {
                stage, approved, ..
            } => format!(
                "APPROVAL {} {}",
                if *approved { "GRANTED" } else { "DENIED" },
                stage
            ),
            RenderEvent::WaveStart {
                stage,
                wave,
                job_names,
                ..
            } => format!("  wave {} of {}: {}", wave, stage, job_names.join(", ")),
            RenderEvent::JobComplete { result, .. } => {
                let mut line = format!(
                    "  {} {} [{}] {}ms",
                    self.marker(result.success),
                    result.name,
                    result.job_type,
                    result.duration_ms
                );
                if !result.message.is_empty() {
                    line.push_str(&format!(": {}", result.message));
                }
                line
            }
            RenderEvent::StageEnd { result, .. } => format!(
                "STAGE END {} (status {}, jobs: {}, duration {}ms)",
                result.name,
                status_label(result.status),
                result.jobs.len(),
                result.duration_ms
            ),
            RenderEvent::RollbackStart {
                failed_stage,
                steps,
                ..
            } => format!(
                "ROLLBACK START after {} (steps: {})",
                failed_stage,
                steps.join(", ")
            ),
            RenderEvent::RollbackEnd {
                succeeded, failed, ..
            } => format!("ROLLBACK END (succeeded {}, failed {})", succeeded, failed),
            RenderEvent::RunEnd {
                execution_id,
                result,
                error,
            } => {
                let mut line = format!(
                    "RUN END {} {} (completed {}, failed {}, duration {}ms)",
                    execution_id,
                    self.marker(result.success),
                    result.completed_jobs,
                    result.failed_jobs,
                    result.duration_ms
                );
                if let Some(error) = error {
                    line.push_str(&format!(": {}", error));
                }
                line
            }
        }
    }
}

fn status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "pending",
        StageStatus::AwaitingApproval => "awaiting approval",
        StageStatus::Running => "running",
        StageStatus::Succeeded => "succeeded",
        StageStatus::Failed => "failed",
        StageStatus::Rejected => "rejected",
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        println!("{}", self.format_event(event));
    }
}
