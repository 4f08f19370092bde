use chrono::Local;
use rollout_core::api::{OutputRendererPlugin, RenderEvent};
use serde_json::{json, Value};

/// One JSON object per event on stdout.
pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    pub(crate) fn event_to_json(&self, event: &RenderEvent) -> Value {
        let metadata = match event {
            RenderEvent::RunStart {
                plan_name,
                total_stages,
                total_jobs,
                dry_run,
                ..
            } => json!({
                "plan": plan_name,
                "total_stages": total_stages,
                "total_jobs": total_jobs,
                "dry_run": dry_run,
            }),
            RenderEvent::StageStart {
                stage, job_names, ..
            } => json!({
                "stage": stage,
                "jobs": job_names,
            }),
            RenderEvent::ApprovalRequested {
                stage, approvers, ..
            } => json!({
                "stage": stage,
                "approvers": approvers,
            }),
            RenderEvent::ApprovalResolved {
                stage, approved, ..
            } => json!({
                "stage": stage,
                "approved": approved,
            }),
            RenderEvent::WaveStart {
                stage,
                wave,
                job_names,
                ..
            } => json!({
                "stage": stage,
                "wave": wave,
                "jobs": job_names,
            }),
            RenderEvent::JobComplete { stage, result, .. } => json!({
                "stage": stage,
                "job": result,
            }),
            RenderEvent::StageEnd { result, .. } => json!({
                "stage": result.name,
                "status": result.status,
                "success": result.success,
                "jobs": result.jobs.len(),
                "duration_ms": result.duration_ms,
            }),
            RenderEvent::RollbackStart {
                failed_stage,
                steps,
                ..
            } => json!({
                "failed_stage": failed_stage,
                "steps": steps,
            }),
            RenderEvent::RollbackEnd {
                succeeded, failed, ..
            } => json!({
                "succeeded": succeeded,
                "failed": failed,
            }),
            RenderEvent::RunEnd { result, error, .. } => json!({
                "success": result.success,
                "completed_jobs": result.completed_jobs,
                "failed_jobs": result.failed_jobs,
                "duration_ms": result.duration_ms,
                "error": error,
            }),
        };

        json!({
            "v": 1,
            "event_type": event.event_type(),
            "ts": Local::now().to_rfc3339(),
            "execution_id": event.execution_id(),
            "metadata": metadata,
        })
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        match line {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "failed to serialize render event"),
        }
    }
}
