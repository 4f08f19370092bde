use crate::model::{ExecutionResult, JobResult, StageResult};

/// Output renderer plugin (controls how progress is presented)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn render(&self, event: &RenderEvent);
}

/// Progress events emitted by the orchestrator and executor.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        execution_id: String,
        plan_name: String,
        total_stages: usize,
        total_jobs: usize,
        dry_run: bool,
    },
    StageStart {
        execution_id: String,
        stage: String,
        job_names: Vec<String>,
    },
    ApprovalRequested {
        execution_id: String,
        stage: String,
        approvers: Vec<String>,
    },
    ApprovalResolved {
        execution_id: String,
        stage: String,
        approved: bool,
    },
    WaveStart {
        execution_id: String,
        stage: String,
        wave: usize,
        job_names: Vec<String>,
    },
    JobComplete {
        execution_id: String,
        stage: String,
        result: JobResult,
    },
    StageEnd {
        execution_id: String,
        result: StageResult,
    },
    RollbackStart {
        execution_id: String,
        failed_stage: String,
        /// Rollback stage names, or handler names when no rollback plan exists
        steps: Vec<String>,
    },
    RollbackEnd {
        execution_id: String,
        succeeded: usize,
        failed: usize,
    },
    RunEnd {
        execution_id: String,
        result: ExecutionResult,
        error: Option<String>,
    },
}

impl RenderEvent {
    pub fn execution_id(&self) -> &str {
        match self {
            Self::RunStart { execution_id, .. }
            | Self::StageStart { execution_id, .. }
            | Self::ApprovalRequested { execution_id, .. }
            | Self::ApprovalResolved { execution_id, .. }
            | Self::WaveStart { execution_id, .. }
            | Self::JobComplete { execution_id, .. }
            | Self::StageEnd { execution_id, .. }
            | Self::RollbackStart { execution_id, .. }
            | Self::RollbackEnd { execution_id, .. }
            | Self::RunEnd { execution_id, .. } => execution_id,
        }
    }

    /// Stable snake_case name used in structured output.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run.start",
            Self::StageStart { .. } => "stage.start",
            Self::ApprovalRequested { .. } => "approval.requested",
            Self::ApprovalResolved { .. } => "approval.resolved",
            Self::WaveStart { .. } => "wave.start",
            Self::JobComplete { .. } => "job.complete",
            Self::StageEnd { .. } => "stage.end",
            Self::RollbackStart { .. } => "rollback.start",
            Self::RollbackEnd { .. } => "rollback.end",
            Self::RunEnd { .. } => "run.end",
        }
    }
}
