use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of executing a whole plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution identifier, constant for the whole run
    pub id: String,

    /// `metadata.name` of the executed plan
    pub plan_name: String,

    pub success: bool,

    /// Number of forward stages in the plan
    pub total_stages: usize,

    /// Number of jobs across forward stages
    pub total_jobs: usize,

    /// Jobs recorded as successful (forward stages only)
    pub completed_jobs: usize,

    /// Jobs recorded as failed (forward stages only)
    pub failed_jobs: usize,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    /// Total wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Forward stage results, in execution order
    pub stages: Vec<StageResult>,

    /// Rollback stage results, in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_stages: Vec<StageResult>,
}

impl ExecutionResult {
    pub fn new(id: String, plan_name: String, total_stages: usize, total_jobs: usize) -> Self {
        Self {
            id,
            plan_name,
            success: false,
            total_stages,
            total_jobs,
            completed_jobs: 0,
            failed_jobs: 0,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            stages: Vec::new(),
            rollback_stages: Vec::new(),
        }
    }

    /// Close the result: stamp the end time and count job outcomes.
    pub fn finalize(&mut self, success: bool) {
        let ended = Utc::now();
        self.ended_at = Some(ended);
        self.duration_ms = millis_between(self.started_at, ended);
        self.success = success;

        let (completed, failed) = self
            .stages
            .iter()
            .flat_map(|s| s.jobs.iter())
            .fold((0, 0), |(ok, bad), job| {
                if job.success {
                    (ok + 1, bad)
                } else {
                    (ok, bad + 1)
                }
            });
        self.completed_jobs = completed;
        self.failed_jobs = failed;
    }

    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Lifecycle of a stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    AwaitingApproval,
    Running,
    Succeeded,
    Failed,
    Rejected,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Rejected)
    }
}

/// Result of executing one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub status: StageStatus,
    pub success: bool,

    /// Job results in wave-completion order (dispatch order within a wave)
    pub jobs: Vec<JobResult>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Pending,
            success: false,
            jobs: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
        }
    }

    pub fn transition(&mut self, status: StageStatus) {
        self.status = status;
        if status.is_terminal() {
            let ended = Utc::now();
            self.ended_at = Some(ended);
            self.duration_ms = millis_between(self.started_at, ended);
            self.success = status == StageStatus::Succeeded;
        }
    }

    pub fn job(&self, name: &str) -> Option<&JobResult> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }
}

/// Result of executing a single job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub name: String,
    pub job_type: String,
    pub success: bool,

    /// Handler message, or the reason dispatch failed
    pub message: String,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// Opaque data returned by the handler
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl JobResult {
    pub fn new(
        name: impl Into<String>,
        job_type: impl Into<String>,
        started_at: DateTime<Utc>,
        success: bool,
        message: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        let ended_at = Utc::now();
        Self {
            name: name.into(),
            job_type: job_type.into(),
            success,
            message: message.into(),
            started_at,
            ended_at,
            duration_ms: millis_between(started_at, ended_at),
            data,
        }
    }
}

fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
