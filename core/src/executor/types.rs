use std::time::Duration;

use crate::config::ExecutionConfig;

pub const DEFAULT_DRY_RUN_DELAY: Duration = Duration::from_millis(100);

/// Tuning knobs for a single [`Executor`](super::Executor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// How long a dry-run job pretends to work
    pub dry_run_delay: Duration,

    /// Upper bound on jobs running at once within a wave; 0 means unbounded
    pub max_parallel_jobs: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            dry_run_delay: DEFAULT_DRY_RUN_DELAY,
            max_parallel_jobs: 0,
        }
    }
}

impl From<&ExecutionConfig> for ExecutorOptions {
    fn from(cfg: &ExecutionConfig) -> Self {
        Self {
            dry_run_delay: Duration::from_millis(cfg.dry_run_delay_ms),
            max_parallel_jobs: cfg.max_parallel_jobs,
        }
    }
}
