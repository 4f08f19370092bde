use thiserror::Error;

use super::code::ErrorCode;

/// Executor-specific errors for stage graph execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("dependency cycle detected in job graph: {0}")]
    CircularDependency(String),

    #[error("job {job} failed: {message}")]
    JobFailed { job: String, message: String },

    #[error("jobs can never become ready (unsatisfied dependencies): {}", .remaining.join(", "))]
    Unschedulable { remaining: Vec<String> },

    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Map executor error to protocol error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CircularDependency(_) => ErrorCode::CircularDependency,
            Self::JobFailed { .. } => ErrorCode::JobFailed,
            Self::Unschedulable { .. } => ErrorCode::DependencyError,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Name of the failing job, if a job caused the error.
    pub fn failed_job(&self) -> Option<&str> {
        match self {
            Self::JobFailed { job, .. } => Some(job),
            _ => None,
        }
    }
}
