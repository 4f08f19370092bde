use thiserror::Error;

use super::code::ErrorCode;
use super::executor::ExecutorError;
use super::plan::PlanError;
use super::plugin::PluginError;
use crate::model::ExecutionResult;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),
    #[error("execution failed: {0}")]
    Run(#[from] ExecutionFailure),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Terminal cause of a failed run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("stage {stage} was not approved")]
    ApprovalRejected { stage: String },

    #[error("approval for stage {stage} failed: {reason}")]
    ApprovalFailed { stage: String, reason: String },

    #[error("Stage {stage} failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: ExecutorError,
    },

    #[error("execution cancelled before stage {stage}")]
    Cancelled { stage: String },
}

impl RunError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ApprovalRejected { .. } | Self::ApprovalFailed { .. } => {
                ErrorCode::ApprovalRejected
            }
            Self::StageFailed { source, .. } => source.error_code(),
            Self::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    /// Name of the stage the run stopped at.
    pub fn stage(&self) -> &str {
        match self {
            Self::ApprovalRejected { stage }
            | Self::ApprovalFailed { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::Cancelled { stage } => stage,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. }
                | Self::StageFailed {
                    source: ExecutorError::Cancelled,
                    ..
                }
        )
    }
}

/// A failed run: the cause plus everything recorded up to the failure point.
#[derive(Error, Debug)]
#[error("{cause}")]
pub struct ExecutionFailure {
    pub result: Box<ExecutionResult>,
    #[source]
    pub cause: RunError,
}

impl ExecutionFailure {
    pub fn new(result: ExecutionResult, cause: RunError) -> Self {
        Self {
            result: Box::new(result),
            cause,
        }
    }
}
