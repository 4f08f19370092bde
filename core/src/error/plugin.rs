use thiserror::Error;

use super::code::ErrorCode;

/// Registry, dispatch and discovery failures raised by the plugin manager.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin {0} is already registered")]
    AlreadyRegistered(String),

    #[error("plugin {0} not found")]
    NotFound(String),

    #[error("invalid configuration for {plugin}: {source:#}")]
    InvalidConfig {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("plugin {plugin} failed: {source:#}")]
    Execution {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("plugin {plugin} panicked during {phase}")]
    Panicked { plugin: String, phase: &'static str },

    #[error("plugin discovery failed ({source_name}): {reason}")]
    Discovery { source_name: String, reason: String },
}

impl PluginError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AlreadyRegistered(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::PluginNotFound,
            Self::InvalidConfig { .. } => ErrorCode::ValidationError,
            Self::Execution { .. } | Self::Panicked { .. } => ErrorCode::PluginError,
            Self::Discovery { .. } => ErrorCode::GeneralError,
        }
    }
}
