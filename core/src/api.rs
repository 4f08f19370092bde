//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `rollout_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from_path, AppConfig, ApprovalConfig, ApprovalMode, ExecutionConfig,
    LoggingConfig, PluginsConfig,
};
pub use crate::context::ExecutionContext;
pub use crate::error::{
    CliError, ErrorCode, ExecutionFailure, ExecutorError, PlanError, PluginError, ResolveError,
    RunError,
};
pub use crate::executor::{
    Executor, ExecutorOptions, JobGraph, OutputRendererPlugin, RenderEvent, DRY_RUN_MESSAGE,
};
pub use crate::model::{
    ApprovalRequest, ApprovalResponse, ApprovalStatus, ExecutionResult, Job, JobConfig,
    JobResult, Metadata, Plan, Rollback, Stage, StageResult, StageStatus,
};
pub use crate::orchestrator::{ApprovalGate, ExecuteOptions, Orchestrator};
pub use crate::plan::{PlanLoader, PlanValidator, VariableResolver};
pub use crate::plugin::{
    Artifact, ConfigSchema, Plugin, PluginManager, PluginResult, PluginSource, DEFAULT_PLUGIN_DIR,
};
