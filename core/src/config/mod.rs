mod load;
mod types;

pub use load::{
    get_rollout_data_dir, load_default, load_from_path, ENV_APPROVAL_MODE, ENV_LOG_LEVEL,
    ENV_PLUGIN_DIR,
};
pub use types::{
    AppConfig, ApprovalConfig, ApprovalMode, ExecutionConfig, LoggingConfig, PluginsConfig,
};
