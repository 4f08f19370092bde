use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "rollout_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory scanned for plugin manifests; `~` is expanded.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,

    /// Register the compiled-in handlers (`kubernetes`, `shell`).
    #[serde(default = "default_builtins")]
    pub builtins: bool,

    #[serde(default = "default_kubectl_bin")]
    pub kubectl_bin: String,
}

fn default_plugin_directory() -> String {
    crate::plugin::DEFAULT_PLUGIN_DIR.to_string()
}

fn default_builtins() -> bool {
    true
}

fn default_kubectl_bin() -> String {
    "kubectl".to_string()
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            builtins: default_builtins(),
            kubectl_bin: default_kubectl_bin(),
        }
    }
}

impl PluginsConfig {
    pub fn expanded_directory(&self) -> String {
        shellexpand::tilde(&self.directory).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_dry_run_delay_ms")]
    pub dry_run_delay_ms: u64,

    /// 0 = no limit within a wave
    #[serde(default)]
    pub max_parallel_jobs: usize,

    /// "text" or "jsonl"
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// ASCII-only markers (no Unicode)
    #[serde(default)]
    pub ascii: bool,
}

fn default_dry_run_delay_ms() -> u64 {
    100
}

fn default_output_format() -> String {
    "text".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run_delay_ms: default_dry_run_delay_ms(),
            max_parallel_jobs: 0,
            output_format: default_output_format(),
            ascii: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Ask on the terminal
    #[default]
    Prompt,
    AutoApprove,
    AutoReject,
}

impl std::str::FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "prompt" => Ok(Self::Prompt),
            "auto_approve" | "approve" => Ok(Self::AutoApprove),
            "auto_reject" | "reject" => Ok(Self::AutoReject),
            other => Err(format!("unknown approval mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub mode: ApprovalMode,

    /// Seconds to wait for an answer before the request expires
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
