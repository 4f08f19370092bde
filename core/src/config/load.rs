use std::path::{Path, PathBuf};

use super::types::AppConfig;

pub const ENV_PLUGIN_DIR: &str = "ROLLOUT_PLUGIN_DIR";
pub const ENV_LOG_LEVEL: &str = "ROLLOUT_LOG_LEVEL";
pub const ENV_APPROVAL_MODE: &str = "ROLLOUT_APPROVAL_MODE";

/// Get the default rollout data directory: ~/.rollout
pub fn get_rollout_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".rollout"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.rollout/config.toml
    let user_config = get_rollout_data_dir().ok().map(|d| d.join("config.toml"));

    // Priority 2: ./rollout.toml (current directory)
    let local_config = Path::new("rollout.toml");

    let mut cfg = match user_config {
        Some(path) if path.exists() => read_config(&path)?,
        _ if local_config.exists() => read_config(local_config)?,
        _ => AppConfig::default(),
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Read an explicit config file; environment overrides still apply.
pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = read_config(path.as_ref())?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))
}

pub(crate) fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty(ENV_PLUGIN_DIR) {
        cfg.plugins.directory = v;
    }
    if let Some(v) = non_empty(ENV_LOG_LEVEL) {
        cfg.logging.level = v;
    }
    if let Some(v) = non_empty(ENV_APPROVAL_MODE) {
        cfg.approval.mode = v.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    }
    Ok(())
}
