use rollout_core::api::{AppConfig, CliError};
use rollout_plugins::factory::build_plugin_manager;

use super::cli::PluginsArgs;

/// One block per registered handler, sorted by name.
pub fn list_plugins(args: &PluginsArgs, cfg: &AppConfig) -> Result<String, CliError> {
    let mut cfg = cfg.clone();
    if let Some(dir) = &args.plugin_dir {
        cfg.plugins.directory = dir.clone();
    }
    let manager = build_plugin_manager(&cfg)?;

    let mut plugins = manager.list_plugins();
    plugins.sort_by(|a, b| a.name().cmp(b.name()));

    if plugins.is_empty() {
        return Ok(format!(
            "No plugins registered (plugin directory: {})",
            manager.plugin_dir().display()
        ));
    }

    let mut lines = Vec::new();
    for plugin in plugins {
        lines.push(format!("{} {}", plugin.name(), plugin.version()));
        if !plugin.description().is_empty() {
            lines.push(format!("  {}", plugin.description()));
        }
        if let Some(schema) = plugin.config_schema().filter(|s| !s.required.is_empty()) {
            lines.push(format!("  required: {}", schema.required.join(", ")));
        }
    }
    Ok(lines.join("\n"))
}
