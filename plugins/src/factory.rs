use std::sync::Arc;
use std::time::Duration;

use rollout_core::api::{
    AppConfig, ApprovalGate, ApprovalMode, OutputRendererPlugin, PluginError, PluginManager,
};

use crate::approval::{ConsoleApprovalGate, StaticApprovalGate};
use crate::executor::{JsonlRendererPlugin, TextRendererPlugin};
use crate::handlers::{KubernetesPlugin, ManifestPluginSource, ShellPlugin};

/// Registry with the built-in handlers (unless disabled) plus whatever the
/// plugin directory provides. A missing or unreadable directory only warns.
pub fn build_plugin_manager(cfg: &AppConfig) -> Result<PluginManager, PluginError> {
    let dir = cfg.plugins.expanded_directory();
    let manager = PluginManager::new(&dir);

    if cfg.plugins.builtins {
        manager.register_plugin(Arc::new(KubernetesPlugin::new(
            cfg.plugins.kubectl_bin.clone(),
        )))?;
        manager.register_plugin(Arc::new(ShellPlugin::new()))?;
    }

    let source = ManifestPluginSource::new(manager.plugin_dir());
    if let Err(e) = manager.load_plugins(&source) {
        tracing::warn!(error = %e, "failed to load plugins");
    }

    Ok(manager)
}

pub fn build_approval_gate(cfg: &AppConfig) -> Arc<dyn ApprovalGate> {
    match cfg.approval.mode {
        ApprovalMode::Prompt => Arc::new(ConsoleApprovalGate::new(
            cfg.approval.timeout_secs.map(Duration::from_secs),
        )),
        ApprovalMode::AutoApprove => Arc::new(StaticApprovalGate::approve()),
        ApprovalMode::AutoReject => Arc::new(StaticApprovalGate::reject()),
    }
}

pub fn build_renderer(format: &str, cfg: &AppConfig) -> Arc<dyn OutputRendererPlugin> {
    match format {
        "jsonl" => Arc::new(JsonlRendererPlugin::new(false)),
        // anything else renders as text
        _ => Arc::new(TextRendererPlugin::new(cfg.execution.ascii)),
    }
}
