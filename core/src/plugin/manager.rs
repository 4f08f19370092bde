use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;

use super::traits::{Plugin, PluginResult, PluginSource};
use crate::context::ExecutionContext;
use crate::error::PluginError;
use crate::model::JobConfig;

pub const DEFAULT_PLUGIN_DIR: &str = "./plugins";

/// Name-keyed registry of job handlers.
///
/// Lookups clone the `Arc` out of the registry so no lock is held while a
/// handler runs.
pub struct PluginManager {
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
    plugin_dir: PathBuf,
}

impl PluginManager {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            plugin_dir: plugin_dir.into(),
        }
    }

    /// Directory scanned for discoverable plugins.
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        let mut plugins = self.write();
        if plugins.contains_key(&name) {
            return Err(PluginError::AlreadyRegistered(name));
        }
        tracing::debug!(plugin = %name, version = plugin.version(), "registered plugin");
        plugins.insert(name, plugin);
        Ok(())
    }

    pub fn get_plugin(&self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Snapshot of every registered plugin, in no particular order.
    pub fn list_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Validate then execute `config` with the plugin registered as `job_type`.
    pub async fn execute_plugin(
        &self,
        ctx: &ExecutionContext,
        job_type: &str,
        config: &JobConfig,
    ) -> Result<PluginResult, PluginError> {
        let plugin = self.get_plugin(job_type)?;

        AssertUnwindSafe(plugin.validate(ctx, config))
            .catch_unwind()
            .await
            .map_err(|_| PluginError::Panicked {
                plugin: job_type.to_string(),
                phase: "validate",
            })?
            .map_err(|source| PluginError::InvalidConfig {
                plugin: job_type.to_string(),
                source,
            })?;

        tracing::debug!(plugin = job_type, execution_id = ctx.execution_id(), "executing plugin");

        AssertUnwindSafe(plugin.execute(ctx, config))
            .catch_unwind()
            .await
            .map_err(|_| PluginError::Panicked {
                plugin: job_type.to_string(),
                phase: "execute",
            })?
            .map_err(|source| PluginError::Execution {
                plugin: job_type.to_string(),
                source,
            })
    }

    /// Ask the plugin registered as `job_type` to undo `execution_id`.
    pub async fn rollback_plugin(
        &self,
        ctx: &ExecutionContext,
        job_type: &str,
        execution_id: &str,
    ) -> Result<(), PluginError> {
        let plugin = self.get_plugin(job_type)?;

        AssertUnwindSafe(plugin.rollback(ctx, execution_id))
            .catch_unwind()
            .await
            .map_err(|_| PluginError::Panicked {
                plugin: job_type.to_string(),
                phase: "rollback",
            })?
            .map_err(|source| PluginError::Execution {
                plugin: job_type.to_string(),
                source,
            })
    }

    /// Register every plugin `source` can load. Returns how many were added.
    ///
    /// Candidates that fail to load and names that are already taken are
    /// skipped with a warning.
    pub fn load_plugins(&self, source: &dyn PluginSource) -> Result<usize, PluginError> {
        let candidates = source.discover().map_err(|e| PluginError::Discovery {
            source_name: source.name().to_string(),
            reason: format!("{e:#}"),
        })?;

        let mut loaded = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            match source.load(candidate) {
                Ok(plugin) => loaded.push(plugin),
                Err(e) => tracing::warn!(
                    source = source.name(),
                    candidate = %candidate.display(),
                    error = %format!("{e:#}"),
                    "failed to load plugin"
                ),
            }
        }

        let mut plugins = self.write();
        let mut registered = 0;
        for plugin in loaded {
            let name = plugin.name().to_string();
            if plugins.contains_key(&name) {
                tracing::warn!(
                    source = source.name(),
                    plugin = %name,
                    "plugin name already registered, skipping"
                );
                continue;
            }
            plugins.insert(name, plugin);
            registered += 1;
        }

        tracing::info!(
            source = source.name(),
            candidates = candidates.len(),
            registered,
            "plugin discovery finished"
        );
        Ok(registered)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Plugin>>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Plugin>>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGIN_DIR)
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("PluginManager")
            .field("plugins", &names)
            .field("plugin_dir", &self.plugin_dir)
            .finish()
    }
}
