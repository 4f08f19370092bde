//! Job handler contracts and the registry that dispatches to them.

pub mod manager;
pub mod traits;

pub use manager::{PluginManager, DEFAULT_PLUGIN_DIR};
pub use traits::{Artifact, ConfigSchema, Plugin, PluginResult, PluginSource};
