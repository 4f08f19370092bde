//! Job handlers shipped with rollout.
//!
//! `kubernetes` and `shell` are compiled in; anything else is described by a
//! TOML manifest in the plugin directory and run as a child process.

pub mod kubernetes;
pub mod process;
pub mod shell;

pub use kubernetes::{KubernetesAction, KubernetesPlugin, KUBERNETES_PLUGIN_NAME};
pub use process::{ManifestPluginSource, PluginManifest, ProcessPlugin};
pub use shell::{ShellPlugin, SHELL_PLUGIN_NAME};
