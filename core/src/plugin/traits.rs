use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::model::JobConfig;

/// Job handler keyed by a unique name (the job `type` in a plan).
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier; jobs select the plugin with `type: <name>`
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn version(&self) -> &str;

    /// Declarative config description for tooling. Not enforced by the engine.
    fn config_schema(&self) -> Option<ConfigSchema> {
        None
    }

    /// Check a (variable-resolved) configuration before execution
    async fn validate(&self, ctx: &ExecutionContext, config: &JobConfig) -> anyhow::Result<()>;

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &JobConfig,
    ) -> anyhow::Result<PluginResult>;

    /// Revert whatever this plugin changed during `execution_id`
    async fn rollback(&self, ctx: &ExecutionContext, execution_id: &str) -> anyhow::Result<()>;
}

/// Discovers plugins outside the compiled-in set.
pub trait PluginSource: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate locations to load, in load order
    fn discover(&self) -> anyhow::Result<Vec<PathBuf>>;

    fn load(&self, candidate: &Path) -> anyhow::Result<Arc<dyn Plugin>>;
}

/// Outcome reported by a plugin's `execute`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default)]
    pub execution_id: String,
}

impl PluginResult {
    pub fn success(ctx: &ExecutionContext, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            execution_id: ctx.execution_id().to_string(),
            ..Default::default()
        }
    }

    pub fn failure(ctx: &ExecutionContext, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            execution_id: ctx.execution_id().to_string(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

/// File or blob produced by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

/// Minimal JSON-schema-like description of a plugin config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ConfigSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ConfigSchema>>,
}

impl ConfigSchema {
    pub fn of(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn object<I, S>(properties: I, required: &[&str]) -> Self
    where
        I: IntoIterator<Item = (S, ConfigSchema)>,
        S: Into<String>,
    {
        Self {
            kind: "object".to_string(),
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
            items: None,
        }
    }

    pub fn array_of(items: ConfigSchema) -> Self {
        Self {
            kind: "array".to_string(),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }
}
