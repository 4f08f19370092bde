#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use rollout_core::api::{
    ApprovalGate, ExecutionContext, Job, JobConfig, OutputRendererPlugin, Plugin,
    PluginManager, PluginResult, RenderEvent, Stage,
};

pub const MOCK: &str = "mock";

/// One observed interaction with [`MockPlugin`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub id: String,
    pub stage: Option<String>,
    pub execution_id: String,
    pub config: JobConfig,
}

/// Handler whose behaviour is driven by the job config:
/// `fail`, `error`, `invalid`, `panic`, `cancel` and `sleep_ms`.
pub struct MockPlugin {
    name: String,
    calls: Mutex<Vec<Call>>,
    timeline: Mutex<Vec<String>>,
    rollbacks: Mutex<Vec<String>>,
    fail_rollback: bool,
}

impl MockPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, false))
    }

    pub fn with_failing_rollback(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, true))
    }

    fn build(name: &str, fail_rollback: bool) -> Self {
        Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            timeline: Mutex::new(Vec::new()),
            rollbacks: Mutex::new(Vec::new()),
            fail_rollback,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// `id` of every executed job, in start order
    pub fn executed(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.id).collect()
    }

    /// `start:<id>` / `end:<id>` markers in the order they happened
    pub fn timeline(&self) -> Vec<String> {
        self.timeline.lock().unwrap().clone()
    }

    /// Execution ids passed to `rollback`
    pub fn rollbacks(&self) -> Vec<String> {
        self.rollbacks.lock().unwrap().clone()
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "test double"
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    async fn validate(&self, _ctx: &ExecutionContext, config: &JobConfig) -> anyhow::Result<()> {
        if config.contains_key("invalid") {
            anyhow::bail!("invalid config");
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &JobConfig,
    ) -> anyhow::Result<PluginResult> {
        let id = config
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.calls.lock().unwrap().push(Call {
            id: id.clone(),
            stage: ctx.stage_name().map(str::to_string),
            execution_id: ctx.execution_id().to_string(),
            config: config.clone(),
        });
        self.timeline.lock().unwrap().push(format!("start:{id}"));

        if let Some(ms) = config.get("sleep_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.timeline.lock().unwrap().push(format!("end:{id}"));

        if config.contains_key("cancel") {
            ctx.cancellation_token().cancel();
        }
        if config.contains_key("panic") {
            panic!("mock panic in {id}");
        }
        if let Some(msg) = config.get("error").and_then(Value::as_str) {
            anyhow::bail!("{msg}");
        }
        if config.contains_key("fail") {
            return Ok(PluginResult::failure(ctx, format!("{id} failed")));
        }

        let mut data = Map::new();
        data.insert("id".into(), json!(id));
        Ok(PluginResult::success(ctx, format!("{id} done")).with_data(data))
    }

    async fn rollback(&self, _ctx: &ExecutionContext, execution_id: &str) -> anyhow::Result<()> {
        self.rollbacks.lock().unwrap().push(execution_id.to_string());
        if self.fail_rollback {
            anyhow::bail!("rollback failed");
        }
        Ok(())
    }
}

pub fn manager_with(plugins: &[Arc<MockPlugin>]) -> Arc<PluginManager> {
    let manager = PluginManager::default();
    for plugin in plugins {
        manager.register_plugin(plugin.clone()).unwrap();
    }
    Arc::new(manager)
}

/// A `mock` job whose config carries its own name as `id`.
pub fn job(name: &str, deps: &[&str]) -> Job {
    job_with(name, deps, json!({}))
}

/// Like [`job`], with extra config keys merged in.
pub fn job_with(name: &str, deps: &[&str], extra: Value) -> Job {
    job_of(MOCK, name, deps, extra)
}

pub fn job_of(job_type: &str, name: &str, deps: &[&str], extra: Value) -> Job {
    let mut config = Map::new();
    config.insert("id".into(), json!(name));
    if let Value::Object(extra) = extra {
        config.extend(extra);
    }
    Job::new(name, job_type)
        .depends_on(deps.iter().copied())
        .with_config(config)
}

pub fn stage(name: &str, jobs: Vec<Job>) -> Stage {
    Stage::new(name, jobs)
}

#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(RenderEvent::event_type).collect()
    }
}

impl OutputRendererPlugin for RecordingRenderer {
    fn name(&self) -> &str {
        "recording"
    }

    fn format(&self) -> &str {
        "memory"
    }

    fn render(&self, event: &RenderEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub enum Decision {
    Approve,
    Reject,
    Error,
}

/// Approval gate with a fixed answer that counts how often it was asked.
pub struct ScriptedGate {
    decision: Decision,
    asked: AtomicUsize,
}

impl ScriptedGate {
    pub fn new(decision: Decision) -> Arc<Self> {
        Arc::new(Self {
            decision,
            asked: AtomicUsize::new(0),
        })
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalGate for ScriptedGate {
    async fn request_approval(
        &self,
        _ctx: &ExecutionContext,
        _stage: &Stage,
    ) -> anyhow::Result<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        match self.decision {
            Decision::Approve => Ok(true),
            Decision::Reject => Ok(false),
            Decision::Error => anyhow::bail!("approval service unavailable"),
        }
    }
}
