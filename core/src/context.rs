use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Read-only state shared by every dispatch within a run.
///
/// Cloning is cheap; the variable map is shared. A stage-scoped view is
/// derived with [`ExecutionContext::with_stage`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: Arc<str>,
    variables: Arc<Map<String, Value>>,
    stage_name: Option<Arc<str>>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Start a new run with a freshly generated execution id.
    pub fn new(variables: Map<String, Value>, cancel: CancellationToken) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), variables, cancel)
    }

    pub fn with_id(
        execution_id: impl Into<String>,
        variables: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execution_id: Arc::from(execution_id.into()),
            variables: Arc::new(variables),
            stage_name: None,
            cancel,
        }
    }

    /// Context with no variables and its own cancellation token.
    pub fn detached(execution_id: impl Into<String>) -> Self {
        Self::with_id(execution_id, Map::new(), CancellationToken::new())
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn stage_name(&self) -> Option<&str> {
        self.stage_name.as_deref()
    }

    pub fn with_stage(&self, stage: &str) -> Self {
        Self {
            stage_name: Some(Arc::from(stage)),
            ..self.clone()
        }
    }

    /// Same run, but decoupled from the caller's cancellation.
    pub fn with_fresh_cancellation(&self) -> Self {
        Self {
            cancel: CancellationToken::new(),
            ..self.clone()
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Map that job configurations are resolved against.
    ///
    /// Plan variables sit at the top level. `variables` aliases the whole
    /// variable map and `execution` carries `{id, stage}`; neither shadows a
    /// plan variable of the same name.
    pub fn resolution_scope(&self) -> Map<String, Value> {
        let mut scope = (*self.variables).clone();
        scope
            .entry("variables")
            .or_insert_with(|| Value::Object((*self.variables).clone()));
        scope.entry("execution").or_insert_with(|| {
            json!({
                "id": self.execution_id(),
                "stage": self.stage_name(),
            })
        });
        scope
    }
}
