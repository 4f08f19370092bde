use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary job configuration tree, as written in the plan.
pub type JobConfig = Map<String, Value>;

/// A release plan: ordered stages plus variables and an optional rollback plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<Include>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,

    #[serde(default)]
    pub stages: Vec<Stage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Rollback>,
}

impl Plan {
    /// Number of jobs across all forward stages.
    pub fn total_jobs(&self) -> usize {
        self.stages.iter().map(|s| s.jobs.len()).sum()
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback
            .as_ref()
            .map(|r| !r.stages.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// Reference to an external file merged into the variable context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Include {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub require_approval: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<String>,

    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Stage {
    pub fn new(name: impl Into<String>, jobs: Vec<Job>) -> Self {
        Self {
            name: name.into(),
            jobs,
            ..Default::default()
        }
    }

    pub fn with_approval(mut self, approvers: Vec<String>) -> Self {
        self.require_approval = true;
        self.approvers = approvers;
        self
    }
}

/// A unit of work. `timeout` and `retries` are carried for handlers; the
/// engine does not enforce them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub job_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default)]
    pub retries: u32,

    #[serde(default)]
    pub config: JobConfig,
}

impl Job {
    pub fn new(name: impl Into<String>, job_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            job_type: job_type.into(),
            ..Default::default()
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollback {
    #[serde(default)]
    pub stages: Vec<Stage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_deserializes_camel_case_fields() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "ReleasePlan",
            "metadata": {"name": "demo"},
            "stages": [{
                "name": "deploy",
                "requireApproval": true,
                "approvers": ["ops"],
                "jobs": [
                    {"name": "a", "type": "shell", "config": {"command": "true"}},
                    {"name": "b", "type": "shell", "dependsOn": ["a"], "retries": 2}
                ]
            }]
        });

        let plan: Plan = serde_json::from_value(raw).unwrap();
        assert_eq!(plan.api_version, "v1");
        let stage = &plan.stages[0];
        assert!(stage.require_approval);
        assert_eq!(stage.jobs[1].depends_on, vec!["a".to_string()]);
        assert_eq!(stage.jobs[1].retries, 2);
        assert_eq!(stage.jobs[0].job_type, "shell");
        assert_eq!(plan.total_jobs(), 2);
        assert!(!plan.has_rollback());
    }
}
