mod common;

use std::fs;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{manager_with, Decision, MockPlugin, ScriptedGate};
use rollout_core::api::{ExecuteOptions, Orchestrator, PlanError, PlanLoader, PlanValidator};

const PLAN: &str = r#"
apiVersion: v1
kind: ReleasePlan
metadata:
  name: checkout-release
  owner: payments
includes:
  - path: cluster.yaml
variables:
  image: "registry.local/checkout:${Cluster.spec.tag}"
  replicas: 3
stages:
  - name: prepare
    jobs:
      - name: migrate
        type: mock
        config:
          id: migrate
          image: ${image}
      - name: warm-cache
        type: mock
        dependsOn: [migrate]
        config:
          id: warm-cache
          replicas: ${replicas}
          run: "release-${execution.id}"
  - name: rollout
    requireApproval: true
    approvers: [sre]
    jobs:
      - name: deploy
        type: mock
        config:
          id: deploy
          region: ${Cluster.spec.region}
"#;

const CLUSTER: &str = r#"
kind: Cluster
spec:
  region: us-east-2
  tag: "2.7.1"
"#;

#[tokio::test]
async fn loaded_plan_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("release.yaml"), PLAN).unwrap();
    fs::write(dir.path().join("cluster.yaml"), CLUSTER).unwrap();

    let plan = PlanLoader::new()
        .load_plan(dir.path().join("release.yaml"))
        .unwrap();
    PlanValidator::new().validate_plan(&plan).unwrap();

    let mock = MockPlugin::new("mock");
    let gate = ScriptedGate::new(Decision::Approve);
    let orch = Orchestrator::new(manager_with(&[mock.clone()]), gate.clone());

    let result = orch
        .execute_plan(CancellationToken::new(), &plan, ExecuteOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(gate.asked(), 1);
    assert_eq!(mock.executed(), vec!["migrate", "warm-cache", "deploy"]);

    let calls = mock.calls();
    assert_eq!(calls[0].config["image"], json!("registry.local/checkout:2.7.1"));
    assert_eq!(calls[1].config["replicas"], json!(3));
    assert_eq!(calls[1].config["run"], json!(format!("release-{}", result.id)));
    assert_eq!(calls[2].config["region"], json!("us-east-2"));
}

#[test]
fn validator_rejects_what_loader_accepts() {
    let yaml = r#"
apiVersion: v1
kind: ReleasePlan
metadata: {name: broken}
stages:
  - name: s
    jobs:
      - {name: a, type: mock, dependsOn: [b]}
      - {name: b, type: mock, dependsOn: [a]}
"#;
    let plan = PlanLoader::new().load_plan_str(yaml, ".").unwrap();
    let err = PlanValidator::new().validate_plan(&plan).unwrap_err();
    assert!(matches!(err, PlanError::CircularDependency { .. }));
}
