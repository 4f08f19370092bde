mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{
    job, job_with, manager_with, stage, Decision, MockPlugin, RecordingRenderer, ScriptedGate,
};
use rollout_core::api::{
    ExecuteOptions, ExecutorError, ExecutorOptions, Metadata, Orchestrator, Plan, Rollback,
    RunError, Stage, StageStatus,
};

fn plan(stages: Vec<Stage>, rollback: Option<Vec<Stage>>) -> Plan {
    Plan {
        api_version: "v1".into(),
        kind: "ReleasePlan".into(),
        metadata: Metadata {
            name: "test-plan".into(),
            ..Default::default()
        },
        stages,
        rollback: rollback.map(|stages| Rollback { stages }),
        ..Default::default()
    }
}

fn orchestrator(mock: &Arc<MockPlugin>, gate: Arc<ScriptedGate>) -> Orchestrator {
    Orchestrator::new(manager_with(&[mock.clone()]), gate).with_executor_options(ExecutorOptions {
        dry_run_delay: Duration::from_millis(1),
        max_parallel_jobs: 0,
    })
}

fn rollback_opts() -> ExecuteOptions {
    ExecuteOptions {
        auto_rollback: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn successful_run_aggregates_results() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![
            stage("build", vec![job("compile", &[]), job("test", &["compile"])]),
            stage("deploy", vec![job("apply", &[])]),
        ],
        None,
    );

    let result = orch
        .execute_plan(CancellationToken::new(), &plan, ExecuteOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.plan_name, "test-plan");
    assert_eq!(result.total_stages, 2);
    assert_eq!(result.total_jobs, 3);
    assert_eq!(result.completed_jobs, 3);
    assert_eq!(result.failed_jobs, 0);
    assert!(result.ended_at.is_some());
    assert!(result
        .stages
        .iter()
        .all(|s| s.status == StageStatus::Succeeded));

    // one execution id, threaded through every handler call
    let calls = mock.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.execution_id == result.id));
    assert_eq!(calls[2].stage.as_deref(), Some("deploy"));
}

#[tokio::test]
async fn rollback_plan_runs_every_stage_despite_failures() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![
            stage("one", vec![job("s1", &[])]),
            stage("two", vec![job_with("s2", &[], json!({"fail": true}))]),
            stage("three", vec![job("s3", &[])]),
        ],
        Some(vec![
            stage("undo-a", vec![job_with("r1", &[], json!({"fail": true}))]),
            stage("undo-b", vec![job("r2", &[])]),
        ]),
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    match &failure.cause {
        RunError::StageFailed { stage, source } => {
            assert_eq!(stage, "two");
            assert_eq!(source.failed_job(), Some("s2"));
        }
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(failure.to_string(), "Stage two failed: job s2 failed: s2 failed");

    assert_eq!(mock.executed(), vec!["s1", "s2", "r1", "r2"]);

    let result = &failure.result;
    assert!(!result.success);
    assert_eq!(result.stages.len(), 2);
    assert_eq!(result.rollback_stages.len(), 2);
    assert_eq!(result.rollback_stages[0].status, StageStatus::Failed);
    assert_eq!(result.rollback_stages[1].status, StageStatus::Succeeded);

    // rollback jobs are not part of the forward totals
    assert_eq!(result.completed_jobs, 1);
    assert_eq!(result.failed_jobs, 1);
}

#[tokio::test]
async fn no_rollback_without_auto_rollback() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![stage("one", vec![job_with("s1", &[], json!({"fail": true}))])],
        Some(vec![stage("undo", vec![job("r1", &[])])]),
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(mock.executed(), vec!["s1"]);
    assert!(failure.result.rollback_stages.is_empty());
    assert!(mock.rollbacks().is_empty());
}

#[tokio::test]
async fn handler_rollback_is_the_fallback_without_a_plan() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![
            stage("one", vec![job("s1", &[])]),
            stage("two", vec![job_with("s2", &[], json!({"fail": true}))]),
        ],
        None,
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    assert_eq!(mock.rollbacks(), vec![failure.result.id.clone()]);
}

#[tokio::test]
async fn handler_of_a_failed_job_is_rolled_back() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![stage("only", vec![job_with("s1", &[], json!({"fail": true}))])],
        None,
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    assert!(!failure.result.stages[0].jobs[0].success);
    assert_eq!(mock.rollbacks(), vec![failure.result.id.clone()]);
}

#[tokio::test]
async fn failing_handler_rollback_does_not_change_the_cause() {
    let mock = MockPlugin::with_failing_rollback("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![stage("one", vec![job("s1", &[]), job_with("s2", &["s1"], json!({"fail": true}))])],
        None,
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    assert_eq!(mock.rollbacks().len(), 1);
    assert_eq!(failure.cause.stage(), "one");
    assert!(matches!(failure.cause, RunError::StageFailed { .. }));
}

#[tokio::test]
async fn rejected_approval_skips_stage_and_rollback() {
    let mock = MockPlugin::new("mock");
    let gate = ScriptedGate::new(Decision::Reject);
    let orch = orchestrator(&mock, gate.clone());
    let plan = plan(
        vec![
            stage("staging", vec![job("s1", &[])]),
            stage("prod", vec![job("p1", &[])]).with_approval(vec!["ops".into()]),
        ],
        Some(vec![stage("undo", vec![job("r1", &[])])]),
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    assert_eq!(gate.asked(), 1);
    assert!(matches!(&failure.cause, RunError::ApprovalRejected { stage } if stage == "prod"));
    assert_eq!(mock.executed(), vec!["s1"]);

    let prod = failure.result.stage("prod").unwrap();
    assert_eq!(prod.status, StageStatus::Rejected);
    assert!(prod.jobs.is_empty());
    assert!(failure.result.rollback_stages.is_empty());
}

#[tokio::test]
async fn approval_error_fails_the_run() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Error));
    let plan = plan(
        vec![stage("prod", vec![job("p1", &[])]).with_approval(vec![])],
        None,
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, ExecuteOptions::default())
        .await
        .unwrap_err();

    match &failure.cause {
        RunError::ApprovalFailed { stage, reason } => {
            assert_eq!(stage, "prod");
            assert!(reason.contains("unavailable"));
        }
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(failure.result.stages[0].status, StageStatus::Failed);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn skip_approval_bypasses_the_gate() {
    let mock = MockPlugin::new("mock");
    let gate = ScriptedGate::new(Decision::Reject);
    let orch = orchestrator(&mock, gate.clone());
    let plan = plan(
        vec![stage("prod", vec![job("p1", &[])]).with_approval(vec!["ops".into()])],
        None,
    );

    let options = ExecuteOptions {
        skip_approval: true,
        ..Default::default()
    };
    let result = orch
        .execute_plan(CancellationToken::new(), &plan, options)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(gate.asked(), 0);
}

#[tokio::test]
async fn cancellation_between_stages() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![
            stage("one", vec![job_with("s1", &[], json!({"cancel": true}))]),
            stage("two", vec![job("s2", &[])]),
        ],
        Some(vec![stage("undo", vec![job("r1", &[])])]),
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    assert!(matches!(&failure.cause, RunError::Cancelled { stage } if stage == "two"));
    assert!(failure.cause.is_cancelled());
    assert_eq!(mock.executed(), vec!["s1"]);
    assert!(failure.result.rollback_stages.is_empty());
}

#[tokio::test]
async fn cancelled_stage_is_still_rolled_back() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![stage(
            "one",
            vec![job_with("s1", &[], json!({"cancel": true})), job("s2", &["s1"])],
        )],
        Some(vec![stage("undo", vec![job("r1", &[])])]),
    );

    let failure = orch
        .execute_plan(CancellationToken::new(), &plan, rollback_opts())
        .await
        .unwrap_err();

    assert!(matches!(
        &failure.cause,
        RunError::StageFailed {
            source: ExecutorError::Cancelled,
            ..
        }
    ));
    assert!(failure.cause.is_cancelled());
    assert_eq!(mock.executed(), vec!["s1", "r1"]);
    assert_eq!(failure.result.rollback_stages[0].status, StageStatus::Succeeded);
}

#[tokio::test]
async fn dry_run_simulates_every_stage() {
    let mock = MockPlugin::new("mock");
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve));
    let plan = plan(
        vec![
            stage("one", vec![job("a", &[]), job("b", &["a"])]),
            stage("two", vec![job("c", &[])]),
        ],
        None,
    );

    let options = ExecuteOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = orch
        .execute_plan(CancellationToken::new(), &plan, options)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.completed_jobs, 3);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn render_events_bracket_the_run() {
    let mock = MockPlugin::new("mock");
    let renderer = RecordingRenderer::new();
    let orch = orchestrator(&mock, ScriptedGate::new(Decision::Approve)).with_renderer(renderer.clone());
    let plan = plan(
        vec![stage("prod", vec![job("p1", &[])]).with_approval(vec!["ops".into()])],
        None,
    );

    orch.execute_plan(CancellationToken::new(), &plan, ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(
        renderer.event_types(),
        vec![
            "run.start",
            "stage.start",
            "approval.requested",
            "approval.resolved",
            "wave.start",
            "job.complete",
            "stage.end",
            "run.end",
        ]
    );
}
