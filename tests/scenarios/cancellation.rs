//! Test: Cancellation - no new stages start, in-flight steps finish

use crate::helpers::*;
use stagerun::execution::{CancelToken, ExecuteOptions};
use stagerun::{PipelineGraph, RunStatus, Stage, StageStatus, Step, StepStatus};
use std::time::Duration;

fn cancel_after(token: &CancelToken, delay: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.cancel();
    });
}

#[tokio::test]
async fn test_cancel_skips_unstarted_stages() {
    let slow = StubAction::passing("slow").with_delay(Duration::from_millis(300));
    let later = StubAction::passing("later");
    let graph = PipelineGraph::new("cancel")
        .with_stage(Stage::new("build").step(Step::new("compile", slow.clone())))
        .unwrap()
        .with_stage(Stage::new("deploy").depends_on("build").step(Step::new("publish", later.clone())))
        .unwrap();

    let token = CancelToken::new();
    cancel_after(&token, Duration::from_millis(50));
    let report = run_graph_with(&graph, ExecuteOptions::default().with_cancel(token)).await;

    assert_eq!(slow.calls(), 1);
    assert_step(&report, "build", "compile", StepStatus::Passed);
    assert_stage(&report, "build", StageStatus::Passed);
    assert_skipped(&report, "deploy", "cancelled");
    assert_eq!(later.calls(), 0);
    assert_eq!(report.status(), RunStatus::Cancelled);
}

#[tokio::test]
async fn test_running_stage_stops_before_next_step() {
    let first = StubAction::passing("first").with_delay(Duration::from_millis(300));
    let second = StubAction::passing("second");
    let graph = PipelineGraph::new("cancel")
        .with_stage(
            Stage::new("build")
                .step(Step::new("first", first.clone()))
                .step(Step::new("second", second.clone())),
        )
        .unwrap();

    let token = CancelToken::new();
    cancel_after(&token, Duration::from_millis(50));
    let report = run_graph_with(&graph, ExecuteOptions::default().with_cancel(token)).await;

    assert_step(&report, "build", "first", StepStatus::Passed);
    assert!(report.step("build", "second").is_none());
    assert_eq!(second.calls(), 0);
    assert_skipped(&report, "build", "cancelled");
    assert_eq!(report.status(), RunStatus::Cancelled);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let publish = StubAction::passing("publish");
    let graph = PipelineGraph::new("cancel")
        .with_stage(Stage::new("a").step(Step::new("publish", publish.clone())))
        .unwrap()
        .with_stage(Stage::new("b").step(Step::new("publish", publish.clone())))
        .unwrap();

    let token = CancelToken::new();
    token.cancel();
    let report = run_graph_with(&graph, ExecuteOptions::default().with_cancel(token)).await;

    assert_eq!(publish.calls(), 0);
    assert_eq!(report.count_stages(StageStatus::Skipped), 2);
    assert_eq!(report.status(), RunStatus::Cancelled);
}

#[tokio::test]
async fn test_failure_takes_precedence_over_cancel() {
    let graph = PipelineGraph::new("cancel")
        .with_stage(
            Stage::new("build").step(Step::new(
                "broken",
                StubAction::failing("broken").with_delay(Duration::from_millis(100)),
            )),
        )
        .unwrap()
        .with_stage(Stage::new("docs").step(Step::new(
            "slow",
            StubAction::passing("slow").with_delay(Duration::from_millis(100)),
        )))
        .unwrap()
        .with_stage(Stage::new("later").depends_on("docs").step(Step::new("x", StubAction::passing("x"))))
        .unwrap();

    let token = CancelToken::new();
    cancel_after(&token, Duration::from_millis(20));
    let report =
        run_graph_with(&graph, ExecuteOptions::default().with_workers(2).with_cancel(token)).await;

    assert_stage(&report, "build", StageStatus::Failed);
    assert_skipped(&report, "later", "cancelled");
    assert_eq!(report.status(), RunStatus::Failed);
}
