//! Test: Dependency Skip - hard failures skip every dependent stage

use crate::helpers::*;
use stagerun::{PipelineGraph, RunStatus, Stage, StageStatus, Step, StepStatus};

/// build{lint: autofix ok, validate fails} -> deploy{publish}
#[tokio::test]
async fn test_failed_build_skips_deploy() {
    let publish = StubAction::passing("publish");
    let graph = PipelineGraph::new("web-app ci")
        .with_stage(Stage::new("build").step(
            Step::new("lint", StubAction::failing("lint")).with_autofix(StubAction::passing("fix")),
        ))
        .unwrap()
        .with_stage(
            Stage::new("deploy")
                .depends_on("build")
                .step(Step::new("publish", publish.clone())),
        )
        .unwrap();

    let report = run_graph(&graph).await;

    assert_stage(&report, "build", StageStatus::Failed);
    assert_step(&report, "build", "lint", StepStatus::Failed);
    assert_skipped(&report, "deploy", "dependency 'build' failed");
    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(publish.calls(), 0, "skipped stage must not run its actions");
    assert!(report.step("deploy", "publish").is_none());
}

/// Skips propagate through the whole downstream chain
#[tokio::test]
async fn test_skip_is_transitive() {
    let docs = StubAction::passing("docs");
    let release = StubAction::passing("release");
    let graph = PipelineGraph::new("chain")
        .with_stage(Stage::new("install").step(Step::new("npm-ci", StubAction::failing("npm-ci"))))
        .unwrap()
        .with_stage(Stage::new("build").depends_on("install").step(Step::new("docs", docs.clone())))
        .unwrap()
        .with_stage(
            Stage::new("release")
                .depends_on("build")
                .step(Step::new("release", release.clone())),
        )
        .unwrap();

    let report = run_graph(&graph).await;

    assert_skipped(&report, "build", "dependency 'install' failed");
    assert_skipped(&report, "release", "dependency 'build' was skipped");
    assert_eq!(docs.calls() + release.calls(), 0);
}

/// Independent branches keep running next to a failed one
#[tokio::test]
async fn test_unrelated_stage_still_runs() {
    let graph = graph_with_branches();
    let report = run_graph(&graph).await;

    assert_stage(&report, "lint", StageStatus::Failed);
    assert_skipped(&report, "deploy", "lint");
    assert_stage(&report, "test", StageStatus::Passed);
    assert_step(&report, "test", "unit", StepStatus::Passed);
    assert_eq!(report.status(), RunStatus::Failed);
}

/// Remaining steps of a hard-failed stage do not run
#[tokio::test]
async fn test_failed_step_stops_its_stage() {
    let after = StubAction::passing("after");
    let graph = PipelineGraph::new("stop")
        .with_stage(
            Stage::new("build")
                .step(Step::new("first", StubAction::passing("first")))
                .step(Step::new("broken", StubAction::failing("broken")))
                .step(Step::new("after", after.clone())),
        )
        .unwrap();

    let report = run_graph(&graph).await;

    assert_stage(&report, "build", StageStatus::Failed);
    assert_eq!(
        step_statuses(&report),
        vec![
            ("build".to_string(), "first".to_string(), StepStatus::Passed),
            ("build".to_string(), "broken".to_string(), StepStatus::Failed),
        ]
    );
    assert_eq!(after.calls(), 0);
}

fn graph_with_branches() -> PipelineGraph {
    PipelineGraph::new("branches")
        .with_stage(Stage::new("lint").step(Step::new("eslint", StubAction::failing("eslint"))))
        .unwrap()
        .with_stage(Stage::new("test").step(Step::new("unit", StubAction::passing("unit"))))
        .unwrap()
        .with_stage(
            Stage::new("deploy")
                .depends_on("lint")
                .depends_on("test")
                .step(Step::new("publish", StubAction::passing("publish"))),
        )
        .unwrap()
}
