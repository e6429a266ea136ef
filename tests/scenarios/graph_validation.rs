//! Test: Graph Validation - invalid graphs are rejected before anything runs

use crate::helpers::*;
use stagerun::execution::{ExecuteOptions, Executor};
use stagerun::{ConfigError, PipelineGraph, RunStatus, Stage, StageStatus, Step};

fn cyclic(tracker: &StubAction) -> PipelineGraph {
    PipelineGraph::new("cyclic")
        .with_stage(Stage::new("setup").step(Step::new("tracker", tracker.clone())))
        .unwrap()
        .with_stage(Stage::new("a").depends_on("c").step(Step::new("a", tracker.clone())))
        .unwrap()
        .with_stage(Stage::new("b").depends_on("a").step(Step::new("b", tracker.clone())))
        .unwrap()
        .with_stage(Stage::new("c").depends_on("b").step(Step::new("c", tracker.clone())))
        .unwrap()
}

#[tokio::test]
async fn test_cycle_detected_before_any_action_runs() {
    let tracker = StubAction::passing("tracker");
    let graph = cyclic(&tracker);

    let report = run_graph(&graph).await;

    assert_eq!(tracker.calls(), 0);
    assert_eq!(report.status(), RunStatus::Failed);
    assert!(report.steps().is_empty());
    assert_eq!(report.count_stages(StageStatus::Skipped), 4);
    assert_skipped(&report, "setup", "Cycle detected");
}

#[tokio::test]
async fn test_try_execute_surfaces_cycle_path() {
    let tracker = StubAction::passing("tracker");
    let graph = cyclic(&tracker);

    let err = Executor::new(ExecuteOptions::default())
        .try_execute(&graph)
        .await
        .unwrap_err();

    let ConfigError::Cycle { path } = err else {
        panic!("expected a cycle error, got {:?}", err);
    };
    for stage in ["a", "b", "c"] {
        assert!(path.iter().any(|p| p == stage), "{} missing from {:?}", stage, path);
    }
    assert!(!path.iter().any(|p| p == "setup"));
    assert_eq!(tracker.calls(), 0);
}

#[tokio::test]
async fn test_self_dependency_is_a_cycle() {
    let graph = PipelineGraph::new("self")
        .with_stage(Stage::new("loop").depends_on("loop").step(Step::new("x", StubAction::passing("x"))))
        .unwrap();

    assert!(matches!(graph.validate(), Err(ConfigError::Cycle { .. })));
    assert_eq!(run_graph(&graph).await.status(), RunStatus::Failed);
}

#[tokio::test]
async fn test_unknown_dependency_is_rejected() {
    let graph = PipelineGraph::new("dangling")
        .with_stage(Stage::new("deploy").depends_on("build").step(Step::new("x", StubAction::passing("x"))))
        .unwrap();

    assert_eq!(
        graph.validate(),
        Err(ConfigError::UnknownDependency {
            stage: "deploy".to_string(),
            dependency: "build".to_string(),
        })
    );
    let report = run_graph(&graph).await;
    assert_skipped(&report, "deploy", "non-existent stage 'build'");
}

#[test]
fn test_duplicate_stage_is_rejected() {
    let mut graph = PipelineGraph::new("dup");
    graph.add_stage(Stage::new("lint")).unwrap();
    assert_eq!(
        graph.add_stage(Stage::new("lint")),
        Err(ConfigError::DuplicateStage("lint".to_string()))
    );
    assert_eq!(graph.len(), 1);
}
