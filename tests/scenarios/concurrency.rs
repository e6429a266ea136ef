//! Test: Concurrency - independent stages overlap, bounded by the worker count

use crate::helpers::*;
use stagerun::execution::ExecuteOptions;
use stagerun::{PipelineGraph, Stage, StageStatus, Step};
use std::sync::Arc;
use std::time::Duration;

fn independent_stages(count: usize, gauge: &Arc<ConcurrencyGauge>) -> PipelineGraph {
    let mut graph = PipelineGraph::new("fan-out");
    for i in 0..count {
        let action = StubAction::passing(&format!("job-{}", i))
            .with_delay(Duration::from_millis(200))
            .with_gauge(gauge.clone());
        graph
            .add_stage(Stage::new(format!("stage-{}", i)).step(Step::new("job", action)))
            .unwrap();
    }
    graph
}

#[tokio::test]
async fn test_independent_stages_run_concurrently() {
    let gauge = ConcurrencyGauge::new();
    let graph = independent_stages(4, &gauge);

    let report = run_graph_with(&graph, ExecuteOptions::default().with_workers(4)).await;

    assert!(report.is_success());
    assert_eq!(gauge.peak(), 4);
}

#[tokio::test]
async fn test_worker_limit_bounds_running_stages() {
    let gauge = ConcurrencyGauge::new();
    let graph = independent_stages(5, &gauge);

    let report = run_graph_with(&graph, ExecuteOptions::default().with_workers(2)).await;

    assert!(report.is_success());
    assert_eq!(gauge.peak(), 2);
    assert_eq!(report.count_stages(StageStatus::Passed), 5);
}

#[tokio::test]
async fn test_single_worker_runs_stages_one_at_a_time() {
    let gauge = ConcurrencyGauge::new();
    let graph = independent_stages(3, &gauge);

    let report = run_graph_with(&graph, ExecuteOptions::default().with_workers(1)).await;

    assert!(report.is_success());
    assert_eq!(gauge.peak(), 1);
}

/// Steps inside one stage never overlap
#[tokio::test]
async fn test_steps_within_stage_are_sequential() {
    let gauge = ConcurrencyGauge::new();
    let mut stage = Stage::new("serial");
    for i in 0..3 {
        let action = StubAction::passing(&format!("step-{}", i))
            .with_delay(Duration::from_millis(30))
            .with_gauge(gauge.clone());
        stage = stage.step(Step::new(format!("step-{}", i), action));
    }
    let graph = PipelineGraph::new("serial").with_stage(stage).unwrap();

    let report = run_graph_with(&graph, ExecuteOptions::default().with_workers(8)).await;

    assert_eq!(gauge.peak(), 1);
    let names: Vec<&str> = report.steps().iter().map(|s| s.step.as_str()).collect();
    assert_eq!(names, vec!["step-0", "step-1", "step-2"]);
}

/// A dependent stage waits for its dependency to finish
#[tokio::test]
async fn test_dependency_finishes_before_dependent_starts() {
    let gauge = ConcurrencyGauge::new();
    let slow = StubAction::passing("slow")
        .with_delay(Duration::from_millis(100))
        .with_gauge(gauge.clone());
    let after = StubAction::passing("after")
        .with_delay(Duration::from_millis(10))
        .with_gauge(gauge.clone());
    let graph = PipelineGraph::new("ordered")
        .with_stage(Stage::new("first").step(Step::new("slow", slow)))
        .unwrap()
        .with_stage(Stage::new("second").depends_on("first").step(Step::new("after", after)))
        .unwrap();

    let report = run_graph_with(&graph, ExecuteOptions::default().with_workers(4)).await;

    assert!(report.is_success());
    assert_eq!(gauge.peak(), 1);
}
