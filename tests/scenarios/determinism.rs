//! Test: Determinism - same graph, same actions, same report shape

use crate::helpers::*;
use stagerun::execution::ExecuteOptions;
use stagerun::{PipelineGraph, Stage, Step};
use std::time::Duration;

fn web_app() -> PipelineGraph {
    let slow = |name: &str, ms: u64| StubAction::passing(name).with_delay(Duration::from_millis(ms));

    PipelineGraph::new("web-app ci")
        .with_stage(Stage::new("install").step(Step::new("npm-ci", slow("npm-ci", 5))))
        .unwrap()
        .with_stage(
            Stage::new("lint")
                .depends_on("install")
                .step(Step::new("eslint", slow("eslint", 30)))
                .step(Step::new("prettier", StubAction::failing("prettier")).continue_on_error(true)),
        )
        .unwrap()
        .with_stage(
            Stage::new("test")
                .depends_on("install")
                .step(Step::new("unit", slow("unit", 1)))
                .step(Step::new("e2e", StubAction::failing("e2e"))),
        )
        .unwrap()
        .with_stage(
            Stage::new("build")
                .depends_on("lint")
                .step(Step::new("compile", slow("compile", 1))),
        )
        .unwrap()
        .with_stage(
            Stage::new("deploy")
                .depends_on("build")
                .depends_on("test")
                .step(Step::new("publish", slow("publish", 1))),
        )
        .unwrap()
}

#[tokio::test]
async fn test_repeated_runs_give_identical_outcomes() {
    let graph = web_app();
    let options = ExecuteOptions::default().with_workers(4);

    let first = run_graph_with(&graph, options.clone()).await;
    let second = run_graph_with(&graph, options).await;

    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(first.status(), second.status());
    assert_eq!(stage_statuses(&first), stage_statuses(&second));
    assert_eq!(step_statuses(&first), step_statuses(&second));
}

#[tokio::test]
async fn test_report_follows_topological_order() {
    let graph = web_app();
    let report = run_graph_with(&graph, ExecuteOptions::default().with_workers(4)).await;

    let stages: Vec<String> = stage_statuses(&report).into_iter().map(|(name, _)| name).collect();
    assert_eq!(stages, graph.topological_order().unwrap());
    assert_eq!(stages, vec!["install", "lint", "test", "build", "deploy"]);

    let steps: Vec<(String, String)> = step_statuses(&report)
        .into_iter()
        .map(|(stage, step, _)| (stage, step))
        .collect();
    let expected: Vec<(String, String)> = [
        ("install", "npm-ci"),
        ("lint", "eslint"),
        ("lint", "prettier"),
        ("test", "unit"),
        ("test", "e2e"),
        ("build", "compile"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    assert_eq!(steps, expected);
}
