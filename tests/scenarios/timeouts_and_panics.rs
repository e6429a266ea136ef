//! Test: Timeouts and Panics - misbehaving actions become failed steps

use crate::helpers::*;
use async_trait::async_trait;
use stagerun::core::AutofixOutcome;
use stagerun::execution::ExecuteOptions;
use stagerun::{
    Action, ActionContext, ActionError, ActionOutcome, PipelineGraph, RunStatus, ShellAction,
    Stage, StageStatus, Step, StepStatus,
};
use std::path::Path;
use std::time::Duration;

#[derive(Debug)]
struct Exploding;

#[async_trait]
impl Action for Exploding {
    fn describe(&self) -> String {
        "exploding".to_string()
    }

    async fn run(&self, _ctx: &ActionContext) -> Result<ActionOutcome, ActionError> {
        panic!("boom in action");
    }
}

fn single(step: Step) -> PipelineGraph {
    PipelineGraph::new("misbehaving")
        .with_stage(Stage::new("work").step(step))
        .unwrap()
        .with_stage(Stage::new("after").depends_on("work").step(Step::new("x", StubAction::passing("x"))))
        .unwrap()
}

#[tokio::test]
async fn test_step_timeout_fails_validation() {
    let graph = single(
        Step::new("hang", StubAction::passing("hang").with_delay(Duration::from_secs(10)))
            .with_timeout(Duration::from_millis(50)),
    );

    let report = run_graph(&graph).await;

    assert_step(&report, "work", "hang", StepStatus::Failed);
    assert!(report.step("work", "hang").unwrap().message.as_deref().unwrap().contains("Timed out"));
    assert_skipped(&report, "after", "dependency 'work' failed");
}

#[tokio::test]
async fn test_default_timeout_from_options() {
    let graph = single(Step::new(
        "hang",
        StubAction::passing("hang").with_delay(Duration::from_secs(10)),
    ));

    let options = ExecuteOptions::default().with_default_timeout(Duration::from_millis(50));
    let report = run_graph_with(&graph, options).await;

    assert_step(&report, "work", "hang", StepStatus::Failed);
    assert_eq!(report.status(), RunStatus::Failed);
}

#[tokio::test]
async fn test_autofix_timeout_is_swallowed() {
    let graph = single(
        Step::new("lint", StubAction::passing("validate"))
            .with_autofix(StubAction::passing("fix").with_delay(Duration::from_secs(10)))
            .with_timeout(Duration::from_millis(50)),
    );

    let report = run_graph(&graph).await;

    let outcome = report.step("work", "lint").unwrap();
    assert_eq!(outcome.status, StepStatus::Passed);
    assert!(matches!(
        &outcome.autofix,
        Some(AutofixOutcome::Failed { message }) if message.contains("Timed out")
    ));
    assert!(report.is_success());
}

#[tokio::test]
async fn test_panicking_action_fails_step() {
    let graph = single(Step::new("boom", Exploding));

    let report = run_graph(&graph).await;

    assert_step(&report, "work", "boom", StepStatus::Failed);
    let message = report.step("work", "boom").unwrap().message.clone().unwrap();
    assert!(message.contains("boom in action"), "{}", message);
    assert_stage(&report, "after", StageStatus::Skipped);
}

#[tokio::test]
async fn test_panicking_autofix_is_tolerated() {
    let graph = single(Step::new("lint", StubAction::passing("validate")).with_autofix(Exploding));

    let report = run_graph(&graph).await;

    assert_step(&report, "work", "lint", StepStatus::Passed);
    assert_stage(&report, "after", StageStatus::Passed);
}

/// A command whose grandchild writes `name` after a second
fn late_writer(dir: &Path, name: &str) -> ShellAction {
    ShellAction::new(format!(
        "sh -c 'sleep 1; touch \"{}\"'; true",
        dir.join(name).display()
    ))
}

#[tokio::test]
async fn test_timed_out_commands_take_their_children_down() {
    let dir = std::env::temp_dir().join(format!("stagerun-timeout-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let graph = PipelineGraph::new("cleanup")
        .with_stage(
            Stage::new("lint")
                .step(
                    Step::new("eslint", ShellAction::new("test ! -e fixed"))
                        .with_autofix(late_writer(&dir, "fixed"))
                        .with_timeout(Duration::from_millis(100)),
                )
                .step(
                    Step::new("typecheck", late_writer(&dir, "checked"))
                        .with_timeout(Duration::from_millis(100))
                        .continue_on_error(true),
                ),
        )
        .unwrap();

    let options = ExecuteOptions::default().with_working_dir(&dir);
    let report = run_graph_with(&graph, options).await;

    let eslint = report.step("lint", "eslint").unwrap();
    assert_eq!(eslint.status, StepStatus::Passed);
    assert!(matches!(&eslint.autofix, Some(AutofixOutcome::Failed { .. })));
    assert_step(&report, "lint", "typecheck", StepStatus::FailedTolerated);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!dir.join("fixed").exists(), "timed-out auto-fix kept running");
    assert!(!dir.join("checked").exists(), "timed-out validation kept running");

    std::fs::remove_dir_all(&dir).ok();
}
