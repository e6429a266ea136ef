//! Test: YAML Pipeline - config files with shell actions run end to end

use crate::helpers::*;
use stagerun::core::config::PipelineConfig;
use stagerun::execution::ExecuteOptions;
use stagerun::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use stagerun::report::{JsonReporter, Reporter, TextReporter};
use stagerun::{RunStatus, StageStatus, StepStatus};

const WEB_APP: &str = r#"
name: "web-app ci"
workers: 2
variables:
  NODE_ENV: "test"
  TARGET: "web"

stages:
  - name: lint
    steps:
      - name: eslint
        autofix: "echo fixing {{ TARGET }}"
        validate:
          run: "echo '0 problems'"
          success_pattern: "0 problems"
      - name: prettier
        validate: "echo 'style drift' >&2; exit 3"
        continue_on_error: true

  - name: env
    steps:
      - name: node-env
        validate:
          check: { variable_equals: { name: NODE_ENV, value: test } }
      - name: manifest
        validate:
          check: { file_exists: "Cargo.toml" }

  - name: build
    depends_on: [lint, env]
    steps:
      - name: compile
        validate:
          all:
            - "test \"$NODE_ENV\" = test"
            - run: "echo built-$STAGERUN_STAGE-$STAGERUN_STEP"
              success_pattern: "^built-build-compile"
              use_regex: true

  - name: deploy
    depends_on: [build]
    steps:
      - name: publish
        validate: "echo token=$DEPLOY_TOKEN; exit 1"
"#;

#[tokio::test]
async fn test_web_app_pipeline_end_to_end() {
    let graph = graph_from_yaml(WEB_APP);
    let options = ExecuteOptions::default().with_secret("DEPLOY_TOKEN", "hunter2");

    let report = run_graph_with(&graph, options).await;

    assert_step(&report, "lint", "eslint", StepStatus::Passed);
    assert_step(&report, "lint", "prettier", StepStatus::FailedTolerated);
    assert_stage(&report, "lint", StageStatus::FailedTolerated);
    assert_stage(&report, "env", StageStatus::Passed);
    assert_stage(&report, "build", StageStatus::Passed);
    assert_stage(&report, "deploy", StageStatus::Failed);
    assert_eq!(report.status(), RunStatus::Failed);

    let prettier = report.step("lint", "prettier").unwrap().message.clone().unwrap();
    assert!(prettier.contains("exited with code 3"), "{}", prettier);
    assert!(prettier.contains("style drift"), "{}", prettier);

    let publish = report.step("deploy", "publish").unwrap().message.clone().unwrap();
    assert!(publish.contains("token=***"), "{}", publish);
    assert!(!publish.contains("hunter2"));
}

#[tokio::test]
async fn test_variable_overrides_reach_shell() {
    let yaml = r#"
name: "overrides"
variables:
  NODE_ENV: "development"
stages:
  - name: check
    steps:
      - name: env
        validate:
          run: "echo mode={{ NODE_ENV }}"
          success_pattern: "mode=production"
"#;
    let graph = graph_from_yaml(yaml);

    let default_run = run_graph(&graph).await;
    assert_step(&default_run, "check", "env", StepStatus::Failed);

    let overridden =
        run_graph_with(&graph, ExecuteOptions::default().with_variable("NODE_ENV", "production"))
            .await;
    assert_step(&overridden, "check", "env", StepStatus::Passed);
}

#[tokio::test]
async fn test_working_dir_applies_to_checks_and_shell() {
    let dir = std::env::temp_dir().join(format!("stagerun-yaml-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("web")).unwrap();
    std::fs::write(dir.join("web").join("package.json"), "{}").unwrap();

    let yaml = r#"
name: "workdir"
stages:
  - name: files
    steps:
      - name: package
        validate:
          check: { file_exists: "web/package.json" }
      - name: in-web
        validate:
          run: "test -f package.json"
          working_dir: "web"
"#;
    let graph = graph_from_yaml(yaml);
    let report = run_graph_with(&graph, ExecuteOptions::default().with_working_dir(&dir)).await;

    assert!(report.is_success(), "{:?}", step_statuses(&report));
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_config_timeout_fails_slow_command() {
    let yaml = r#"
name: "slow"
stages:
  - name: wait
    steps:
      - name: sleep
        validate: "sleep 5"
        timeout_secs: 1
"#;
    let graph = graph_from_yaml(yaml);

    let report = run_graph(&graph).await;

    assert_step(&report, "wait", "sleep", StepStatus::Failed);
    assert!(report.step("wait", "sleep").unwrap().message.as_deref().unwrap().contains("Timed out"));
}

#[test]
fn test_cyclic_config_is_rejected() {
    let yaml = r#"
name: "cyclic"
stages:
  - name: a
    depends_on: [b]
  - name: b
    depends_on: [a]
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("Cycle detected"));
}

#[tokio::test]
async fn test_report_and_history_of_a_real_run() {
    let graph = graph_from_yaml(WEB_APP);
    let report = run_graph(&graph).await;

    let mut text = Vec::new();
    TextReporter::plain().report(&report, &mut text).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("web-app ci"));
    assert!(text.contains("prettier"));
    assert!(text.contains("FAILED"));

    let mut json = Vec::new();
    JsonReporter.report(&report, &mut json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["stages"].as_array().unwrap().len(), 4);

    let store = InMemoryPersistence::new();
    let summary = RunSummary::from_report(&report);
    store.save_run(&summary).await.unwrap();
    let saved = store.load_run(report.run_id()).await.unwrap().unwrap();
    assert_eq!(saved.total_stages, 4);
    assert_eq!(saved.failed_stages, 1);
    assert_eq!(saved.passed_stages, 3);
    assert_eq!(saved.status, RunStatus::Failed);
}
