use anyhow::{Context, Result};
use stagerun::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use stagerun::cli::output::*;
use stagerun::cli::{Cli, Command};
use stagerun::core::config::PipelineConfig;
use stagerun::execution::{ExecuteOptions, ExecutionEvent, Executor};
use stagerun::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use stagerun::report::{JsonReporter, Reporter, TextReporter};
use stagerun::RunStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to set logging subscriber")?;

    // Execute command
    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    let store = stagerun::persistence::SqliteRunStore::with_default_path()
        .await
        .context("Failed to open run history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without the sqlite feature; run history is not kept");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<i32> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let graph = config.to_graph()?;

    if !cmd.json {
        println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());
    }

    let mut options = ExecuteOptions::default().with_environment(std::env::vars());
    if let Some(workers) = cmd.workers.map(|w| w as usize).or(config.workers) {
        options = options.with_workers(workers);
    }
    if let Some(timeout) = cmd.timeout.map(Duration::from_secs).or(config.default_timeout()) {
        options = options.with_default_timeout(timeout);
    }
    for (key, value) in &cmd.variables {
        if !cmd.json {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
        options = options.with_variable(key, value);
    }
    for (key, value) in &cmd.secrets {
        options = options.with_secret(key, value);
    }

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_store().await?
    };

    let mut executor = Executor::new(options);
    let spinner = (!cmd.json).then(|| create_spinner(graph.len()));

    // Set up event handler for console output
    if let Some(spinner) = spinner.clone() {
        executor = executor.with_event_handler(move |event| {
            if let ExecutionEvent::StageFinished { .. } | ExecutionEvent::StageSkipped { .. } =
                &event
            {
                spinner.inc(1);
            }
            if let ExecutionEvent::StageStarted { stage } = &event {
                spinner.set_message(stage.clone());
            }
            spinner.println(format_execution_event(&event));
        });
    }

    // Ctrl-C stops new stages from starting
    let cancel = executor.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight steps");
            cancel.cancel();
        }
    });

    let report = executor.execute(&graph).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let mut stdout = std::io::stdout();
    if cmd.json {
        JsonReporter.report(&report, &mut stdout)?;
    } else {
        println!();
        TextReporter::new().report(&report, &mut stdout)?;
    }

    // Save to history
    if !cmd.no_history {
        let summary = RunSummary::from_report(&report);
        match store.save_run(&summary).await {
            Ok(()) if !cmd.json => println!(
                "\n{} Run saved to history (ID: {})",
                INFO,
                style(&summary.run_id.to_string()[..8]).dim()
            ),
            Ok(()) => {}
            Err(e) => error!("Failed to save run history: {:#}", e),
        }
    }

    Ok(match report.status() {
        RunStatus::Passed => 0,
        RunStatus::Failed => 1,
        RunStatus::Cancelled => 130,
    })
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    let result = PipelineConfig::from_file(&cmd.file)
        .and_then(|config| Ok((config.to_graph()?.topological_order()?, config)));

    match result {
        Ok((order, config)) => {
            if cmd.json {
                let data = serde_json::json!({
                    "valid": true,
                    "name": config.name,
                    "stages": config.stages.len(),
                    "steps": config.stages.iter().map(|s| s.steps.len()).sum::<usize>(),
                    "variables": config.variables.len(),
                    "order": order,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Pipeline configuration is valid!", CHECK);
                println!("  Name: {}", style(&config.name).bold());
                println!("  Stages: {}", style(config.stages.len()).cyan());
                println!("  Variables: {}", style(config.variables.len()).cyan());
                println!("  Execution order: {}", order.join(" -> "));
            }
            Ok(0)
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            Ok(1)
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<i32> {
    let store = open_store().await?;
    let pipelines = store.list_pipelines().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let runs = store.list_runs(pipeline).await?;
            json_data.push(serde_json::json!({
                "name": pipeline,
                "run_count": runs.len(),
                "passed": runs.iter().filter(|r| r.status == RunStatus::Passed).count(),
                "failed": runs.iter().filter(|r| r.status == RunStatus::Failed).count(),
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(0);
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline in &pipelines {
        if cmd.with_counts {
            let runs = store.list_runs(pipeline).await?;
            let passed = runs.iter().filter(|r| r.status == RunStatus::Passed).count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} passed, {} failed)",
                style(pipeline).bold(),
                style(runs.len()).cyan(),
                style(passed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline).bold());
        }
    }

    Ok(0)
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = open_store().await?;

    // A specific run was requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;

        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => {
                println!("{} Run not found", WARN);
                return Ok(1);
            }
        }
        return Ok(0);
    }

    let mut runs = if let Some(pipeline) = &cmd.pipeline {
        store.list_runs(pipeline).await?
    } else {
        let mut all = Vec::new();
        for pipeline in store.list_pipelines().await? {
            all.extend(store.list_runs(&pipeline).await?);
        }
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(0)
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    println!("  Finished: {}", style(summary.finished_at.to_rfc3339()).dim());
    if let Ok(duration) = summary
        .finished_at
        .signed_duration_since(summary.started_at)
        .to_std()
    {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    println!(
        "  Stages: {} passed, {} failed, {} skipped of {}",
        style(summary.passed_stages).green(),
        style(summary.failed_stages).red(),
        style(summary.skipped_stages).dim(),
        summary.total_stages
    );
    println!("  Failed steps: {}", summary.failed_steps);
}
