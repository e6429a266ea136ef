//! CLI output formatting

use crate::{
    core::{AutofixOutcome, RunStatus, StageStatus, StepStatus},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Spinner shown while a run is in flight
pub fn create_spinner(stages: usize) -> ProgressBar {
    let spinner = ProgressBar::new(stages as u64);
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} stages {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Passed => style("PASSED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Passed => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Cancelled => WARN,
    };

    format!(
        "{} {} - {} - {} ({}/{} stages passed) - {}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.pipeline).bold(),
        format_status(summary.status),
        summary.passed_stages,
        summary.total_stages,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline,
            stages,
        } => format!(
            "{} Starting pipeline {} ({}, {} stages)",
            ROCKET,
            style(pipeline).bold(),
            style(short_id(run_id)).dim(),
            stages
        ),
        ExecutionEvent::StageStarted { stage } => {
            format!("{} Stage {}", SPINNER, style(stage).cyan().bold())
        }
        ExecutionEvent::StepStarted { stage, step } => {
            format!("  {} {}/{}", SPINNER, style(stage).dim(), style(step).cyan())
        }
        ExecutionEvent::AutofixFailed {
            stage,
            step,
            message,
        } => format!(
            "  {} auto-fix for {}/{} failed: {}",
            WARN,
            style(stage).dim(),
            style(step).yellow(),
            style(message).dim()
        ),
        ExecutionEvent::StepFinished { outcome } => {
            let fixed = match outcome.autofix {
                Some(AutofixOutcome::Applied) => " (auto-fixed)",
                _ => "",
            };
            let line = match outcome.status {
                StepStatus::Passed => format!("  {} {}{}", CHECK, style(&outcome.step).green(), fixed),
                StepStatus::FailedTolerated => {
                    format!("  {} {} (tolerated)", WARN, style(&outcome.step).yellow())
                }
                StepStatus::Failed => format!("  {} {}", CROSS, style(&outcome.step).red()),
            };
            match (&outcome.message, outcome.status) {
                (Some(message), StepStatus::Failed | StepStatus::FailedTolerated) => {
                    format!("{}: {}", line, style(format_output(message, 5)).dim())
                }
                _ => line,
            }
        }
        ExecutionEvent::StageFinished {
            stage,
            status,
            duration_ms,
        } => {
            let icon = match status {
                StageStatus::Passed => CHECK,
                StageStatus::FailedTolerated => WARN,
                StageStatus::Skipped => SKIP,
                _ => CROSS,
            };
            format!(
                "{} Stage {} {} {}",
                icon,
                style(stage).bold(),
                status,
                style(format!("({}ms)", duration_ms)).dim()
            )
        }
        ExecutionEvent::StageSkipped { stage, reason } => {
            format!("{} Stage {} skipped: {}", SKIP, style(stage).dim(), reason)
        }
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n... ({} more lines)",
            truncated,
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
