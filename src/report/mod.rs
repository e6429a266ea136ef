//! Rendering of run reports

use crate::core::{AutofixOutcome, RunReport, RunStatus, StageStatus, StepStatus};
use anyhow::{Context, Result};
use console::{Emoji, Style};
use std::io::Write;

static PASS: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
static FAIL: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
static TOLERATED: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Renders a [`RunReport`] to a writer
pub trait Reporter {
    fn report(&self, report: &RunReport, out: &mut dyn Write) -> Result<()>;
}

/// Human-readable report: one line per stage and step, then a summary
#[derive(Debug, Clone)]
pub struct TextReporter {
    styled: bool,
}

impl TextReporter {
    /// Styling follows the terminal's capabilities
    pub fn new() -> Self {
        Self {
            styled: console::colors_enabled(),
        }
    }

    /// No colors or emoji, for logs and tests
    pub fn plain() -> Self {
        Self { styled: false }
    }

    fn paint(&self, text: impl std::fmt::Display, style: Style) -> String {
        if self.styled {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn icon(&self, emoji: &Emoji<'_, '_>) -> String {
        if self.styled {
            emoji.to_string()
        } else {
            emoji.1.to_string()
        }
    }

    fn stage_icon(&self, status: StageStatus) -> String {
        match status {
            StageStatus::Passed => self.icon(&PASS),
            StageStatus::FailedTolerated => self.icon(&TOLERATED),
            StageStatus::Failed => self.icon(&FAIL),
            _ => self.icon(&SKIP),
        }
    }

    fn step_icon(&self, status: StepStatus) -> String {
        match status {
            StepStatus::Passed => self.icon(&PASS),
            StepStatus::FailedTolerated => self.icon(&TOLERATED),
            StepStatus::Failed => self.icon(&FAIL),
        }
    }

    fn rule(&self) -> String {
        let width = term_size::dimensions_stdout()
            .map(|(w, _)| w)
            .unwrap_or(60)
            .min(80);
        self.paint("─".repeat(width), Style::new().dim())
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TextReporter {
    fn report(&self, report: &RunReport, out: &mut dyn Write) -> Result<()> {
        writeln!(
            out,
            "{} {}",
            self.paint(report.pipeline(), Style::new().bold()),
            self.paint(format!("({})", report.run_id()), Style::new().dim())
        )?;
        writeln!(out, "{}", self.rule())?;

        for stage in report.stages() {
            let mut line = format!(
                "{}{} {}",
                self.stage_icon(stage.status),
                self.paint(&stage.name, Style::new().bold()),
                self.paint(format!("[{}]", stage.status), Style::new().dim())
            );
            if let Some(reason) = &stage.reason {
                line.push_str(&format!(" - {}", reason));
            }
            writeln!(out, "{}", line)?;

            for step in report.steps_of(&stage.name) {
                let mut line = format!(
                    "    {}{} {}",
                    self.step_icon(step.status),
                    step.step,
                    self.paint(format!("({}ms)", step.duration_ms), Style::new().dim())
                );
                if let Some(message) = &step.message {
                    line.push_str(&format!(": {}", message));
                }
                writeln!(out, "{}", line)?;

                if let Some(AutofixOutcome::Failed { message }) = &step.autofix {
                    writeln!(
                        out,
                        "      {}",
                        self.paint(format!("auto-fix failed: {}", message), Style::new().yellow())
                    )?;
                }
            }
        }

        writeln!(out, "{}", self.rule())?;

        let status = match report.status() {
            RunStatus::Passed => self.paint("PASSED", Style::new().green().bold()),
            RunStatus::Failed => self.paint("FAILED", Style::new().red().bold()),
            RunStatus::Cancelled => self.paint("CANCELLED", Style::new().yellow().bold()),
        };
        writeln!(
            out,
            "{} - stages: {} passed, {} tolerated, {} failed, {} skipped - {}ms",
            status,
            report.count_stages(StageStatus::Passed),
            report.count_stages(StageStatus::FailedTolerated),
            report.count_stages(StageStatus::Failed),
            report.count_stages(StageStatus::Skipped),
            report.duration_ms()
        )?;

        Ok(())
    }
}

/// Pretty-printed JSON of the whole report
#[derive(Debug, Clone, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, report: &RunReport, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, report).context("Failed to serialize report")?;
        writeln!(out)?;
        Ok(())
    }
}
