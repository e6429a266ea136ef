//! Shell action - runs a command line through `sh -c`

use crate::action::process::{self, DEFAULT_OUTPUT_LIMIT};
use crate::action::{Action, ActionError, ActionOutcome, ConditionPattern};
use crate::core::ActionContext;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// Action that executes a shell command
///
/// All text-driven branching (exit codes, output patterns) stays in here so the
/// executor never has to look at command output.
#[derive(Debug, Clone)]
pub struct ShellAction {
    /// Command line, may contain `{{ variable }}` placeholders
    command: String,

    /// Output that must appear on stdout for the action to pass
    success_pattern: Option<ConditionPattern>,

    /// Directory to run in, overrides the context's working directory
    working_dir: Option<PathBuf>,

    /// Shell binary
    shell: String,

    /// Bytes of stdout/stderr kept, per stream
    output_limit: usize,
}

impl ShellAction {
    /// Create a new shell action
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success_pattern: None,
            working_dir: None,
            shell: "sh".to_string(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn with_success_pattern(mut self, pattern: ConditionPattern) -> Self {
        self.success_pattern = Some(pattern);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Keep at most `bytes` of each output stream (the end of it)
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    fn build_command(&self, ctx: &ActionContext, rendered: &str) -> Command {
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(rendered);

        let dir = self.working_dir.as_ref().map(|dir| match &ctx.working_dir {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.clone(),
        });
        if let Some(dir) = dir.or_else(|| ctx.working_dir.clone()) {
            command.current_dir(dir);
        }

        process::apply_context(&mut command, ctx);
        command
    }
}

#[async_trait]
impl Action for ShellAction {
    fn describe(&self) -> String {
        format!("sh: {}", self.command)
    }

    async fn run(&self, ctx: &ActionContext) -> Result<ActionOutcome, ActionError> {
        let rendered = ctx.render(&self.command);
        let label = ctx.mask(&rendered);
        debug!("Spawning shell command: {}", label);

        let output = process::run(
            self.build_command(ctx, &rendered),
            &label,
            None,
            self.output_limit,
            ctx,
        )
        .await?;

        if !output.status.success() {
            warn!(
                "Command exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                label
            );
            return Ok(ActionOutcome::failure(output.failure_message()).with_output(output.stdout));
        }

        if let Some(pattern) = &self.success_pattern {
            if !pattern.matches(&output.stdout) {
                return Ok(ActionOutcome::failure(format!(
                    "output did not match expected pattern: {}",
                    pattern
                ))
                .with_output(output.stdout));
            }
        }

        debug!("Command returned {} bytes of output", output.stdout.len());
        Ok(ActionOutcome::success().with_output(output.stdout))
    }
}
