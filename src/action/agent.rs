//! Agent action - hands a prompt to an external coding agent CLI
//!
//! The agent is any program that reads a prompt on stdin and edits the
//! working tree itself (an LLM CLI in print mode, a codemod driver). The
//! prompt is the rendered template followed by bounded excerpts of the
//! context files.

use crate::action::process::{self, DEFAULT_OUTPUT_LIMIT};
use crate::action::{Action, ActionError, ActionOutcome, ConditionPattern};
use crate::core::ActionContext;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Bounds on the file context appended to a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    /// Files beyond this count are ignored
    pub max_files: usize,

    /// Characters kept from the start of each file
    pub max_file_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_file_chars: 3000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentAction {
    /// Agent executable
    program: String,

    /// Arguments, may contain `{{ variable }}` placeholders
    args: Vec<String>,

    /// Prompt template
    prompt: String,

    /// Files whose contents are appended to the prompt
    context_files: Vec<String>,

    limits: ContextLimits,

    /// Output that must appear on stdout for the action to pass
    success_pattern: Option<ConditionPattern>,

    output_limit: usize,
}

impl AgentAction {
    pub fn new(program: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            prompt: prompt.into(),
            context_files: Vec::new(),
            limits: ContextLimits::default(),
            success_pattern: None,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context_file(mut self, path: impl Into<String>) -> Self {
        self.context_files.push(path.into());
        self
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_success_pattern(mut self, pattern: ConditionPattern) -> Self {
        self.success_pattern = Some(pattern);
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    /// The full prompt sent to the agent
    pub async fn build_prompt(&self, ctx: &ActionContext) -> String {
        let mut prompt = ctx.render(&self.prompt);

        for file in self.context_files.iter().take(self.limits.max_files) {
            let path = resolve(ctx, file);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping context file {}: {}", path.display(), e);
                    continue;
                }
            };

            prompt.push_str(&format!("\n\n--- {} ---\n", file));
            match content.char_indices().nth(self.limits.max_file_chars) {
                Some((cut, _)) => {
                    prompt.push_str(&content[..cut]);
                    prompt.push_str("\n[... truncated]");
                }
                None => prompt.push_str(&content),
            }
        }

        if self.context_files.len() > self.limits.max_files {
            debug!(
                "Agent context limited to {} of {} files",
                self.limits.max_files,
                self.context_files.len()
            );
        }

        prompt
    }
}

fn resolve(ctx: &ActionContext, file: &str) -> std::path::PathBuf {
    let path = Path::new(file);
    match &ctx.working_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

#[async_trait]
impl Action for AgentAction {
    fn describe(&self) -> String {
        format!("agent: {}", self.program)
    }

    async fn run(&self, ctx: &ActionContext) -> Result<ActionOutcome, ActionError> {
        let prompt = self.build_prompt(ctx).await;
        debug!(
            "Spawning agent {} with prompt length: {}",
            self.program,
            prompt.len()
        );

        let mut command = Command::new(&self.program);
        command.args(self.args.iter().map(|arg| ctx.render(arg)));
        if let Some(dir) = &ctx.working_dir {
            command.current_dir(dir);
        }
        process::apply_context(&mut command, ctx);

        let output = process::run(command, &self.program, Some(prompt), self.output_limit, ctx).await?;

        if !output.status.success() {
            let message = format!("{} {}", self.program, output.failure_message());
            warn!("Agent failed: {}", message);
            return Ok(ActionOutcome::failure(message).with_output(output.stdout));
        }

        if let Some(pattern) = &self.success_pattern {
            if !pattern.matches(&output.stdout) {
                return Ok(ActionOutcome::failure(format!(
                    "agent output did not match expected pattern: {}",
                    pattern
                ))
                .with_output(output.stdout));
            }
        }

        debug!("Agent returned {} bytes of output", output.stdout.len());
        Ok(ActionOutcome::success().with_output(output.stdout))
    }
}
