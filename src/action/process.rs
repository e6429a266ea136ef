//! Child processes for subprocess-backed actions
//!
//! Every child runs in its own process group. If the action future is
//! dropped before the child was waited on (a timeout, a cancelled task) the
//! whole group is killed, so nothing a command started keeps running into
//! the next phase or step.

use crate::action::ActionError;
use crate::core::ActionContext;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::debug;

/// Default cap on captured bytes per output stream
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

/// Lines of stderr/stdout kept in a failure message
const MESSAGE_TAIL_LINES: usize = 5;

const READ_CHUNK: usize = 8 * 1024;

/// Output of a finished child, masked and bounded
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// `exited with code N: <tail>` for a failed child
    pub fn failure_message(&self) -> String {
        let exit_code = self.status.code().unwrap_or(-1);
        let detail = tail(if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        });
        if detail.is_empty() {
            format!("exited with code {}", exit_code)
        } else {
            format!("exited with code {}: {}", exit_code, detail)
        }
    }
}

/// Export the context to a child's environment
pub fn apply_context(command: &mut Command, ctx: &ActionContext) {
    command.envs(&ctx.variables);
    command.envs(ctx.secrets());
    command.env("STAGERUN_RUN_ID", ctx.run_id.to_string());
    command.env("STAGERUN_PIPELINE", &ctx.pipeline);
    command.env("STAGERUN_PHASE", ctx.phase.to_string());
    if let Some(stage) = &ctx.stage {
        command.env("STAGERUN_STAGE", stage);
    }
    if let Some(step) = &ctx.step {
        command.env("STAGERUN_STEP", step);
    }
}

/// Spawn `command`, feed it `input`, and collect its output
///
/// Each stream keeps at most `output_limit` bytes (the tail); dropped bytes
/// are noted in a leading marker line. Secrets are masked before returning.
pub async fn run(
    mut command: Command,
    label: &str,
    input: Option<String>,
    output_limit: usize,
    ctx: &ActionContext,
) -> Result<ProcessOutput, ActionError> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = GroupedChild::spawn(&mut command, label)?;
    let stdin = child.child.stdin.take();
    let stdout = child.child.stdout.take();
    let stderr = child.child.stderr.take();

    let feed = async move {
        if let (Some(mut pipe), Some(text)) = (stdin, input) {
            // A child that exits without reading its input is not an error.
            if let Err(e) = pipe.write_all(text.as_bytes()).await {
                debug!("Child closed stdin early: {}", e);
            }
        }
        Ok::<(), std::io::Error>(())
    };

    let (status, stdout, stderr, ()) = tokio::try_join!(
        child.child.wait(),
        read_bounded(stdout, output_limit),
        read_bounded(stderr, output_limit),
        feed,
    )?;
    child.reaped = true;

    Ok(ProcessOutput {
        status,
        stdout: ctx.mask(&stdout),
        stderr: ctx.mask(&stderr),
    })
}

/// A child in its own process group, killed as a group unless reaped
struct GroupedChild {
    child: Child,
    pgid: Option<u32>,
    reaped: bool,
}

impl GroupedChild {
    fn spawn(command: &mut Command, label: &str) -> Result<Self, ActionError> {
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ActionError::Spawn {
                command: label.to_string(),
                source,
            })?;
        let pgid = child.id();

        Ok(Self {
            child,
            pgid,
            reaped: false,
        })
    }
}

impl Drop for GroupedChild {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Some(pgid) = self.pgid {
            debug!("Killing process group {}", pgid);
            kill_group(pgid);
        }
        // The leader is reaped here if it is already gone, otherwise by the
        // runtime once `kill_on_drop` has taken it down.
        let _ = self.child.start_kill();
        let _ = self.child.try_wait();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg only sends a signal. The group id cannot have been
    // recycled since the leader has not been reaped yet.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Read a stream to the end, keeping only its last `limit` bytes
async fn read_bounded<R>(pipe: Option<R>, limit: usize) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(String::new());
    };

    let mut kept: Vec<u8> = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        kept.extend_from_slice(&chunk[..n]);
        // Trim in batches, not on every chunk.
        if kept.len() > limit.saturating_mul(2).max(READ_CHUNK) {
            let excess = kept.len() - limit;
            kept.drain(..excess);
            dropped += excess;
        }
    }

    if kept.len() > limit {
        let excess = kept.len() - limit;
        kept.drain(..excess);
        dropped += excess;
    }

    let text = String::from_utf8_lossy(&kept).into_owned();
    if dropped > 0 {
        Ok(format!("[... {} bytes truncated]\n{}", dropped, text))
    } else {
        Ok(text)
    }
}

/// Last few non-empty lines of `text`
fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(MESSAGE_TAIL_LINES);
    lines[start..].join("\n")
}
