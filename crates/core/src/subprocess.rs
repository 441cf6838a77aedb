//! Cancellable subprocess execution for the external media tools.
//!
//! [`run_tool`] spawns a prepared [`tokio::process::Command`], captures
//! stdout/stderr, and kills the child if the run is cancelled.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::media::MediaError;

/// Maximum stdout or stderr size captured per stream (1 MiB).
///
/// ffmpeg progress output on long clips can be large; only the head is
/// needed for error reporting.
const MAX_OUTPUT_BYTES: u64 = 1024 * 1024;

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit code (`None` if killed by a signal).
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Spawn `cmd`, wait for it to exit, and capture its output.
///
/// A missing binary maps to [`MediaError::Unavailable`]. If `cancel` fires
/// first the child is killed (via `kill_on_drop`) and
/// [`MediaError::Cancelled`] is returned. A non-zero exit is *not* an error
/// here; callers inspect [`ToolOutput::success`].
pub async fn run_tool(cmd: &mut Command, cancel: &CancellationToken) -> Result<ToolOutput, MediaError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::Unavailable {
                tool: program.clone(),
                reason: e.to_string(),
            }
        } else {
            MediaError::Io(e)
        }
    })?;

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!(tool = %program, "Cancelling media tool");
            // Dropping `child` kills the process.
            return Err(MediaError::Cancelled);
        }
        status = child.wait() => status?,
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(ToolOutput {
        exit_code: status.code(),
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h).take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}
