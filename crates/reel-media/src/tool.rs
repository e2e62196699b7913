//! External tool abstraction.
//!
//! Every yt-dlp, FFmpeg and FFprobe invocation goes through [`ExternalTool`],
//! so fetch, render and compile logic only builds argument lists.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{last_meaningful_line, MediaError, MediaResult};

/// Maximum stderr retained on failures.
const STDERR_TAIL_BYTES: usize = 4096;

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A command-line tool invoked with arguments and a hard timeout.
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Short tool name used in logs and errors.
    fn name(&self) -> &str;

    /// Run the tool. Non-zero exit maps to [`MediaError::ToolFailed`], an
    /// elapsed timeout to [`MediaError::Timeout`] after the process is killed.
    async fn invoke(&self, args: &[String], timeout: Duration) -> MediaResult<ToolOutput>;
}

/// [`ExternalTool`] backed by a child process.
#[derive(Debug, Clone)]
pub struct ProcessTool {
    name: String,
    program: PathBuf,
}

impl ProcessTool {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    /// Locate a tool by explicit path or on PATH.
    pub fn locate(name: &str, explicit: Option<&str>) -> MediaResult<Self> {
        let program = match explicit {
            Some(path) if !path.trim().is_empty() => which::which(path.trim()),
            _ => which::which(name),
        }
        .map_err(|_| MediaError::ToolNotFound(name.to_string()))?;
        Ok(Self::new(name, program))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ExternalTool for ProcessTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, args: &[String], timeout: Duration) -> MediaResult<ToolOutput> {
        debug!(tool = %self.name, "Running: {} {}", self.program.display(), args.join(" "));
        let started = Instant::now();

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::ToolNotFound(self.name.clone()),
                _ => MediaError::Io(e),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    tool = %self.name,
                    timeout_secs = timeout.as_secs(),
                    "Tool timed out, killing process"
                );
                record_invocation(&self.name, "timeout", started);
                return Err(MediaError::timeout(&self.name, timeout.as_secs()));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            record_invocation(&self.name, "error", started);
            let message = last_meaningful_line(&stderr)
                .map(str::to_string)
                .unwrap_or_else(|| format!("exited with status {}", output.status));
            return Err(MediaError::tool_failed(
                &self.name,
                message,
                Some(tail(&stderr, STDERR_TAIL_BYTES)),
                output.status.code(),
            ));
        }

        record_invocation(&self.name, "success", started);
        Ok(ToolOutput { stdout, stderr })
    }
}

fn record_invocation(tool: &str, outcome: &'static str, started: Instant) {
    metrics::histogram!(
        "reel_tool_duration_seconds",
        "tool" => tool.to_string(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
