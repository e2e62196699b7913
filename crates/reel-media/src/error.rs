//! Error types for media operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving the external tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{tool} failed: {message}")]
    ToolFailed {
        tool: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a tool failure error.
    pub fn tool_failed(
        tool: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn timeout(tool: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            tool: tool.into(),
            secs,
        }
    }

    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Most useful diagnostic text: the last meaningful stderr line for tool
    /// failures, the display form otherwise.
    pub fn diagnostic(&self) -> String {
        match self {
            MediaError::ToolFailed {
                stderr: Some(stderr),
                ..
            } => last_meaningful_line(stderr)
                .map(str::to_string)
                .unwrap_or_else(|| self.to_string()),
            _ => self.to_string(),
        }
    }
}

/// Last non-empty stderr line, preferring lines that mention an error.
pub fn last_meaningful_line(stderr: &str) -> Option<&str> {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines
        .iter()
        .rev()
        .find(|l| l.to_ascii_lowercase().contains("error"))
        .or_else(|| lines.last())
        .copied()
}

/// Which rung of the acquisition ladder an attempt was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// Credentials and strict transport verification
    Primary,
    /// Relaxed transport verification
    Degraded,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptKind::Primary => "primary",
            AttemptKind::Degraded => "degraded",
        }
    }
}

impl fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of an acquisition failure, derived from tool diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// TLS, certificate, timeout, connection problems
    Transport,
    /// Sign-in, cookies, 403/429
    Authentication,
    /// Age or region restricted
    Restricted,
    /// Private, removed or otherwise unavailable
    Unavailable,
    Other,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Transport => "transport",
            FailureClass::Authentication => "authentication",
            FailureClass::Restricted => "restricted",
            FailureClass::Unavailable => "unavailable",
            FailureClass::Other => "other",
        }
    }
}

/// One failed acquisition attempt.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub kind: AttemptKind,
    pub class: FailureClass,
    pub diagnostic: String,
}

/// Segment acquisition failed after the retry ladder was exhausted.
#[derive(Debug, Clone, Error)]
#[error("segment {} could not be downloaded ({})", .segment + 1, describe_attempts(.attempts))]
pub struct AcquisitionError {
    /// Zero-based segment index
    pub segment: usize,
    pub attempts: Vec<FailedAttempt>,
}

impl AcquisitionError {
    pub fn new(segment: usize, attempts: Vec<FailedAttempt>) -> Self {
        Self { segment, attempts }
    }

    /// Class of the last failed attempt.
    pub fn last_class(&self) -> Option<FailureClass> {
        self.attempts.last().map(|a| a.class)
    }
}

fn describe_attempts(attempts: &[FailedAttempt]) -> String {
    if attempts.is_empty() {
        return "no attempts made".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{} attempt: {}", a.kind, a.diagnostic))
        .collect::<Vec<_>>()
        .join("; ")
}
