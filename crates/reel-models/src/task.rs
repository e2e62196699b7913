//! Task records and the boundary shapes derived from them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::request::CompilationRequest;

/// Unique task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse an externally supplied identifier.
    ///
    /// Only canonical UUIDs are accepted; the id ends up in file names.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim())
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Pipeline is running (or was, before a restart)
    #[default]
    Processing,
    /// Output is ready
    Completed,
    /// Task failed; see `error`
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected task mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task is already {0}")]
    Terminal(TaskStatus),
}

/// A compilation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: TaskId,

    pub status: TaskStatus,

    /// Progress percentage (0-100), never decreasing
    pub progress: u8,

    /// Current stage description
    pub message: String,

    /// Failure cause, set only when status is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Produced file name, set only when status is `completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,

    /// Request this task was created from
    pub request: CompilationRequest,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// New task in `processing` at progress 0.
    pub fn new(request: CompilationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            status: TaskStatus::Processing,
            progress: 0,
            message: "Task created".to_string(),
            error: None,
            output_ref: None,
            request,
            created_at: now,
            updated_at: now,
        }
    }

    fn ensure_active(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        Ok(())
    }

    /// Move progress forward. Values above 100 are clamped and values below
    /// the current progress leave it unchanged.
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Terminal failure. Progress stays where it was.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_active()?;
        let error = error.into();
        self.status = TaskStatus::Error;
        self.message = format!("Error: {}", error);
        self.error = Some(error);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Terminal success with the produced file.
    pub fn complete(&mut self, output_ref: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.message = "Video compilation completed!".to_string();
        self.output_ref = Some(output_ref.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Response to an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub message: String,
}

impl SubmitResponse {
    pub fn accepted(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status,
            message: "Video compilation started".to_string(),
        }
    }
}

/// Status snapshot returned to polling clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatusResponse {
    pub fn from_task(task: &Task, download_url: Option<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status,
            progress: task.progress,
            message: task.message.clone(),
            output_ref: task.output_ref.clone(),
            download_url: download_url.filter(|_| task.status == TaskStatus::Completed),
            error: task.error.clone(),
        }
    }
}
