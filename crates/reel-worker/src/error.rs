//! Worker error types.

use thiserror::Error;

use reel_media::{AcquisitionError, CompileError, CompileStage, MediaError};
use reel_models::{TaskId, TaskStatus};

pub type WorkerResult<T> = Result<T, WorkerError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Task store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task {id} is already {status}")]
    Terminal { id: TaskId, status: TaskStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Rendering {target} failed: {source}")]
    Render {
        target: String,
        #[source]
        source: MediaError,
    },

    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn render(target: impl Into<String>, source: MediaError) -> Self {
        Self::Render {
            target: target.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Pipeline stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::Acquisition(_) => "acquisition",
            WorkerError::Render { .. } => "render",
            WorkerError::Compile(e) => e.stage.as_str(),
            WorkerError::Store(_) => "store",
            WorkerError::Config(_) => "config",
            WorkerError::Media(_) | WorkerError::Io(_) => "internal",
        }
    }

    /// Human-readable task error: the failing stage and the tool diagnostic,
    /// with filesystem paths reduced to file names.
    pub fn user_message(&self) -> String {
        let message = match self {
            WorkerError::Acquisition(e) => format!("Failed to download clip: {}", e),
            WorkerError::Render { target, source } => {
                format!("Failed to render {}: {}", target, source.diagnostic())
            }
            WorkerError::Compile(e) => match (e.stage, &e.source) {
                (CompileStage::MixingAudio, MediaError::FileNotFound(path)) => format!(
                    "Background music not found: {}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                ),
                (CompileStage::MixingAudio, MediaError::InvalidInput(reason)) => {
                    format!("Invalid background music reference: {}", reason)
                }
                (CompileStage::Concatenating, source) => {
                    format!("Failed to stitch clips together: {}", source.diagnostic())
                }
                (CompileStage::MixingAudio, source) => {
                    format!("Failed to add background music: {}", source.diagnostic())
                }
                (CompileStage::Publishing, source) => {
                    format!("Failed to produce the final video: {}", source.diagnostic())
                }
            },
            WorkerError::Store(_)
            | WorkerError::Config(_)
            | WorkerError::Media(_)
            | WorkerError::Io(_) => "Internal error while processing the video".to_string(),
        };
        strip_paths(&message)
    }
}

/// Replace absolute or relative paths in `text` with their final component.
pub fn strip_paths(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let trimmed = word.trim_matches(|c| matches!(c, '\'' | '"' | '(' | ')' | ',' | ';'));
            if trimmed.contains('/') && !trimmed.contains("://") {
                let last = trimmed.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
                word.replacen(trimmed, last, 1)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
