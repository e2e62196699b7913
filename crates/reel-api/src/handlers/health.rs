//! Health check handlers.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use reel_media::ProcessTool;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub running_tasks: usize,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub tools: CheckStatus,
    pub directories: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks that the external tools resolve and the working directories are writable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let config = state.executor.config();

    let missing: Vec<String> = [
        ("yt-dlp", config.ytdlp_path.as_deref()),
        ("ffmpeg", config.ffmpeg_path.as_deref()),
        ("ffprobe", config.ffprobe_path.as_deref()),
    ]
    .into_iter()
    .filter_map(|(name, explicit)| ProcessTool::locate(name, explicit).err())
    .map(|e| e.to_string())
    .collect();
    let tools = if missing.is_empty() {
        CheckStatus::ok()
    } else {
        CheckStatus::error(missing.join("; "))
    };

    let mut unwritable = Vec::new();
    for dir in config.writable_dirs() {
        if !is_writable_dir(dir).await {
            unwritable.push(dir.display().to_string());
        }
    }
    let directories = if unwritable.is_empty() {
        CheckStatus::ok()
    } else {
        CheckStatus::error(format!("not writable: {}", unwritable.join(", ")))
    };

    let all_ok = tools.is_ok() && directories.is_ok();
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks { tools, directories },
        running_tasks: state.executor.running(),
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn is_writable_dir(dir: &Path) -> bool {
    match tokio::fs::metadata(dir).await {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}
