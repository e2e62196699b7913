//! Compilation submission, status and download handlers.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::Json;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;
use validator::Validate;

use reel_models::{CompilationRequest, SubmitResponse, TaskId, TaskStatus, TaskStatusResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Download route for a task, as exposed in status responses.
pub fn download_path(task_id: &TaskId) -> String {
    format!("/api/v1/download/{}", task_id)
}

fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    TaskId::parse(raw).ok_or_else(|| ApiError::not_found("Task not found"))
}

/// Validate and accept a compilation request.
pub async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<CompilationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload.map_err(|rejection| match rejection {
        JsonRejection::JsonDataError(e) => ApiError::validation(e.body_text()),
        other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
        other => ApiError::bad_request(other.body_text()),
    })?;
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let task = state.executor.submit(request).await?;
    info!(
        task_id = %task.id,
        segments = task.request.segments.len(),
        format = %task.request.format,
        "Compilation submitted"
    );

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::accepted(&task))))
}

/// Current status of a task.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let id = parse_task_id(&task_id)?;
    let task = state.executor.store().get(&id).await?;
    Ok(Json(TaskStatusResponse::from_task(
        &task,
        Some(download_path(&task.id)),
    )))
}

/// Stream the compiled video of a completed task.
pub async fn download_video(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let id = parse_task_id(&task_id)?;
    let task = state.executor.store().get(&id).await?;

    let output_ref = match (task.status, task.output_ref.as_deref()) {
        (TaskStatus::Completed, Some(output_ref)) => output_ref,
        _ => return Err(ApiError::not_found("Video is not ready")),
    };
    let path = state.executor.config().output_dir.join(output_ref);
    if !path.is_file() {
        return Err(ApiError::not_found("Video file not found"));
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", output_ref)) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
