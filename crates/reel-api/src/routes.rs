//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{download_video, generate_video, health, ready, task_status};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/generate-video", post(generate_video))
        .route("/status/:task_id", get(task_status))
        .route("/download/:task_id", get(download_video));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use reel_media::{ExternalTool, MediaError, MediaResult, ToolOutput};
    use reel_worker::{DisabledSummarizer, TaskExecutor, Toolset, WorkerConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Every invocation fails as if the source were gone.
    struct Unavailable;

    #[async_trait]
    impl ExternalTool for Unavailable {
        fn name(&self) -> &str {
            "yt-dlp"
        }

        async fn invoke(&self, _args: &[String], _timeout: Duration) -> MediaResult<ToolOutput> {
            Err(MediaError::tool_failed(
                "yt-dlp",
                "exit status: 1",
                Some("ERROR: Video unavailable".to_string()),
                Some(1),
            ))
        }
    }

    async fn app(root: &TempDir) -> (Router, TaskExecutor) {
        let config = WorkerConfig {
            work_dir: root.path().join("temp"),
            output_dir: root.path().join("output"),
            task_dir: root.path().join("tasks"),
            ..WorkerConfig::default()
        };
        let tool: Arc<dyn ExternalTool> = Arc::new(Unavailable);
        let tools = Toolset {
            ytdlp: tool.clone(),
            ffmpeg: tool.clone(),
            ffprobe: tool,
        };
        let executor = TaskExecutor::bootstrap(config, tools, Arc::new(DisabledSummarizer))
            .await
            .unwrap();
        let state = AppState::new(ApiConfig::default(), executor.clone());
        (create_router(state, None), executor)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_request() -> Value {
        json!({
            "segments": [
                {"url": "https://youtube.com/watch?v=aaaaaaaaaaa", "start_secs": 3, "text": "A"},
                {"url": "https://youtube.com/watch?v=bbbbbbbbbbb", "start_secs": 0, "keywords": "gold watch"}
            ],
            "format": "landscape"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let root = TempDir::new().unwrap();
        let (app, _) = app(&root).await;

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_submit_accepts_valid_request() {
        let root = TempDir::new().unwrap();
        let (app, executor) = app(&root).await;

        let response = app
            .oneshot(post_json("/api/v1/generate-video", valid_request()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = json_body(response).await;
        assert_eq!(body["status"], "processing");
        let id = reel_models::TaskId::parse(body["task_id"].as_str().unwrap()).unwrap();
        assert!(executor.store().get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_requests() {
        let root = TempDir::new().unwrap();
        let (app, _) = app(&root).await;

        let cases = [
            json!({"segments": []}),
            json!({"segments": [{"url": "https://youtube.com/watch?v=a", "start_secs": -1, "text": "A"}]}),
            json!({"segments": [{"url": "https://youtube.com/watch?v=a", "start_secs": 0}]}),
            json!({"segments": [{"url": "https://youtube.com/watch?v=a", "start_secs": 0, "text": "A"}], "style": {"font_size": 500}}),
            json!({"segments": [{"url": "https://youtube.com/watch?v=a", "start_secs": 0, "text": "A"}], "colour": "red"}),
        ];
        for case in cases {
            let response = app
                .clone()
                .oneshot(post_json("/api/v1/generate-video", case.clone()))
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::UNPROCESSABLE_ENTITY,
                "{}",
                case
            );
            assert!(json_body(response).await["detail"].is_string());
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_json() {
        let root = TempDir::new().unwrap();
        let (app, _) = app(&root).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/generate-video")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_unknown_task() {
        let root = TempDir::new().unwrap();
        let (app, _) = app(&root).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/status/{}", reel_models::TaskId::new())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["detail"], "Task not found");

        let response = app
            .oneshot(get("/api/v1/status/..%2Fetc%2Fpasswd"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_task_reports_error() {
        let root = TempDir::new().unwrap();
        let (app, executor) = app(&root).await;

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/generate-video", valid_request()))
            .await
            .unwrap();
        let task_id = json_body(response).await["task_id"]
            .as_str()
            .unwrap()
            .to_string();
        let id = reel_models::TaskId::parse(&task_id).unwrap();

        tokio::time::timeout(Duration::from_secs(10), async {
            while !executor.store().get(&id).await.unwrap().is_terminal() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/status/{}", task_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("Video unavailable"));
        assert!(body.get("download_url").is_none());

        let response = app
            .oneshot(get(&format!("/api/v1/download/{}", task_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_completed_task() {
        let root = TempDir::new().unwrap();
        let (app, executor) = app(&root).await;

        // A finished task written directly through the store.
        let task = executor
            .store()
            .create(serde_json::from_value(valid_request()).unwrap())
            .await
            .unwrap();
        let name = format!("compilation_{}.mp4", task.id);
        std::fs::write(root.path().join("output").join(&name), b"mp4 bytes").unwrap();
        executor.store().complete(&task.id, &name).await.unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/status/{}", task.id)))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["progress"], 100);
        assert_eq!(
            body["download_url"],
            format!("/api/v1/download/{}", task.id)
        );

        let response = app
            .oneshot(get(&format!("/api/v1/download/{}", task.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "video/mp4");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mp4 bytes");
    }
}
