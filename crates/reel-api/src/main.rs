//! Axum API server binary.

use std::net::SocketAddr;

use tracing::{error, info, warn};

use reel_api::{create_router, install_crypto_provider, metrics, ApiConfig, AppState};
use reel_worker::{init_tracing, summarizer_from_config, TaskExecutor, Toolset, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting reel-api");

    if !install_crypto_provider() {
        warn!("rustls crypto provider was already installed");
    }

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!("Worker config: {:?}", worker_config);

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let tools = match Toolset::locate(&worker_config) {
        Ok(tools) => tools,
        Err(e) => {
            error!("Required tool missing: {}", e);
            std::process::exit(1);
        }
    };
    let summarizer = summarizer_from_config(&worker_config.summarizer);

    let executor = match TaskExecutor::bootstrap(worker_config, tools, summarizer).await {
        Ok(executor) => executor,
        Err(e) => {
            error!("Failed to start task executor: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(AppState::new(config.clone(), executor), metrics_handle);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address: {}", e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
