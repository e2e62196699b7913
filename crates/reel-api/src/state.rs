//! Application state.

use reel_worker::TaskExecutor;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub executor: TaskExecutor,
}

impl AppState {
    pub fn new(config: ApiConfig, executor: TaskExecutor) -> Self {
        Self { config, executor }
    }
}
