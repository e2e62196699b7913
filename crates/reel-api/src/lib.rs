//! Axum HTTP API server.
//!
//! This crate provides:
//! - Compilation submission with request validation
//! - Task status polling and compiled video download
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

/// Install the ring crypto provider for rustls 0.23+.
///
/// Returns `false` when a provider was already installed for the process.
pub fn install_crypto_provider() -> bool {
    rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_provider_installs_once() {
        let _ = install_crypto_provider();
        assert!(!install_crypto_provider());
    }
}
