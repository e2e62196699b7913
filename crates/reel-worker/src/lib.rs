//! Compilation worker.
//!
//! This crate provides:
//! - The durable task store and per-task update handles
//! - Progress checkpoints
//! - Overlay text resolution with a local fallback
//! - The compilation pipeline and the background task executor

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod store;
pub mod summary;
pub mod workspace;

pub use config::{SummarizerConfig, WorkerConfig};
pub use error::{StoreError, StoreResult, WorkerError, WorkerResult};
pub use executor::TaskExecutor;
pub use logging::{init_tracing, TaskLogger};
pub use pipeline::{CompilationPipeline, Toolset};
pub use progress::{Checkpoint, ProgressTracker};
pub use store::{TaskHandle, TaskStore, INTERRUPTED_MESSAGE};
pub use summary::{summarizer_from_config, DisabledSummarizer, Summarizer, SummaryResolver};
