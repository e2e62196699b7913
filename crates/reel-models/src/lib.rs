//! Shared data models for the reel compilation service.
//!
//! This crate provides Serde-serializable types for:
//! - Compilation requests, segments and acquisition settings
//! - Overlay styling and output formats
//! - Task records and status responses
//! - Encoding configuration

pub mod encoding;
pub mod request;
pub mod style;
pub mod task;
pub mod text;

// Re-export common types
pub use encoding::EncodingConfig;
pub use request::{AcquisitionConfig, CompilationRequest, Segment, MAX_SEGMENTS};
pub use style::{FrameSize, OutputFormat, OverlayStyle, TextPlacement};
pub use task::{SubmitResponse, Task, TaskId, TaskStatus, TaskStatusResponse, TransitionError};
pub use text::{truncate_overlay, MAX_OVERLAY_CHARS};
