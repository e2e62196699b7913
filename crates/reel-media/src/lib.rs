//! External tool layer for clip compilation.
//!
//! This crate provides:
//! - The [`ExternalTool`] abstraction over yt-dlp, FFmpeg and FFprobe
//! - Type-safe FFmpeg command and filter building
//! - Segment acquisition with a primary/degraded retry ladder
//! - Overlay rendering and title cards
//! - Concatenation, background music mixing and publishing

pub mod command;
pub mod compile;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod render;
pub mod tool;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use compile::{
    output_file_name, CompileError, CompileObserver, CompilePlan, CompileStage, Compiler,
    NoopObserver,
};
pub use error::{
    AcquisitionError, AttemptKind, FailedAttempt, FailureClass, MediaError, MediaResult,
};
pub use fetch::{FetchSettings, FetchedSegment, SegmentFetcher};
pub use filters::FontSource;
pub use fs_utils::{move_file, resolve_within};
pub use probe::{VideoInfo, VideoProbe};
pub use render::{OverlayRenderer, RenderSettings};
pub use tool::{ExternalTool, ProcessTool, ToolOutput};
