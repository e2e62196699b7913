//! Progress checkpoints.
//!
//! Every percentage a task can report is defined in [`Checkpoint`]; segment
//! progress is spread proportionally below [`SEGMENTS_CEILING`].

use async_trait::async_trait;

use reel_media::{CompileObserver, CompileStage};

use crate::logging::TaskLogger;
use crate::store::TaskHandle;

/// Highest value reached while segments are being processed.
pub const SEGMENTS_CEILING: u8 = 70;

/// Fixed pipeline checkpoints, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Start,
    IntroReady,
    OutroReady,
    Concatenating,
    MixingAudio { has_music: bool },
    Done,
}

impl Checkpoint {
    pub fn percent(&self) -> u8 {
        match self {
            Checkpoint::Start => 0,
            Checkpoint::IntroReady => 75,
            Checkpoint::OutroReady => 77,
            Checkpoint::Concatenating => 80,
            Checkpoint::MixingAudio { .. } => 90,
            Checkpoint::Done => 100,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Checkpoint::Start => "Starting video processing...",
            Checkpoint::IntroReady => "Intro prepared",
            Checkpoint::OutroReady => "Outro prepared",
            Checkpoint::Concatenating => "Stitching clips together...",
            Checkpoint::MixingAudio { has_music: true } => "Adding background music...",
            Checkpoint::MixingAudio { has_music: false } => "Finalizing audio...",
            Checkpoint::Done => "Video compilation completed!",
        }
    }
}

/// Progress after `done` of `total` segments have been rendered.
pub fn segment_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return SEGMENTS_CEILING;
    }
    let done = done.min(total);
    ((SEGMENTS_CEILING as usize * done) / total) as u8
}

/// Pushes checkpoints for one task into the store.
///
/// Store failures are logged and swallowed: a missed progress update must
/// not abort a compilation that is otherwise healthy.
pub struct ProgressTracker {
    handle: TaskHandle,
    logger: TaskLogger,
}

impl ProgressTracker {
    pub fn new(handle: TaskHandle, logger: TaskLogger) -> Self {
        Self { handle, logger }
    }

    pub async fn checkpoint(&self, checkpoint: Checkpoint) {
        self.update(checkpoint.percent(), checkpoint.message()).await;
    }

    /// Segment `index` (0-based) of `total` is about to be processed.
    pub async fn segment_started(&self, index: usize, total: usize) {
        let message = format!("Processing clip {}/{}", index + 1, total);
        self.update(segment_progress(index, total), &message).await;
    }

    /// Segment `index` (0-based) of `total` has been rendered.
    pub async fn segment_done(&self, index: usize, total: usize) {
        let message = format!("Processed clip {}/{}", index + 1, total);
        self.update(segment_progress(index + 1, total), &message).await;
    }

    async fn update(&self, progress: u8, message: &str) {
        match self.handle.advance(progress, message).await {
            Ok(task) => self.logger.log_progress(task.progress, message),
            Err(e) => self
                .logger
                .log_warning(&format!("Failed to record progress {}: {}", progress, e)),
        }
    }
}

#[async_trait]
impl CompileObserver for ProgressTracker {
    async fn stage_started(&self, stage: CompileStage, has_music: bool) {
        match stage {
            CompileStage::Concatenating => self.checkpoint(Checkpoint::Concatenating).await,
            CompileStage::MixingAudio => {
                self.checkpoint(Checkpoint::MixingAudio { has_music }).await
            }
            CompileStage::Publishing => {}
        }
    }
}
