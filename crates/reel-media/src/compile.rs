//! Final compilation: concatenation, background music and publishing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use reel_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{concat_list_entry, music_mix, DEFAULT_MUSIC_VOLUME};
use crate::fs_utils::{move_file, remove_if_exists, staging_path};
use crate::probe::{VideoInfo, VideoProbe};

/// Compilation stages. Observers are told about the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    Concatenating,
    /// Reported even without background music
    MixingAudio,
    Publishing,
}

impl CompileStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileStage::Concatenating => "concatenate",
            CompileStage::MixingAudio => "mix_audio",
            CompileStage::Publishing => "publish",
        }
    }
}

/// Receives stage notifications before each stage starts.
#[async_trait]
pub trait CompileObserver: Send + Sync {
    async fn stage_started(&self, stage: CompileStage, has_music: bool);
}

/// Observer that ignores every notification.
pub struct NoopObserver;

#[async_trait]
impl CompileObserver for NoopObserver {
    async fn stage_started(&self, _stage: CompileStage, _has_music: bool) {}
}

/// Everything one compilation consumes.
#[derive(Debug, Clone)]
pub struct CompilePlan {
    pub intro: PathBuf,
    /// Rendered segments in input order
    pub segments: Vec<PathBuf>,
    pub outro: PathBuf,
    /// Resolved background music file
    pub music: Option<PathBuf>,
    /// Scratch directory for intermediate files
    pub work_dir: PathBuf,
    /// Published output path
    pub output: PathBuf,
}

impl CompilePlan {
    /// Concat order: intro, segments in input order, outro.
    pub fn pieces(&self) -> Vec<&Path> {
        std::iter::once(self.intro.as_path())
            .chain(self.segments.iter().map(PathBuf::as_path))
            .chain(std::iter::once(self.outro.as_path()))
            .collect()
    }
}

/// A stage of compilation failed.
#[derive(Debug, thiserror::Error)]
#[error("{} failed: {source}", .stage.as_str())]
pub struct CompileError {
    pub stage: CompileStage,
    #[source]
    pub source: MediaError,
}

impl CompileError {
    fn at(stage: CompileStage) -> impl FnOnce(MediaError) -> Self {
        move |source| Self { stage, source }
    }
}

/// Joins rendered pieces, mixes music and publishes the result.
#[derive(Clone)]
pub struct Compiler {
    ffmpeg: FfmpegRunner,
    probe: VideoProbe,
    encoding: EncodingConfig,
    music_volume: f32,
}

impl Compiler {
    pub fn new(ffmpeg: FfmpegRunner, probe: VideoProbe, encoding: EncodingConfig) -> Self {
        Self {
            ffmpeg,
            probe,
            encoding,
            music_volume: DEFAULT_MUSIC_VOLUME,
        }
    }

    pub fn with_music_volume(mut self, volume: f32) -> Self {
        self.music_volume = volume;
        self
    }

    /// Run the whole compilation and publish to `plan.output`.
    pub async fn compile(
        &self,
        plan: &CompilePlan,
        observer: &dyn CompileObserver,
    ) -> Result<VideoInfo, CompileError> {
        let has_music = plan.music.is_some();

        observer
            .stage_started(CompileStage::Concatenating, has_music)
            .await;
        let joined = plan.work_dir.join("joined.mp4");
        self.concatenate(&plan.pieces(), &plan.work_dir, &joined)
            .await
            .map_err(CompileError::at(CompileStage::Concatenating))?;

        observer
            .stage_started(CompileStage::MixingAudio, has_music)
            .await;
        let final_file = match &plan.music {
            Some(music) => {
                let mixed = plan.work_dir.join("mixed.mp4");
                self.mix_background(&joined, music, &mixed)
                    .await
                    .map_err(CompileError::at(CompileStage::MixingAudio))?;
                mixed
            }
            None => joined,
        };

        self.publish(&final_file, &plan.output)
            .await
            .map_err(CompileError::at(CompileStage::Publishing))
    }

    /// Concatenate `pieces` in order with the concat demuxer.
    ///
    /// List entries are written as absolute paths: the demuxer resolves
    /// relative entries against the list file's directory, not the working
    /// directory.
    pub async fn concatenate(
        &self,
        pieces: &[&Path],
        work_dir: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        if pieces.is_empty() {
            return Err(MediaError::invalid_input("nothing to concatenate"));
        }
        for piece in pieces {
            if !piece.is_file() {
                return Err(MediaError::FileNotFound(piece.to_path_buf()));
            }
        }

        let mut entries = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let absolute = fs::canonicalize(piece).await?;
            entries.push(concat_list_entry(&absolute));
        }
        let mut body = entries.join("\n");
        body.push('\n');

        let list = work_dir.join("concat.txt");
        fs::write(&list, body).await?;

        let cmd = FfmpegCommand::new(output)
            .input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
            .input(&list)
            .output_args(["-c", "copy", "-movflags", "+faststart"]);

        self.ffmpeg.run(&cmd).await?;
        info!(pieces = pieces.len(), "Concatenated pieces");
        Ok(())
    }

    /// Mix `music` under the audio of `video`. Shorter music loops, longer
    /// music is cut at the end of the video.
    pub async fn mix_background(&self, video: &Path, music: &Path, output: &Path) -> MediaResult<()> {
        if !music.is_file() {
            return Err(MediaError::FileNotFound(music.to_path_buf()));
        }

        let cmd = FfmpegCommand::new(output)
            .input(video)
            .input_arg("-stream_loop")
            .input_arg("-1")
            .input(music)
            .filter_complex(music_mix(self.music_volume))
            .map("0:v")
            .map("[aout]")
            .video_codec("copy")
            .audio_codec(self.encoding.audio_codec.clone())
            .audio_bitrate(self.encoding.audio_bitrate.clone())
            .output_args(["-movflags", "+faststart"]);

        self.ffmpeg.run(&cmd).await?;
        info!("Mixed background music");
        Ok(())
    }

    /// Move `file` next to `output`, confirm it is a playable video, then
    /// rename it into place. `output` never holds an unverified file.
    pub async fn publish(&self, file: &Path, output: &Path) -> MediaResult<VideoInfo> {
        let staging = staging_path(output);
        move_file(file, &staging).await?;

        let info = match self.probe.probe(&staging).await {
            Ok(info) if info.duration > 0.0 => info,
            Ok(_) => {
                remove_if_exists(&staging).await?;
                return Err(MediaError::invalid_video("compiled video has no duration"));
            }
            Err(e) => {
                remove_if_exists(&staging).await?;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&staging, output).await {
            remove_if_exists(&staging).await?;
            return Err(e.into());
        }

        info!(
            output = %output.display(),
            duration = info.duration,
            "Published compilation"
        );
        Ok(info)
    }
}

/// Deterministic output file name for a task.
pub fn output_file_name(task_id: &str) -> String {
    format!("compilation_{}.mp4", task_id)
}
