//! The compilation pipeline.
//!
//! One run per task: segments are fetched, captioned and rendered strictly
//! in input order, then intro and outro cards are rendered and the compiler
//! joins everything. The first failing stage aborts the task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use reel_media::{
    output_file_name, resolve_within, CompileError, CompilePlan, CompileStage, Compiler,
    ExternalTool, FetchSettings, FfmpegRunner, OverlayRenderer, ProcessTool, RenderSettings,
    SegmentFetcher, VideoProbe,
};
use reel_models::{
    truncate_overlay, AcquisitionConfig, CompilationRequest, EncodingConfig, FrameSize, Segment,
    Task,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::metrics;
use crate::progress::{Checkpoint, ProgressTracker};
use crate::store::TaskHandle;
use crate::summary::{Summarizer, SummaryResolver};
use crate::workspace::TaskWorkspace;

/// The external programs the pipeline drives.
#[derive(Clone)]
pub struct Toolset {
    pub ytdlp: Arc<dyn ExternalTool>,
    pub ffmpeg: Arc<dyn ExternalTool>,
    pub ffprobe: Arc<dyn ExternalTool>,
}

impl Toolset {
    /// Locate yt-dlp, FFmpeg and FFprobe from configured paths or PATH.
    pub fn locate(config: &WorkerConfig) -> WorkerResult<Self> {
        Ok(Self {
            ytdlp: Arc::new(ProcessTool::locate("yt-dlp", config.ytdlp_path.as_deref())?),
            ffmpeg: Arc::new(ProcessTool::locate("ffmpeg", config.ffmpeg_path.as_deref())?),
            ffprobe: Arc::new(ProcessTool::locate("ffprobe", config.ffprobe_path.as_deref())?),
        })
    }
}

/// Per-task inputs shared by every segment.
struct SegmentContext<'a> {
    request: &'a CompilationRequest,
    acquisition: AcquisitionConfig,
    credentials: Option<PathBuf>,
    size: FrameSize,
    workspace: &'a TaskWorkspace,
    logger: &'a TaskLogger,
}

pub struct CompilationPipeline {
    config: WorkerConfig,
    fetcher: SegmentFetcher,
    resolver: SummaryResolver,
    renderer: OverlayRenderer,
    compiler: Compiler,
}

impl CompilationPipeline {
    pub fn new(config: WorkerConfig, tools: Toolset, summarizer: Arc<dyn Summarizer>) -> Self {
        let encoding = EncodingConfig::default();
        let probe = VideoProbe::new(tools.ffprobe, config.probe_timeout);
        let ffmpeg = FfmpegRunner::new(tools.ffmpeg, config.render_timeout);

        let fetcher = SegmentFetcher::new(
            tools.ytdlp,
            FetchSettings {
                segment_duration: config.segment_duration,
                base_timeout: config.fetch_base_timeout,
                timeout_per_second: config.fetch_timeout_per_second,
            },
        );
        let renderer = OverlayRenderer::new(
            ffmpeg.clone(),
            probe.clone(),
            RenderSettings {
                segment_duration: config.segment_duration,
                title_card_secs: config.title_card_secs,
                font_dir: config.font_dir.clone(),
                encoding: encoding.clone(),
            },
        );
        let compiler = Compiler::new(ffmpeg.with_timeout(config.compile_timeout), probe, encoding)
            .with_music_volume(config.music_volume);

        Self {
            config,
            fetcher,
            resolver: SummaryResolver::new(summarizer),
            renderer,
            compiler,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run the task behind `handle` to a terminal state.
    pub async fn execute(&self, handle: TaskHandle) {
        let logger = TaskLogger::new(handle.id(), "compile");
        let span = logger.create_span();
        self.execute_inner(handle, logger).instrument(span).await
    }

    async fn execute_inner(&self, handle: TaskHandle, logger: TaskLogger) {
        let task = match handle.get().await {
            Ok(task) => task,
            Err(e) => {
                logger.log_error(&format!("Task vanished before start: {}", e));
                return;
            }
        };

        let started = Instant::now();
        metrics::task_started();
        let tracker = ProgressTracker::new(handle.clone(), logger.clone());
        let result = self.run(&task, &tracker, &logger).await;
        metrics::task_finished();

        match result {
            Ok(output_ref) => match handle.complete(&output_ref).await {
                Ok(_) => {
                    metrics::record_task_completed(started.elapsed().as_secs_f64());
                    logger.log_completion(Checkpoint::Done.message());
                }
                Err(e) => logger.log_error(&format!("Failed to record completion: {}", e)),
            },
            Err(err) => {
                metrics::record_task_failed(err.stage());
                logger.log_error(&format!("Stage {} failed: {}", err.stage(), err));
                if let Err(e) = handle.fail(&err.user_message()).await {
                    logger.log_error(&format!("Failed to record failure: {}", e));
                }
            }
        }
    }

    async fn run(
        &self,
        task: &Task,
        tracker: &ProgressTracker,
        logger: &TaskLogger,
    ) -> WorkerResult<String> {
        let request = &task.request;
        tracker.checkpoint(Checkpoint::Start).await;
        logger.log_start(&format!(
            "{} segments, format {}",
            request.segments.len(),
            request.format
        ));

        let music = self.resolve_music(request)?;
        let workspace = TaskWorkspace::create(
            &self.config.work_dir,
            &task.id,
            self.config.cleanup_temp_files,
        )?;
        let ctx = SegmentContext {
            request,
            acquisition: request.acquisition_config(),
            credentials: self.resolve_credentials(request, logger),
            size: request.format.dimensions(),
            workspace: &workspace,
            logger,
        };

        let total = request.segments.len();
        let mut rendered = Vec::with_capacity(total);
        for (index, segment) in request.segments.iter().enumerate() {
            tracker.segment_started(index, total).await;
            rendered.push(self.process_segment(index, segment, &ctx).await?);
            metrics::record_segment_rendered();
            tracker.segment_done(index, total).await;
        }

        let intro = workspace.intro();
        self.title_card("intro", &request.title, request, ctx.size, &intro)
            .await?;
        tracker.checkpoint(Checkpoint::IntroReady).await;

        let outro = workspace.outro();
        self.title_card("outro", &self.config.outro_text, request, ctx.size, &outro)
            .await?;
        tracker.checkpoint(Checkpoint::OutroReady).await;

        let file_name = output_file_name(task.id.as_str());
        let plan = CompilePlan {
            intro,
            segments: rendered,
            outro,
            music,
            work_dir: workspace.path().to_path_buf(),
            output: self.config.output_dir.join(&file_name),
        };

        let started = Instant::now();
        let info = self.compiler.compile(&plan, tracker).await?;
        metrics::record_stage_duration("compile", started.elapsed().as_secs_f64());
        logger.log_progress(
            Checkpoint::Done.percent(),
            &format!("Published {} ({:.1}s)", file_name, info.duration),
        );

        Ok(file_name)
    }

    /// Fetch, caption and render one segment. The download is removed on
    /// every exit path; only the rendered file stays in the workspace.
    async fn process_segment(
        &self,
        index: usize,
        segment: &Segment,
        ctx: &SegmentContext<'_>,
    ) -> WorkerResult<PathBuf> {
        let scratch = ctx.workspace.segment_scratch(index)?;

        let started = Instant::now();
        let fetched = self
            .fetcher
            .fetch(
                index,
                segment,
                &ctx.acquisition,
                ctx.credentials.as_deref(),
                scratch.path(),
            )
            .await?;
        metrics::record_stage_duration("fetch", started.elapsed().as_secs_f64());
        if fetched.degraded {
            metrics::record_degraded_acquisition();
            ctx.logger.log_warning(&format!(
                "Segment {} was downloaded without strict transport verification",
                index + 1
            ));
        }

        let resolved = self.resolver.resolve(segment).await;
        if let Some(reason) = &resolved.degraded {
            metrics::record_degraded_summary(reason.reason());
            ctx.logger.log_warning(&format!(
                "Segment {} uses fallback overlay text: {}",
                index + 1,
                reason
            ));
        }

        let output = ctx.workspace.rendered_segment(index);
        let started = Instant::now();
        self.renderer
            .render(
                &fetched.path,
                &resolved.text,
                &ctx.request.style,
                ctx.size,
                &output,
            )
            .await
            .map_err(|e| WorkerError::render(format!("segment {}", index + 1), e))?;
        metrics::record_stage_duration("render", started.elapsed().as_secs_f64());

        drop(scratch);
        Ok(output)
    }

    async fn title_card(
        &self,
        target: &str,
        text: &str,
        request: &CompilationRequest,
        size: FrameSize,
        output: &Path,
    ) -> WorkerResult<()> {
        let started = Instant::now();
        self.renderer
            .title_card(&truncate_overlay(text), &request.style, size, output)
            .await
            .map_err(|e| WorkerError::render(target, e))?;
        metrics::record_stage_duration("title_card", started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Background music must exist before any work starts.
    fn resolve_music(&self, request: &CompilationRequest) -> WorkerResult<Option<PathBuf>> {
        let Some(name) = request.music.as_deref() else {
            return Ok(None);
        };
        resolve_within(&self.config.music_dir, name)
            .map(Some)
            .map_err(|source| {
                WorkerError::Compile(CompileError {
                    stage: CompileStage::MixingAudio,
                    source,
                })
            })
    }

    /// A missing credential bundle is not fatal: the download is attempted
    /// without it.
    fn resolve_credentials(
        &self,
        request: &CompilationRequest,
        logger: &TaskLogger,
    ) -> Option<PathBuf> {
        let name = request.acquisition.as_ref()?.credentials_file.as_deref()?;
        match resolve_within(&self.config.credentials_dir, name) {
            Ok(path) => Some(path),
            Err(e) => {
                logger.log_warning(&format!(
                    "Ignoring credential bundle: {}",
                    e.diagnostic()
                ));
                None
            }
        }
    }
}
