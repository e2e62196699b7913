//! Overlay rendering.
//!
//! Every piece of the compilation (segments and title cards) is encoded with
//! one [`EncodingConfig`], so the compiler can concatenate with stream copy.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use reel_models::{EncodingConfig, FrameSize, OverlayStyle};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    chars_per_line, color_source, drawtext, scale_crop, silent_audio_source, wrap_text, DrawText,
    FontSource,
};
use crate::probe::VideoProbe;

const FONT_EXTENSIONS: &[&str] = &["", "ttf", "otf"];

/// Rendering settings shared by every task.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Length of each rendered segment in seconds
    pub segment_duration: f64,
    /// Length of intro/outro cards in seconds
    pub title_card_secs: f64,
    /// Directory searched for font files
    pub font_dir: PathBuf,
    pub encoding: EncodingConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            segment_duration: 3.0,
            title_card_secs: 2.0,
            font_dir: PathBuf::from("fonts"),
            encoding: EncodingConfig::default(),
        }
    }
}

/// Scales, crops and draws overlay text onto segments; renders title cards.
#[derive(Clone)]
pub struct OverlayRenderer {
    ffmpeg: FfmpegRunner,
    probe: VideoProbe,
    settings: RenderSettings,
}

impl OverlayRenderer {
    pub fn new(ffmpeg: FfmpegRunner, probe: VideoProbe, settings: RenderSettings) -> Self {
        Self {
            ffmpeg,
            probe,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `source` with `text` drawn on it into `output`.
    pub async fn render(
        &self,
        source: &Path,
        text: &str,
        style: &OverlayStyle,
        size: FrameSize,
        output: &Path,
    ) -> MediaResult<()> {
        let info = self.probe.probe(source).await?;
        if !info.has_audio {
            debug!(source = %source.display(), "Source has no audio, adding silent track");
        }

        let textfile = self.write_text(text, style, size, output).await?;
        let font = self.resolve_font(&style.font);
        let encoding = &self.settings.encoding;

        let video_chain = format!(
            "[0:v]{},fps={},{},format={}[v]",
            scale_crop(size),
            encoding.frame_rate,
            drawtext(&DrawText {
                textfile: &textfile,
                font: &font,
                font_size: style.font_size,
                font_color: &style.font_color,
                placement: style.placement,
            }),
            encoding.pixel_format,
        );

        let mut cmd = FfmpegCommand::new(output).input(source);
        let audio_map = if info.has_audio {
            "0:a:0"
        } else {
            cmd = cmd.lavfi(silent_audio_source(
                encoding.channel_layout(),
                encoding.sample_rate,
            ));
            "1:a:0"
        };

        let cmd = cmd
            .filter_complex(video_chain)
            .map("[v]")
            .map(audio_map)
            .duration(self.settings.segment_duration)
            .output_args(encoding.to_ffmpeg_args());

        self.ffmpeg.run(&cmd).await?;
        ensure_output(output).await?;

        info!(output = %output.display(), "Rendered segment");
        Ok(())
    }

    /// Render a solid title card of `title_card_secs` with `text` centred
    /// according to `style`. Blank text yields a plain card.
    pub async fn title_card(
        &self,
        text: &str,
        style: &OverlayStyle,
        size: FrameSize,
        output: &Path,
    ) -> MediaResult<()> {
        let encoding = &self.settings.encoding;
        let secs = self.settings.title_card_secs;

        let video_chain = if text.trim().is_empty() {
            format!("[0:v]format={}[v]", encoding.pixel_format)
        } else {
            let textfile = self.write_text(text, style, size, output).await?;
            let font = self.resolve_font(&style.font);
            format!(
                "[0:v]{},format={}[v]",
                drawtext(&DrawText {
                    textfile: &textfile,
                    font: &font,
                    font_size: style.font_size,
                    font_color: &style.font_color,
                    placement: style.placement,
                }),
                encoding.pixel_format
            )
        };

        let cmd = FfmpegCommand::new(output)
            .lavfi(color_source(size, secs, encoding.frame_rate))
            .lavfi(silent_audio_source(
                encoding.channel_layout(),
                encoding.sample_rate,
            ))
            .filter_complex(video_chain)
            .map("[v]")
            .map("1:a:0")
            .duration(secs)
            .output_args(encoding.to_ffmpeg_args());

        self.ffmpeg.run(&cmd).await?;
        ensure_output(output).await?;

        info!(output = %output.display(), "Rendered title card");
        Ok(())
    }

    /// Font file in the font directory, or the family name for fontconfig.
    pub fn resolve_font(&self, font: &str) -> FontSource {
        for ext in FONT_EXTENSIONS {
            let candidate = if ext.is_empty() {
                self.settings.font_dir.join(font)
            } else {
                self.settings.font_dir.join(format!("{}.{}", font, ext))
            };
            if candidate.is_file() {
                return FontSource::File(candidate);
            }
        }
        FontSource::Family(font.to_string())
    }

    /// Write wrapped overlay text next to `output`.
    async fn write_text(
        &self,
        text: &str,
        style: &OverlayStyle,
        size: FrameSize,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        let wrapped = wrap_text(text, chars_per_line(size.width, style.font_size));
        let textfile = output.with_extension("txt");
        fs::write(&textfile, wrapped.as_bytes()).await?;
        Ok(textfile)
    }
}

async fn ensure_output(output: &Path) -> MediaResult<()> {
    match fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(MediaError::invalid_video(format!(
            "{} is empty",
            output.file_name().unwrap_or_default().to_string_lossy()
        ))),
        Err(_) => Err(MediaError::FileNotFound(output.to_path_buf())),
    }
}
