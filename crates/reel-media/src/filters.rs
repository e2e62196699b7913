//! FFmpeg filter descriptions for overlay rendering and compilation.

use std::path::{Path, PathBuf};

use reel_models::{FrameSize, TextPlacement};

/// Text outline width in pixels.
pub const TEXT_BORDER_WIDTH: u32 = 4;
/// Text outline color.
pub const TEXT_BORDER_COLOR: &str = "black";
/// Horizontally centred text.
pub const TEXT_X: &str = "(w-text_w)/2";
/// Background for generated title cards.
pub const TITLE_CARD_COLOR: &str = "black";
/// Default music volume relative to the original track.
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.3;

/// Average glyph width as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.6;
/// Horizontal space kept free on each side of wrapped text, as a fraction of the frame width.
const TEXT_SIDE_MARGIN: f64 = 0.05;
const MIN_CHARS_PER_LINE: usize = 8;

/// Vertical anchor expression for a placement.
pub fn placement_y(placement: TextPlacement) -> &'static str {
    match placement {
        TextPlacement::Top => "50",
        TextPlacement::Center => "(h-text_h)/2",
        TextPlacement::Bottom => "h*0.8-text_h/2",
    }
}

/// Scale to fill `size` while preserving aspect ratio, then crop the overflow.
pub fn scale_crop(size: FrameSize) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = size.width,
        h = size.height
    )
}

/// Where drawtext gets its glyphs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// Font file on disk
    File(PathBuf),
    /// Family name resolved by fontconfig
    Family(String),
}

/// Inputs for a drawtext filter.
#[derive(Debug, Clone)]
pub struct DrawText<'a> {
    /// File holding the (already wrapped) text
    pub textfile: &'a Path,
    pub font: &'a FontSource,
    pub font_size: u32,
    pub font_color: &'a str,
    pub placement: TextPlacement,
}

/// Build a drawtext filter reading its text from a file.
pub fn drawtext(spec: &DrawText<'_>) -> String {
    let font = match spec.font {
        FontSource::File(path) => format!("fontfile={}", escape_filter_path(path)),
        FontSource::Family(name) => format!("font={}", escape_filter_value(name)),
    };
    format!(
        "drawtext=textfile={textfile}:{font}:fontsize={size}:fontcolor={color}:\
         borderw={bw}:bordercolor={bc}:line_spacing=10:x={x}:y={y}",
        textfile = escape_filter_path(spec.textfile),
        font = font,
        size = spec.font_size,
        color = escape_filter_value(spec.font_color),
        bw = TEXT_BORDER_WIDTH,
        bc = TEXT_BORDER_COLOR,
        x = TEXT_X,
        y = placement_y(spec.placement),
    )
}

/// Escape a value for use as a filter option inside a filtergraph.
///
/// Two levels apply: the option value (`\ ' :`) and then the graph
/// description (`\ ' [ ] , ;`).
pub fn escape_filter_value(raw: &str) -> String {
    let option_level = escape_chars(raw, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

pub fn escape_filter_path(path: &Path) -> String {
    escape_filter_value(&path.to_string_lossy())
}

fn escape_chars(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Maximum characters per line for a frame width and font size.
pub fn chars_per_line(width: u32, font_size: u32) -> usize {
    let usable = width as f64 * (1.0 - 2.0 * TEXT_SIDE_MARGIN);
    let glyph = (font_size.max(1) as f64) * GLYPH_WIDTH_RATIO;
    ((usable / glyph).floor() as usize).max(MIN_CHARS_PER_LINE)
}

/// Greedy word wrap. Words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> String {
    let max_chars = max_chars.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if current.is_empty() {
            current = word.into_iter().collect();
        } else if current_len + 1 + word.len() <= max_chars {
            current.push(' ');
            current.extend(word);
        } else {
            lines.push(std::mem::replace(&mut current, word.into_iter().collect()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// One line of a concat demuxer list.
pub fn concat_list_entry(path: &Path) -> String {
    format!("file '{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

/// Mix looped background music under the original audio.
///
/// Input 0 is the compiled video, input 1 the music. The mix ends with the
/// video's audio, so longer music is truncated.
pub fn music_mix(volume: f32) -> String {
    format!(
        "[1:a]volume={:.2}[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=2[aout]",
        volume
    )
}

/// Solid-color lavfi source for title cards.
pub fn color_source(size: FrameSize, secs: f64, fps: u32) -> String {
    format!(
        "color=c={}:s={}:d={:.3}:r={}",
        TITLE_CARD_COLOR,
        size.as_lavfi(),
        secs,
        fps
    )
}

/// Silent audio lavfi source.
pub fn silent_audio_source(channel_layout: &str, sample_rate: u32) -> String {
    format!(
        "anullsrc=channel_layout={}:sample_rate={}",
        channel_layout, sample_rate
    )
}
