//! Overlay styling and output format definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Smallest accepted overlay font size.
pub const MIN_FONT_SIZE: u32 = 12;
/// Largest accepted overlay font size.
pub const MAX_FONT_SIZE: u32 = 120;

/// Default font family / font file stem.
pub const DEFAULT_FONT: &str = "Arial";
/// Default overlay font size.
pub const DEFAULT_FONT_SIZE: u32 = 36;
/// Default overlay font color.
pub const DEFAULT_FONT_COLOR: &str = "white";

/// Output aspect-ratio class. Each class maps to fixed pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 16:9, 1920x1080
    #[default]
    #[serde(alias = "youtube")]
    Landscape,
    /// 9:16, 1080x1920
    #[serde(alias = "shorts")]
    Vertical,
    /// 1:1, 1080x1080
    #[serde(alias = "instagram")]
    Square,
}

impl OutputFormat {
    pub const ALL: &'static [OutputFormat] = &[
        OutputFormat::Landscape,
        OutputFormat::Vertical,
        OutputFormat::Square,
    ];

    /// Fixed pixel dimensions for this format.
    pub fn dimensions(&self) -> FrameSize {
        match self {
            OutputFormat::Landscape => FrameSize::new(1920, 1080),
            OutputFormat::Vertical => FrameSize::new(1080, 1920),
            OutputFormat::Square => FrameSize::new(1080, 1080),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Landscape => "landscape",
            OutputFormat::Vertical => "vertical",
            OutputFormat::Square => "square",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "landscape" | "youtube" => Ok(OutputFormat::Landscape),
            "vertical" | "shorts" => Ok(OutputFormat::Vertical),
            "square" | "instagram" => Ok(OutputFormat::Square),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown output format: {0}")]
pub struct OutputFormatParseError(String);

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `WxH` form used by lavfi sources.
    pub fn as_lavfi(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Vertical anchor for overlay text. Text is always centred horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextPlacement {
    Top,
    Center,
    #[default]
    Bottom,
}

impl TextPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextPlacement::Top => "top",
            TextPlacement::Center => "center",
            TextPlacement::Bottom => "bottom",
        }
    }
}

impl fmt::Display for TextPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Global overlay styling applied to every segment and title card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct OverlayStyle {
    /// Font identifier: a file stem in the font directory or a system family name
    #[serde(default = "default_font")]
    #[validate(length(min = 1, max = 64), custom(function = "validate_font_name"))]
    pub font: String,

    /// Font size in points
    #[serde(default = "default_font_size")]
    #[validate(range(min = 12, max = 120))]
    pub font_size: u32,

    /// Font color (named color or `#RRGGBB`, optional `@alpha`)
    #[serde(default = "default_font_color")]
    #[validate(length(min = 1, max = 32), custom(function = "validate_font_color"))]
    pub font_color: String,

    /// Vertical text placement
    #[serde(default)]
    pub placement: TextPlacement,
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}
fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}
fn default_font_color() -> String {
    DEFAULT_FONT_COLOR.to_string()
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font: default_font(),
            font_size: DEFAULT_FONT_SIZE,
            font_color: default_font_color(),
            placement: TextPlacement::default(),
        }
    }
}

/// Font names end up inside an FFmpeg filter description, so only a
/// conservative character set is accepted.
fn validate_font_name(font: &str) -> Result<(), ValidationError> {
    let ok = font
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'));
    if !ok || font.contains("..") {
        return Err(ValidationError::new("invalid_font"));
    }
    Ok(())
}

fn validate_font_color(color: &str) -> Result<(), ValidationError> {
    let ok = color
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.'));
    if !ok {
        return Err(ValidationError::new("invalid_font_color"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dimensions() {
        assert_eq!(OutputFormat::Landscape.dimensions(), FrameSize::new(1920, 1080));
        assert_eq!(OutputFormat::Vertical.dimensions(), FrameSize::new(1080, 1920));
        assert_eq!(OutputFormat::Square.dimensions(), FrameSize::new(1080, 1080));
    }

    #[test]
    fn test_format_aliases() {
        let f: OutputFormat = serde_json::from_str("\"shorts\"").unwrap();
        assert_eq!(f, OutputFormat::Vertical);
        assert_eq!("instagram".parse::<OutputFormat>().unwrap(), OutputFormat::Square);
        assert!("cinema".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_style_defaults() {
        let style: OverlayStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(style, OverlayStyle::default());
        assert_eq!(style.placement, TextPlacement::Bottom);
        assert!(style.validate().is_ok());
    }

    #[test]
    fn test_style_validation() {
        let style = OverlayStyle {
            font_size: 200,
            ..Default::default()
        };
        assert!(style.validate().is_err());

        let style = OverlayStyle {
            font_color: "white:box=1".to_string(),
            ..Default::default()
        };
        assert!(style.validate().is_err());

        let style = OverlayStyle {
            font: "../../etc/passwd".to_string(),
            ..Default::default()
        };
        assert!(style.validate().is_err());
    }
}
