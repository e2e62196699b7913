//! Compilation request definitions.
//!
//! A request is validated once at the submission boundary. The pipeline
//! only ever sees requests that passed [`Validate::validate`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::style::{OutputFormat, OverlayStyle};

/// Maximum number of segments in a single compilation.
pub const MAX_SEGMENTS: usize = 20;
/// Maximum acquisition retries a request may ask for.
pub const MAX_ACQUISITION_RETRIES: u32 = 10;
/// Title rendered on the intro card when none is given.
pub const DEFAULT_TITLE: &str = "Amazing Video Compilation";

/// A fully-typed compilation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct CompilationRequest {
    /// Ordered segments; output order follows this order exactly
    #[validate(length(min = 1, max = 20), nested)]
    pub segments: Vec<Segment>,

    /// Intro card title
    #[serde(default = "default_title")]
    #[validate(length(min = 1, max = 100))]
    pub title: String,

    /// Overlay styling
    #[serde(default)]
    #[validate(nested)]
    pub style: OverlayStyle,

    /// Output aspect-ratio class
    #[serde(default)]
    pub format: OutputFormat,

    /// Background audio reference (file name inside the music directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub music: Option<String>,

    /// Acquisition settings
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "download_config")]
    #[validate(nested)]
    pub acquisition: Option<AcquisitionConfig>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl CompilationRequest {
    /// Create a request with default styling for the given segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            title: default_title(),
            style: OverlayStyle::default(),
            format: OutputFormat::default(),
            music: None,
            acquisition: None,
        }
    }

    /// Acquisition settings, falling back to defaults.
    pub fn acquisition_config(&self) -> AcquisitionConfig {
        self.acquisition.clone().unwrap_or_default()
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_music(mut self, music: impl Into<String>) -> Self {
        self.music = Some(music.into());
        self
    }

    pub fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
        self.acquisition = Some(acquisition);
        self
    }
}

/// One externally-sourced clip reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_overlay_source"))]
pub struct Segment {
    /// Source locator
    #[validate(url)]
    pub url: String,

    /// Start offset into the source, in seconds
    #[serde(alias = "timestamp")]
    #[validate(range(min = 0.0))]
    pub start_secs: f64,

    /// Keywords handed to the summarizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    /// Explicit overlay text; overrides any resolved summary
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "custom_text")]
    pub text: Option<String>,
}

impl Segment {
    /// Segment with explicit overlay text.
    pub fn with_text(url: impl Into<String>, start_secs: f64, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start_secs,
            keywords: None,
            text: Some(text.into()),
        }
    }

    /// Segment whose overlay text is resolved from keywords.
    pub fn with_keywords(
        url: impl Into<String>,
        start_secs: f64,
        keywords: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            start_secs,
            keywords: Some(keywords.into()),
            text: None,
        }
    }

    /// Explicit text, if set and not blank.
    pub fn explicit_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Keywords, if set and not blank.
    pub fn keywords(&self) -> Option<&str> {
        self.keywords
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

fn validate_overlay_source(segment: &Segment) -> Result<(), ValidationError> {
    if segment.explicit_text().is_none() && segment.keywords().is_none() {
        let mut err = ValidationError::new("missing_overlay_source");
        err.message = Some("segment needs either text or keywords".into());
        return Err(err);
    }
    Ok(())
}

/// Settings for the acquisition tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Credential bundle (Netscape cookies file) reference
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "cookies_file")]
    #[validate(length(min = 1, max = 255))]
    pub credentials_file: Option<String>,

    /// Transport retries handed to the acquisition tool
    #[serde(default = "default_retries")]
    #[validate(range(max = 10))]
    pub retries: u32,

    /// Ask the acquisition tool to bypass geographic restrictions
    #[serde(default = "default_geo_bypass", alias = "use_geo_bypass")]
    pub geo_bypass: bool,
}

fn default_retries() -> u32 {
    3
}

fn default_geo_bypass() -> bool {
    true
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            credentials_file: None,
            retries: default_retries(),
            geo_bypass: default_geo_bypass(),
        }
    }
}

impl AcquisitionConfig {
    pub fn has_credentials(&self) -> bool {
        self.credentials_file.is_some()
    }
}
