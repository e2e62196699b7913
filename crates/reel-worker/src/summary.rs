//! Overlay text resolution.
//!
//! [`SummaryResolver::resolve`] never fails: explicit text wins, then the
//! external summarizer, then a local keyword extraction.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use reel_models::text::{first_words, truncate_overlay, FALLBACK_OVERLAY_TEXT};
use reel_models::Segment;

use crate::config::SummarizerConfig;
use crate::retry::{retry_async, RetryConfig};

/// Keyword tokens kept by the local fallback.
const FALLBACK_WORDS: usize = 3;

#[derive(Debug, Clone, Error)]
pub enum SummaryError {
    #[error("summarizer is not configured")]
    NotConfigured,

    #[error("summarizer request failed: {0}")]
    Request(String),

    #[error("summarizer returned {status}")]
    Status { status: u16 },

    #[error("summarizer returned no text")]
    Empty,

    #[error("failed to parse summarizer response: {0}")]
    Parse(String),
}

impl SummaryError {
    /// Worth retrying: network errors, rate limits and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            SummaryError::Request(_) => true,
            SummaryError::Status { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            SummaryError::NotConfigured => "not_configured",
            SummaryError::Request(_) => "request",
            SummaryError::Status { .. } => "status",
            SummaryError::Empty => "empty",
            SummaryError::Parse(_) => "parse",
        }
    }
}

/// Produces short overlay text from keywords.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, keywords: &str) -> Result<String, SummaryError>;
}

/// Summarizer used when no API key is configured.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _keywords: &str) -> Result<String, SummaryError> {
        Err(SummaryError::NotConfigured)
    }
}

/// Gemini `generateContent` request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini API summarizer.
pub struct GeminiSummarizer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryConfig,
}

impl GeminiSummarizer {
    pub fn new(
        api_key: impl Into<String>,
        config: &SummarizerConfig,
    ) -> Result<Self, SummaryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummaryError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::new("gemini_summary").with_max_retries(config.max_retries),
        })
    }

    fn prompt(keywords: &str) -> String {
        format!(
            "Write one short, catchy caption of at most 60 characters for a video clip about: {}. \
             Reply with the caption only, without quotes or hashtags.",
            keywords
        )
    }

    async fn call(&self, keywords: &str) -> Result<String, SummaryError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::prompt(keywords),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 40,
                temperature: 0.7,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| SummaryError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::Status {
                status: status.as_u16(),
            });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::Parse(e.without_url().to_string()))?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| clean_summary(&p.text))
            .unwrap_or_default();

        if text.is_empty() {
            return Err(SummaryError::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, keywords: &str) -> Result<String, SummaryError> {
        retry_async(&self.retry, || self.call(keywords), SummaryError::is_transient).await
    }
}

/// Build the summarizer for a configuration.
pub fn summarizer_from_config(config: &SummarizerConfig) -> Arc<dyn Summarizer> {
    match config.api_key.as_deref() {
        Some(key) => match GeminiSummarizer::new(key, config) {
            Ok(summarizer) => Arc::new(summarizer),
            Err(e) => {
                tracing::warn!("Summarizer unavailable, using local fallback: {}", e);
                Arc::new(DisabledSummarizer)
            }
        },
        None => Arc::new(DisabledSummarizer),
    }
}

/// First line of model output without wrapping quotes or markdown.
fn clean_summary(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .trim_matches(|c| matches!(c, '"' | '\'' | '*' | '`'))
        .trim()
        .to_string()
}

/// Where the overlay text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Explicit,
    Summarizer,
    Fallback,
}

/// Overlay text for one segment.
#[derive(Debug, Clone)]
pub struct ResolvedText {
    /// At most 60 characters, never empty
    pub text: String,
    pub source: TextSource,
    /// Why the summarizer was not used, when it should have been
    pub degraded: Option<SummaryError>,
}

/// Resolves overlay text per segment.
#[derive(Clone)]
pub struct SummaryResolver {
    summarizer: Arc<dyn Summarizer>,
}

impl SummaryResolver {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }

    pub async fn resolve(&self, segment: &Segment) -> ResolvedText {
        if let Some(text) = segment.explicit_text() {
            return ResolvedText {
                text: truncate_overlay(text),
                source: TextSource::Explicit,
                degraded: None,
            };
        }

        let keywords = segment.keywords();
        let failure = match keywords {
            Some(keywords) => match self.summarizer.summarize(keywords).await {
                Ok(summary) => {
                    let text = truncate_overlay(&summary);
                    if !text.is_empty() {
                        return ResolvedText {
                            text,
                            source: TextSource::Summarizer,
                            degraded: None,
                        };
                    }
                    SummaryError::Empty
                }
                Err(e) => e,
            },
            None => SummaryError::Empty,
        };

        debug!(error = %failure, "Using local overlay text fallback");
        ResolvedText {
            text: fallback_text(keywords),
            source: TextSource::Fallback,
            degraded: Some(failure),
        }
    }
}

/// Deterministic local overlay text.
pub fn fallback_text(keywords: Option<&str>) -> String {
    let words = keywords.map(|k| first_words(k, FALLBACK_WORDS)).unwrap_or_default();
    if words.is_empty() {
        FALLBACK_OVERLAY_TEXT.to_string()
    } else {
        truncate_overlay(&words)
    }
}
