//! Segment acquisition via yt-dlp.
//!
//! Each segment is fetched with at most two attempts: a primary attempt with
//! any supplied credentials, and a degraded attempt with relaxed transport
//! verification for failures that might be transient or transport related.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use reel_models::{AcquisitionConfig, Segment};

use crate::error::{AcquisitionError, AttemptKind, FailedAttempt, FailureClass, MediaError};
use crate::fs_utils::remove_if_exists;
use crate::tool::ExternalTool;

/// Container/codec selection handed to yt-dlp.
const FORMAT_SELECTOR: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b";

/// Timeout and duration settings for acquisition.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Length of each downloaded section in seconds
    pub segment_duration: f64,
    /// Fixed part of the per-attempt timeout
    pub base_timeout: Duration,
    /// Additional timeout per second of media
    pub timeout_per_second: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            segment_duration: 3.0,
            base_timeout: Duration::from_secs(180),
            timeout_per_second: Duration::from_secs(10),
        }
    }
}

impl FetchSettings {
    /// Per-attempt timeout for the configured segment duration.
    pub fn attempt_timeout(&self, kind: AttemptKind) -> Duration {
        let scaled = self.base_timeout + self.timeout_per_second.mul_f64(self.segment_duration.max(0.0));
        match kind {
            AttemptKind::Primary => scaled,
            AttemptKind::Degraded => scaled * 2,
        }
    }
}

/// A downloaded segment.
#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub path: PathBuf,
    /// The degraded attempt produced this file
    pub degraded: bool,
}

/// Downloads segment sections with a primary/degraded retry ladder.
#[derive(Clone)]
pub struct SegmentFetcher {
    tool: Arc<dyn ExternalTool>,
    settings: FetchSettings,
}

impl SegmentFetcher {
    pub fn new(tool: Arc<dyn ExternalTool>, settings: FetchSettings) -> Self {
        Self { tool, settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetch segment `index` into `dest_dir`.
    ///
    /// `credentials` is the resolved credential bundle, if any. The caller
    /// owns the returned file.
    pub async fn fetch(
        &self,
        index: usize,
        segment: &Segment,
        config: &AcquisitionConfig,
        credentials: Option<&Path>,
        dest_dir: &Path,
    ) -> Result<FetchedSegment, AcquisitionError> {
        if let Err(reason) = check_locator(&segment.url) {
            return Err(AcquisitionError::new(
                index,
                vec![FailedAttempt {
                    kind: AttemptKind::Primary,
                    class: FailureClass::Unavailable,
                    diagnostic: reason,
                }],
            ));
        }

        let output = dest_dir.join(format!("source_{}.mp4", index));
        let mut attempts = Vec::new();

        for kind in [AttemptKind::Primary, AttemptKind::Degraded] {
            if kind == AttemptKind::Degraded {
                warn!(
                    segment = index,
                    attempt = kind.as_str(),
                    "Retrying segment download without strict transport verification"
                );
            }

            match self.attempt(kind, segment, config, credentials, &output).await {
                Ok(()) => {
                    info!(segment = index, attempt = kind.as_str(), "Segment downloaded");
                    return Ok(FetchedSegment {
                        path: output,
                        degraded: kind == AttemptKind::Degraded,
                    });
                }
                Err(err) => {
                    let class = match &err {
                        MediaError::Timeout { .. } => FailureClass::Transport,
                        MediaError::ToolFailed {
                            stderr: Some(stderr),
                            ..
                        } => classify_failure(stderr),
                        _ => FailureClass::Other,
                    };
                    warn!(
                        segment = index,
                        attempt = kind.as_str(),
                        class = class.as_str(),
                        error = %err,
                        "Segment download attempt failed"
                    );
                    let terminal = matches!(err, MediaError::ToolNotFound(_));
                    attempts.push(FailedAttempt {
                        kind,
                        class,
                        diagnostic: err.diagnostic(),
                    });
                    if let Err(e) = remove_if_exists(&output).await {
                        warn!(
                            segment = index,
                            "Failed to remove partial download {}: {}",
                            output.display(),
                            e
                        );
                    }

                    if terminal || !should_degrade(class, credentials.is_some()) {
                        break;
                    }
                }
            }
        }

        Err(AcquisitionError::new(index, attempts))
    }

    async fn attempt(
        &self,
        kind: AttemptKind,
        segment: &Segment,
        config: &AcquisitionConfig,
        credentials: Option<&Path>,
        output: &Path,
    ) -> Result<(), MediaError> {
        let args = self.build_args(kind, segment, config, credentials, output);
        self.tool.invoke(&args, self.settings.attempt_timeout(kind)).await?;

        if !output.is_file() {
            return Err(MediaError::tool_failed(
                self.tool.name(),
                "no output file produced",
                None,
                None,
            ));
        }
        Ok(())
    }

    /// yt-dlp arguments for one attempt.
    pub fn build_args(
        &self,
        kind: AttemptKind,
        segment: &Segment,
        config: &AcquisitionConfig,
        credentials: Option<&Path>,
        output: &Path,
    ) -> Vec<String> {
        let start = segment.start_secs.max(0.0);
        let end = start + self.settings.segment_duration;

        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            FORMAT_SELECTOR.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--download-sections".to_string(),
            format!("*{:.3}-{:.3}", start, end),
            "--force-keyframes-at-cuts".to_string(),
            "--retries".to_string(),
            config.retries.to_string(),
        ];

        if let Some(path) = credentials {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        match kind {
            AttemptKind::Primary => {
                if config.geo_bypass {
                    args.push("--geo-bypass".to_string());
                }
            }
            AttemptKind::Degraded => {
                args.push("--no-check-certificates".to_string());
                args.push("--geo-bypass".to_string());
            }
        }

        args.push("-o".to_string());
        args.push(output.to_string_lossy().to_string());
        args.push("--".to_string());
        args.push(segment.url.clone());
        args
    }
}

/// Whether a failed primary attempt may fall through to the degraded one.
fn should_degrade(class: FailureClass, has_credentials: bool) -> bool {
    match class {
        FailureClass::Unavailable => false,
        FailureClass::Restricted => has_credentials,
        FailureClass::Transport | FailureClass::Authentication | FailureClass::Other => true,
    }
}

/// Only http(s) locators are handed to the acquisition tool.
fn check_locator(locator: &str) -> Result<(), String> {
    let parsed = url::Url::parse(locator).map_err(|e| format!("invalid source locator: {}", e))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        scheme => Err(format!("unsupported source locator scheme: {}", scheme)),
    }
}

/// Classify a yt-dlp failure from its stderr.
pub fn classify_failure(stderr: &str) -> FailureClass {
    let s = stderr.to_ascii_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| s.contains(n));

    if any(&[
        "private video",
        "video unavailable",
        "has been removed",
        "account associated with this video has been terminated",
        "this video is not available",
        "does not exist",
        "404: not found",
        "unsupported url",
    ]) {
        FailureClass::Unavailable
    } else if any(&[
        "age-restricted",
        "age restricted",
        "confirm your age",
        "inappropriate for some users",
        "not available in your country",
        "geo restricted",
        "geo-restricted",
        "blocked it in your country",
    ]) {
        FailureClass::Restricted
    } else if any(&[
        "sign in to confirm",
        "sign in",
        "cookies",
        "login required",
        "http error 403",
        "403: forbidden",
        "http error 429",
        "too many requests",
    ]) {
        FailureClass::Authentication
    } else if any(&[
        "certificate",
        "ssl",
        "tls",
        "timed out",
        "timeout",
        "connection reset",
        "connection refused",
        "connection aborted",
        "network is unreachable",
        "temporary failure in name resolution",
        "unable to download webpage",
    ]) {
        FailureClass::Transport
    } else {
        FailureClass::Other
    }
}
