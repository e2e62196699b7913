//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default Gemini model used for overlay summaries.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
/// Default Gemini API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrently running tasks
    pub max_concurrent_tasks: usize,
    /// Root for per-task working directories
    pub work_dir: PathBuf,
    /// Published compilations
    pub output_dir: PathBuf,
    /// Persisted task records
    pub task_dir: PathBuf,
    /// Font files looked up by overlay font name
    pub font_dir: PathBuf,
    /// Background music files referenced by requests
    pub music_dir: PathBuf,
    /// Credential bundles referenced by requests
    pub credentials_dir: PathBuf,
    /// Length of each segment in seconds
    pub segment_duration: f64,
    /// Length of intro and outro cards in seconds
    pub title_card_secs: f64,
    /// Text on the outro card
    pub outro_text: String,
    /// Background music volume relative to the original audio
    pub music_volume: f32,
    pub fetch_base_timeout: Duration,
    pub fetch_timeout_per_second: Duration,
    pub render_timeout: Duration,
    pub compile_timeout: Duration,
    pub probe_timeout: Duration,
    /// Remove working directories when a task finishes
    pub cleanup_temp_files: bool,
    /// Fail tasks left `processing` by a previous run
    pub fail_interrupted_on_start: bool,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub summarizer: SummarizerConfig,
}

/// External summarizer settings.
#[derive(Clone)]
pub struct SummarizerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Retries for transient HTTP failures
    pub max_retries: u32,
}

impl std::fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            max_retries: 1,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
            work_dir: PathBuf::from("videos/temp"),
            output_dir: PathBuf::from("videos/output"),
            task_dir: PathBuf::from("videos/tasks"),
            font_dir: PathBuf::from("fonts"),
            music_dir: PathBuf::from("videos/music"),
            credentials_dir: PathBuf::from("videos/cookies"),
            segment_duration: 3.0,
            title_card_secs: 2.0,
            outro_text: "Thanks for watching!".to_string(),
            music_volume: 0.3,
            fetch_base_timeout: Duration::from_secs(180),
            fetch_timeout_per_second: Duration::from_secs(10),
            render_timeout: Duration::from_secs(300),
            compile_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(30),
            cleanup_temp_files: true,
            fail_interrupted_on_start: true,
            ytdlp_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            summarizer: SummarizerConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_concurrent_tasks: env_parse::<usize>("WORKER_MAX_TASKS")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_concurrent_tasks),
            work_dir: env_string("WORKER_WORK_DIR").map(PathBuf::from).unwrap_or(d.work_dir),
            output_dir: env_string("WORKER_OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
            task_dir: env_string("WORKER_TASK_DIR").map(PathBuf::from).unwrap_or(d.task_dir),
            font_dir: env_string("WORKER_FONT_DIR").map(PathBuf::from).unwrap_or(d.font_dir),
            music_dir: env_string("WORKER_MUSIC_DIR").map(PathBuf::from).unwrap_or(d.music_dir),
            credentials_dir: env_string("WORKER_CREDENTIALS_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.credentials_dir),
            segment_duration: env_parse::<f64>("SEGMENT_DURATION_SECS")
                .filter(|s| *s > 0.0)
                .unwrap_or(d.segment_duration),
            title_card_secs: env_parse::<f64>("TITLE_CARD_SECS")
                .filter(|s| *s > 0.0)
                .unwrap_or(d.title_card_secs),
            outro_text: std::env::var("OUTRO_TEXT").unwrap_or(d.outro_text),
            music_volume: env_parse::<f32>("MUSIC_VOLUME")
                .filter(|v| (0.0..=1.0).contains(v))
                .unwrap_or(d.music_volume),
            fetch_base_timeout: env_secs("FETCH_BASE_TIMEOUT_SECS", d.fetch_base_timeout),
            fetch_timeout_per_second: env_secs("FETCH_TIMEOUT_PER_SECOND", d.fetch_timeout_per_second),
            render_timeout: env_secs("RENDER_TIMEOUT_SECS", d.render_timeout),
            compile_timeout: env_secs("COMPILE_TIMEOUT_SECS", d.compile_timeout),
            probe_timeout: env_secs("PROBE_TIMEOUT_SECS", d.probe_timeout),
            cleanup_temp_files: env_bool("CLEANUP_TEMP_FILES").unwrap_or(d.cleanup_temp_files),
            fail_interrupted_on_start: env_bool("FAIL_INTERRUPTED_ON_START")
                .unwrap_or(d.fail_interrupted_on_start),
            ytdlp_path: env_string("YTDLP_PATH"),
            ffmpeg_path: env_string("FFMPEG_PATH"),
            ffprobe_path: env_string("FFPROBE_PATH"),
            summarizer: SummarizerConfig {
                api_key: env_string("GOOGLE_AI_API_KEY").or_else(|| env_string("GEMINI_API_KEY")),
                model: env_string("GEMINI_MODEL").unwrap_or(d.summarizer.model),
                base_url: env_string("GEMINI_BASE_URL").unwrap_or(d.summarizer.base_url),
                timeout: env_secs("SUMMARY_TIMEOUT_SECS", d.summarizer.timeout),
                max_retries: env_parse::<u32>("SUMMARY_MAX_RETRIES").unwrap_or(d.summarizer.max_retries),
            },
        }
    }

    /// Directories that must exist and be writable.
    pub fn writable_dirs(&self) -> [&PathBuf; 3] {
        [&self.work_dir, &self.output_dir, &self.task_dir]
    }
}
