//! Scripted stand-ins for yt-dlp, FFmpeg and FFprobe shared by the
//! pipeline test binaries.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use reel_media::{ExternalTool, MediaError, MediaResult, ToolOutput};
use reel_models::{CompilationRequest, Segment, Task, TaskStatus};
use reel_worker::{DisabledSummarizer, TaskExecutor, Toolset, WorkerConfig};

/// yt-dlp stand-in: pops one scripted outcome per call (success when the
/// script is empty) and writes the locator into the output file.
#[derive(Default)]
pub struct FakeYtdlp {
    script: Mutex<VecDeque<Result<(), String>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeYtdlp {
    pub fn scripted(outcomes: Vec<Result<(), String>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalTool for FakeYtdlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn invoke(&self, args: &[String], _timeout: Duration) -> MediaResult<ToolOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        if let Some(Err(stderr)) = self.script.lock().unwrap().pop_front() {
            return Err(MediaError::tool_failed(
                "yt-dlp",
                "exit status: 1",
                Some(stderr),
                Some(1),
            ));
        }
        let out = args.iter().position(|a| a == "-o").unwrap() + 1;
        std::fs::write(&args[out], args.last().unwrap()).unwrap();
        Ok(ToolOutput::default())
    }
}

/// FFmpeg stand-in. Rendered pieces contain their overlay text, the concat
/// output joins its pieces with `|` in list order, mixing appends `+music`.
#[derive(Default)]
pub struct FakeFfmpeg {
    pub calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ExternalTool for FakeFfmpeg {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn invoke(&self, args: &[String], _timeout: Duration) -> MediaResult<ToolOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        let output = PathBuf::from(args.last().unwrap());
        let first_input = &args[args.iter().position(|a| a == "-i").unwrap() + 1];

        let body = if args.iter().any(|a| a == "concat") {
            // Entries resolve against the list file's directory.
            let list = Path::new(first_input);
            let base = list.parent().unwrap_or_else(|| Path::new(""));
            std::fs::read_to_string(list)
                .unwrap()
                .lines()
                .map(|line| {
                    let piece = line.trim_start_matches("file '").trim_end_matches('\'');
                    std::fs::read_to_string(base.join(piece)).unwrap()
                })
                .collect::<Vec<_>>()
                .join("|")
        } else if args.iter().any(|a| a == "-stream_loop") {
            format!("{}+music", std::fs::read_to_string(first_input).unwrap())
        } else {
            std::fs::read_to_string(output.with_extension("txt")).unwrap_or_default()
        };
        std::fs::write(&output, body).unwrap();
        Ok(ToolOutput::default())
    }
}

pub struct FakeProbe;

#[async_trait]
impl ExternalTool for FakeProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn invoke(&self, _args: &[String], _timeout: Duration) -> MediaResult<ToolOutput> {
        Ok(ToolOutput {
            stdout: r#"{"streams":[{"codec_type":"video","width":1920,"height":1080},{"codec_type":"audio"}],"format":{"duration":"10.0"}}"#.to_string(),
            stderr: String::new(),
        })
    }
}

pub struct Harness {
    pub root: TempDir,
    pub config: WorkerConfig,
    pub ytdlp: Arc<FakeYtdlp>,
    pub ffmpeg: Arc<FakeFfmpeg>,
}

impl Harness {
    pub fn new(ytdlp: FakeYtdlp) -> Self {
        let root = TempDir::new().unwrap();
        let dir = |name: &str| -> PathBuf {
            let path = root.path().join(name);
            std::fs::create_dir_all(&path).unwrap();
            path
        };
        let config = WorkerConfig {
            work_dir: dir("temp"),
            output_dir: dir("output"),
            task_dir: dir("tasks"),
            font_dir: dir("fonts"),
            music_dir: dir("music"),
            credentials_dir: dir("cookies"),
            ..WorkerConfig::default()
        };
        Self {
            root,
            config,
            ytdlp: Arc::new(ytdlp),
            ffmpeg: Arc::new(FakeFfmpeg::default()),
        }
    }

    /// Harness whose directories are relative to a fresh working directory,
    /// as with the default configuration. Changes the process working
    /// directory, so only one such harness may exist per test binary.
    pub fn relative(ytdlp: FakeYtdlp) -> Self {
        let root = TempDir::new().unwrap();
        std::env::set_current_dir(root.path()).unwrap();
        let config = WorkerConfig {
            work_dir: PathBuf::from("videos/temp"),
            output_dir: PathBuf::from("videos/output"),
            task_dir: PathBuf::from("videos/tasks"),
            font_dir: PathBuf::from("fonts"),
            music_dir: PathBuf::from("videos/music"),
            credentials_dir: PathBuf::from("videos/cookies"),
            ..WorkerConfig::default()
        };
        Self {
            root,
            config,
            ytdlp: Arc::new(ytdlp),
            ffmpeg: Arc::new(FakeFfmpeg::default()),
        }
    }

    pub async fn executor(&self) -> TaskExecutor {
        let tools = Toolset {
            ytdlp: self.ytdlp.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: Arc::new(FakeProbe),
        };
        TaskExecutor::bootstrap(self.config.clone(), tools, Arc::new(DisabledSummarizer))
            .await
            .unwrap()
    }

    pub fn output(&self, task: &Task) -> String {
        let name = task.output_ref.as_deref().unwrap();
        std::fs::read_to_string(self.config.output_dir.join(name)).unwrap()
    }
}

/// Submit `request` and collect every snapshot of the task until it is terminal.
pub async fn run_task(executor: &TaskExecutor, request: CompilationRequest) -> (Task, Vec<Task>) {
    let mut events = executor.store().subscribe();
    let submitted = executor.submit(request).await.unwrap();
    assert_eq!(submitted.status, TaskStatus::Processing);

    let mut seen = Vec::new();
    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = events.recv().await.unwrap();
            if task.id != submitted.id {
                continue;
            }
            seen.push(task.clone());
            if task.is_terminal() {
                return task;
            }
        }
    })
    .await
    .expect("task did not finish");
    (finished, seen)
}

pub fn clip(id: &str, text: &str) -> Segment {
    Segment::with_text(format!("https://youtube.com/watch?v={}", id), 5.0, text)
}
