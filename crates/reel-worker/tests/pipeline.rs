//! End-to-end pipeline tests driven by scripted stand-ins for yt-dlp,
//! FFmpeg and FFprobe.

mod common;

use reel_models::{AcquisitionConfig, CompilationRequest, Segment, TaskStatus};
use reel_worker::{TaskStore, INTERRUPTED_MESSAGE};

use common::{clip, run_task, FakeYtdlp, Harness};

#[tokio::test]
async fn test_two_segments_reach_every_checkpoint() {
    let harness = Harness::new(FakeYtdlp::default());
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A"), clip("bbbbbbbbbbb", "B")]);
    let (task, seen) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.message, "Video compilation completed!");

    let progress: Vec<u8> = seen.iter().map(|t| t.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    for checkpoint in [0, 70, 75, 77, 80, 90, 100] {
        assert!(progress.contains(&checkpoint), "missing {} in {:?}", checkpoint, progress);
    }
    assert!(progress
        .iter()
        .filter(|p| **p > 0 && **p < 75)
        .all(|p| *p <= 70));

    let messages: Vec<&str> = seen.iter().map(|t| t.message.as_str()).collect();
    assert!(messages.contains(&"Starting video processing..."));
    assert!(messages.contains(&"Processing clip 2/2"));
    assert!(messages.contains(&"Stitching clips together..."));
    assert!(messages.contains(&"Finalizing audio..."));

    let name = task.output_ref.clone().unwrap();
    assert_eq!(name, format!("compilation_{}.mp4", task.id));
    assert_eq!(
        harness.output(&task),
        "Amazing Video Compilation|A|B|Thanks for watching!"
    );
}

#[tokio::test]
async fn test_segments_keep_input_order() {
    let harness = Harness::new(FakeYtdlp::default());
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![
        clip("ccccccccccc", "C"),
        clip("aaaaaaaaaaa", "A"),
        clip("bbbbbbbbbbb", "B"),
    ]);
    let (task, _) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(
        harness.output(&task),
        "Amazing Video Compilation|C|A|B|Thanks for watching!"
    );

    let fetched: Vec<String> = harness
        .ytdlp
        .calls()
        .iter()
        .map(|args| args.last().unwrap().clone())
        .collect();
    assert_eq!(
        fetched,
        vec![
            "https://youtube.com/watch?v=ccccccccccc",
            "https://youtube.com/watch?v=aaaaaaaaaaa",
            "https://youtube.com/watch?v=bbbbbbbbbbb",
        ]
    );
}

#[tokio::test]
async fn test_working_files_are_removed() {
    let harness = Harness::new(FakeYtdlp::default());
    let executor = harness.executor().await;

    let (task, _) = run_task(&executor, CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")])).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let leftovers = std::fs::read_dir(&harness.config.work_dir).unwrap().count();
    assert_eq!(leftovers, 0);
    let outputs = std::fs::read_dir(&harness.config.output_dir).unwrap().count();
    assert_eq!(outputs, 1);
}

#[tokio::test]
async fn test_degraded_fetch_lets_task_proceed() {
    let harness = Harness::new(FakeYtdlp::scripted(vec![Err(
        "ERROR: [youtube] aaaaaaaaaaa: Unable to download webpage: [SSL: CERTIFICATE_VERIFY_FAILED]"
            .to_string(),
    )]));
    std::fs::write(harness.config.credentials_dir.join("cookies.txt"), "# cookies").unwrap();
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")]).with_acquisition(
        AcquisitionConfig {
            credentials_file: Some("cookies.txt".into()),
            ..AcquisitionConfig::default()
        },
    );
    let (task, _) = run_task(&executor, request).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let calls = harness.ytdlp.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains(&"--cookies".to_string()));
    assert!(!calls[0].contains(&"--no-check-certificates".to_string()));
    assert!(calls[1].contains(&"--no-check-certificates".to_string()));
}

#[tokio::test]
async fn test_exhausted_fetch_fails_task_with_both_diagnostics() {
    let harness = Harness::new(FakeYtdlp::scripted(vec![
        Err("ERROR: [SSL: CERTIFICATE_VERIFY_FAILED] certificate verify failed".to_string()),
        Err("ERROR: Connection reset by peer".to_string()),
    ]));
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A"), clip("bbbbbbbbbbb", "B")]);
    let (task, _) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.progress < 75);
    let error = task.error.unwrap();
    assert!(error.starts_with("Failed to download clip"), "{}", error);
    assert!(error.contains("CERTIFICATE_VERIFY_FAILED"), "{}", error);
    assert!(error.contains("Connection reset by peer"), "{}", error);
    assert!(!error.contains(harness.root.path().to_str().unwrap()));

    assert_eq!(harness.ytdlp.calls().len(), 2);
    assert!(harness.ffmpeg.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(&harness.config.output_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unavailable_source_skips_degraded_attempt() {
    let harness = Harness::new(FakeYtdlp::scripted(vec![Err(
        "ERROR: [youtube] aaaaaaaaaaa: Video unavailable".to_string(),
    )]));
    let executor = harness.executor().await;

    let (task, _) = run_task(&executor, CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")])).await;
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.unwrap().contains("Video unavailable"));
    assert_eq!(harness.ytdlp.calls().len(), 1);
}

#[tokio::test]
async fn test_keywords_fall_back_without_summarizer() {
    let harness = Harness::new(FakeYtdlp::default());
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![Segment::with_keywords(
        "https://youtube.com/watch?v=aaaaaaaaaaa",
        0.0,
        "rolex gold watch luxury",
    )]);
    let (task, _) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(
        harness.output(&task),
        "Amazing Video Compilation|rolex gold watch|Thanks for watching!"
    );
}

#[tokio::test]
async fn test_background_music_is_mixed() {
    let harness = Harness::new(FakeYtdlp::default());
    std::fs::write(harness.config.music_dir.join("track.mp3"), "music").unwrap();
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")]).with_music("track.mp3");
    let (task, seen) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(seen.iter().any(|t| t.message == "Adding background music..."));
    assert!(harness.output(&task).ends_with("+music"));
}

#[tokio::test]
async fn test_missing_music_fails_before_download() {
    let harness = Harness::new(FakeYtdlp::default());
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")]).with_music("missing.mp3");
    let (task, _) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.error.as_deref(), Some("Background music not found: missing.mp3"));
    assert!(harness.ytdlp.calls().is_empty());
}

#[tokio::test]
async fn test_restart_fails_interrupted_tasks() {
    let harness = Harness::new(FakeYtdlp::default());

    let id = {
        let store = TaskStore::open(&harness.config.task_dir).await.unwrap();
        let task = store
            .create(CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")]))
            .await
            .unwrap();
        store.advance(&task.id, 42, "Processing clip 1/1").await.unwrap();
        task.id
    };

    let executor = harness.executor().await;
    let task = executor.store().get(&id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.progress, 42);
    assert_eq!(task.error.as_deref(), Some(INTERRUPTED_MESSAGE));
}

#[tokio::test]
async fn test_restart_keeps_state_when_recovery_disabled() {
    let mut harness = Harness::new(FakeYtdlp::default());
    harness.config.fail_interrupted_on_start = false;

    let id = {
        let store = TaskStore::open(&harness.config.task_dir).await.unwrap();
        let task = store
            .create(CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A")]))
            .await
            .unwrap();
        store.advance(&task.id, 42, "Processing clip 1/1").await.unwrap();
        task.id
    };

    let executor = harness.executor().await;
    let task = executor.store().get(&id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Processing);
    assert_eq!(task.progress, 42);
    assert_eq!(task.message, "Processing clip 1/1");
}
