//! A task runs to completion when every configured directory is relative to
//! the working directory, as with the default configuration.
//!
//! Kept in its own binary because it changes the process working directory.

mod common;

use reel_models::{CompilationRequest, TaskStatus};

use common::{clip, run_task, FakeYtdlp, Harness};

#[tokio::test]
async fn test_relative_directories_compile() {
    let harness = Harness::relative(FakeYtdlp::default());
    assert!(harness.config.work_dir.is_relative());
    let executor = harness.executor().await;

    let request = CompilationRequest::new(vec![clip("aaaaaaaaaaa", "A"), clip("bbbbbbbbbbb", "B")]);
    let (task, _) = run_task(&executor, request).await;

    assert_eq!(task.status, TaskStatus::Completed, "{:?}", task.error);
    assert_eq!(
        harness.output(&task),
        "Amazing Video Compilation|A|B|Thanks for watching!"
    );

    assert!(harness
        .root
        .path()
        .join("videos/output")
        .join(task.output_ref.as_deref().unwrap())
        .is_file());
}
