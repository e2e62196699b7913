//! Durable task store.
//!
//! Every task lives in memory behind its own lock and on disk as
//! `<task_dir>/<task_id>.json`. Mutations are persisted before they become
//! visible to readers; a failed write leaves the in-memory record untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use reel_models::{CompilationRequest, Task, TaskId, TaskStatus, TransitionError};

use crate::error::{StoreError, StoreResult};

/// Message recorded on tasks found `processing` after a restart.
pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted by a service restart";

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";
const EVENT_CAPACITY: usize = 256;

/// Owns all task records.
pub struct TaskStore {
    dir: PathBuf,
    tasks: RwLock<HashMap<TaskId, Arc<Mutex<Task>>>>,
    events: broadcast::Sender<Task>,
}

impl TaskStore {
    /// Open the store rooted at `dir`, loading every persisted record.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let mut tasks = HashMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(TEMP_EXTENSION) => {
                    debug!(path = %path.display(), "Removing stale task temp file");
                    if let Err(e) = fs::remove_file(&path).await {
                        warn!(path = %path.display(), "Failed to remove stale temp file: {}", e);
                    }
                }
                Some(RECORD_EXTENSION) => match load_record(&path).await {
                    Ok(task) => {
                        tasks.insert(task.id.clone(), Arc::new(Mutex::new(task)));
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "Skipping unreadable task record: {}", e);
                    }
                },
                _ => {}
            }
        }

        info!(dir = %dir.display(), count = tasks.len(), "Task store loaded");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            dir,
            tasks: RwLock::new(tasks),
            events,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create and persist a new `processing` task.
    pub async fn create(&self, request: CompilationRequest) -> StoreResult<Task> {
        let task = Task::new(request);
        self.persist(&task).await?;

        self.tasks
            .write()
            .await
            .insert(task.id.clone(), Arc::new(Mutex::new(task.clone())));
        let _ = self.events.send(task.clone());

        debug!(task_id = %task.id, "Task created");
        Ok(task)
    }

    /// Snapshot of a task.
    pub async fn get(&self, id: &TaskId) -> StoreResult<Task> {
        let record = self.record(id).await?;
        let task = record.lock().await;
        Ok(task.clone())
    }

    /// Number of known tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn advance(&self, id: &TaskId, progress: u8, message: &str) -> StoreResult<Task> {
        self.mutate(id, |task| task.advance(progress, message)).await
    }

    pub async fn fail(&self, id: &TaskId, error: &str) -> StoreResult<Task> {
        self.mutate(id, |task| task.fail(error)).await
    }

    pub async fn complete(&self, id: &TaskId, output_ref: &str) -> StoreResult<Task> {
        self.mutate(id, |task| task.complete(output_ref)).await
    }

    /// Fail every task still marked `processing`.
    ///
    /// Called once at start-up, before any new work is accepted: such tasks
    /// belong to a previous process and will never make progress.
    pub async fn recover_interrupted(&self, message: &str) -> StoreResult<Vec<TaskId>> {
        let records: Vec<(TaskId, Arc<Mutex<Task>>)> = self
            .tasks
            .read()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), Arc::clone(record)))
            .collect();

        let mut recovered = Vec::new();
        for (id, record) in records {
            let status = record.lock().await.status;
            if status != TaskStatus::Processing {
                continue;
            }
            match self.mutate(&id, |task| task.fail(message)).await {
                Ok(_) => recovered.push(id),
                Err(StoreError::Terminal { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if !recovered.is_empty() {
            warn!(count = recovered.len(), "Failed tasks interrupted by restart");
        }
        Ok(recovered)
    }

    /// Stream of task snapshots, one per successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<Task> {
        self.events.subscribe()
    }

    /// Narrow update capability for one task.
    pub fn handle(self: &Arc<Self>, id: TaskId) -> TaskHandle {
        TaskHandle {
            id,
            store: Arc::clone(self),
        }
    }

    async fn record(&self, id: &TaskId) -> StoreResult<Arc<Mutex<Task>>> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Apply `change` to a copy, persist the copy, then publish it.
    async fn mutate<F>(&self, id: &TaskId, change: F) -> StoreResult<Task>
    where
        F: FnOnce(&mut Task) -> Result<(), TransitionError>,
    {
        let record = self.record(id).await?;
        let mut current = record.lock().await;

        let mut next = current.clone();
        change(&mut next).map_err(|TransitionError::Terminal(status)| StoreError::Terminal {
            id: id.clone(),
            status,
        })?;

        self.persist(&next).await?;
        *current = next.clone();
        drop(current);

        let _ = self.events.send(next.clone());
        Ok(next)
    }

    fn record_path(&self, id: &TaskId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Write to a unique temp file in the same directory, sync, rename.
    async fn persist(&self, task: &Task) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(task)?;
        let target = self.record_path(&task.id);
        let temp = self
            .dir
            .join(format!(".{}.{}.{}", task.id, Uuid::new_v4().simple(), TEMP_EXTENSION));

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp, &target).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn load_record(path: &Path) -> StoreResult<Task> {
    let bytes = fs::read(path).await?;
    let task: Task = serde_json::from_slice(&bytes)?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if stem != task.id.as_str() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("record id {} does not match file name", task.id),
        )));
    }
    Ok(task)
}

/// Update capability for a single task.
///
/// Stage components get one of these instead of the store.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    store: Arc<TaskStore>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub async fn get(&self) -> StoreResult<Task> {
        self.store.get(&self.id).await
    }

    pub async fn advance(&self, progress: u8, message: &str) -> StoreResult<Task> {
        self.store.advance(&self.id, progress, message).await
    }

    pub async fn fail(&self, error: &str) -> StoreResult<Task> {
        self.store.fail(&self.id, error).await
    }

    pub async fn complete(&self, output_ref: &str) -> StoreResult<Task> {
        self.store.complete(&self.id, output_ref).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::Segment;
    use tempfile::TempDir;

    fn request() -> CompilationRequest {
        CompilationRequest::new(vec![Segment::with_text(
            "https://youtube.com/watch?v=aaaaaaaaaaa",
            0.0,
            "A",
        )])
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();

        let task = store.create(request()).await.unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.progress, 0);

        let loaded = store.get(&task.id).await.unwrap();
        assert_eq!(loaded, task);
        assert!(dir.path().join(format!("{}.json", task.id)).is_file());
    }

    #[tokio::test]
    async fn test_get_unknown_task() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();

        let err = store.get(&TaskId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();
        let task = store.create(request()).await.unwrap();

        store.advance(&task.id, 40, "Processing clip 2/3").await.unwrap();
        let task = store.advance(&task.id, 20, "late update").await.unwrap();
        assert_eq!(task.progress, 40);

        let task = store.advance(&task.id, 250, "overflow").await.unwrap();
        assert_eq!(task.progress, 100);
    }

    #[tokio::test]
    async fn test_terminal_tasks_are_immutable() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();
        let task = store.create(request()).await.unwrap();

        store.advance(&task.id, 30, "working").await.unwrap();
        let failed = store.fail(&task.id, "boom").await.unwrap();
        assert_eq!(failed.status, TaskStatus::Error);
        assert_eq!(failed.progress, 30);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let err = store.complete(&task.id, "out.mp4").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Terminal {
                status: TaskStatus::Error,
                ..
            }
        ));
        assert_eq!(store.get(&task.id).await.unwrap(), failed);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = TaskStore::open(dir.path()).await.unwrap();
            let task = store.create(request()).await.unwrap();
            store.advance(&task.id, 35, "Processing clip 1/2").await.unwrap();
            task.id
        };

        let store = TaskStore::open(dir.path()).await.unwrap();
        let task = store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.progress, 35);
        assert_eq!(task.message, "Processing clip 1/2");
    }

    #[tokio::test]
    async fn test_open_skips_bad_records_and_temp_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("garbage.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join(".x.abc.tmp"), b"partial").unwrap();

        let store = TaskStore::open(dir.path()).await.unwrap();
        assert!(store.is_empty().await);
        assert!(!dir.path().join(".x.abc.tmp").exists());
    }

    #[tokio::test]
    async fn test_recover_interrupted() {
        let dir = TempDir::new().unwrap();
        let (running, done) = {
            let store = TaskStore::open(dir.path()).await.unwrap();
            let running = store.create(request()).await.unwrap();
            store.advance(&running.id, 50, "halfway").await.unwrap();
            let done = store.create(request()).await.unwrap();
            store.complete(&done.id, "compilation.mp4").await.unwrap();
            (running.id, done.id)
        };

        let store = TaskStore::open(dir.path()).await.unwrap();
        let recovered = store.recover_interrupted(INTERRUPTED_MESSAGE).await.unwrap();
        assert_eq!(recovered, vec![running.clone()]);

        let task = store.get(&running).await.unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.progress, 50);
        assert_eq!(task.error.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(
            store.get(&done).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_every_mutation() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TaskStore::open(dir.path()).await.unwrap());
        let mut events = store.subscribe();

        let task = store.create(request()).await.unwrap();
        let handle = store.handle(task.id.clone());
        handle.advance(10, "a").await.unwrap();
        handle.complete("out.mp4").await.unwrap();

        let seen: Vec<u8> = [
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
        ]
        .iter()
        .map(|t| t.progress)
        .collect();
        assert_eq!(seen, vec![0, 10, 100]);
    }
}
