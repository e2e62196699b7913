//! Task executor.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use reel_models::{CompilationRequest, Task};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{CompilationPipeline, Toolset};
use crate::store::{TaskStore, INTERRUPTED_MESSAGE};
use crate::summary::Summarizer;

/// Accepts compilation requests and runs them in the background.
///
/// Each submission becomes an independent tokio task; at most
/// `max_concurrent_tasks` pipelines run at once, the rest wait for a permit.
#[derive(Clone)]
pub struct TaskExecutor {
    store: Arc<TaskStore>,
    pipeline: Arc<CompilationPipeline>,
    task_semaphore: Arc<Semaphore>,
}

impl TaskExecutor {
    pub fn new(store: Arc<TaskStore>, pipeline: CompilationPipeline) -> Self {
        let permits = pipeline.config().max_concurrent_tasks.max(1);
        Self {
            store,
            pipeline: Arc::new(pipeline),
            task_semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Create directories, load the task store and build the pipeline.
    pub async fn bootstrap(
        config: WorkerConfig,
        tools: Toolset,
        summarizer: Arc<dyn Summarizer>,
    ) -> WorkerResult<Self> {
        for dir in config.writable_dirs() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                WorkerError::config(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        let store = Arc::new(TaskStore::open(&config.task_dir).await?);
        if config.fail_interrupted_on_start {
            let recovered = store.recover_interrupted(INTERRUPTED_MESSAGE).await?;
            metrics::record_tasks_recovered(recovered.len());
        }

        info!(
            "Starting task executor with {} max concurrent tasks",
            config.max_concurrent_tasks
        );
        let pipeline = CompilationPipeline::new(config, tools, summarizer);
        Ok(Self::new(store, pipeline))
    }

    /// Persist a new task and start it in the background.
    pub async fn submit(&self, request: CompilationRequest) -> WorkerResult<Task> {
        let task = self.store.create(request).await?;
        metrics::record_task_submitted(task.request.format.as_str());

        let handle = self.store.handle(task.id.clone());
        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.task_semaphore);
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(task_id = %handle.id(), "Task semaphore closed: {}", e);
                    let _ = handle.fail("Worker is shutting down").await;
                    return;
                }
            };
            pipeline.execute(handle).await;
        });

        Ok(task)
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn config(&self) -> &WorkerConfig {
        self.pipeline.config()
    }

    /// Tasks currently holding a permit.
    pub fn running(&self) -> usize {
        self.config()
            .max_concurrent_tasks
            .max(1)
            .saturating_sub(self.task_semaphore.available_permits())
    }
}
