//! Per-task working directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use reel_models::TaskId;

/// Scratch directory owned by one task.
///
/// Removed on drop unless cleanup is disabled, in which case the directory
/// is kept for inspection.
pub struct TaskWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl TaskWorkspace {
    pub fn create(root: &Path, task_id: &TaskId, cleanup: bool) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("task_{}_", task_id))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        let dir = if cleanup {
            Some(dir)
        } else {
            debug!(path = %path.display(), "Keeping task workspace after completion");
            let _ = dir.into_path();
            None
        };
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory for one segment's download, deleted when dropped.
    pub fn segment_scratch(&self, index: usize) -> std::io::Result<TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("segment_{}_", index))
            .tempdir_in(&self.path)
    }

    /// Rendered segment output.
    pub fn rendered_segment(&self, index: usize) -> PathBuf {
        self.path.join(format!("segment_{}.mp4", index))
    }

    pub fn intro(&self) -> PathBuf {
        self.path.join("intro.mp4")
    }

    pub fn outro(&self) -> PathBuf {
        self.path.join("outro.mp4")
    }

    pub fn is_managed(&self) -> bool {
        self.dir.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = TaskWorkspace::create(root.path(), &TaskId::new(), true).unwrap();
            assert!(ws.path().is_dir());
            assert!(ws.is_managed());
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_kept_without_cleanup() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = TaskWorkspace::create(root.path(), &TaskId::new(), false).unwrap();
            ws.path().to_path_buf()
        };
        assert!(path.is_dir());
    }

    #[test]
    fn test_segment_scratch_is_scoped() {
        let root = TempDir::new().unwrap();
        let ws = TaskWorkspace::create(root.path(), &TaskId::new(), true).unwrap();
        let scratch = ws.segment_scratch(0).unwrap();
        let scratch_path = scratch.path().to_path_buf();
        std::fs::write(scratch_path.join("source_0.mp4"), b"x").unwrap();
        drop(scratch);
        assert!(!scratch_path.exists());
        assert!(ws.path().is_dir());
    }
}
