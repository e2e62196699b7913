//! Filesystem helpers: cross-device moves and confined path lookup.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// EXDEV on Linux and macOS.
const EXDEV: i32 = 18;

/// Move a file from `src` to `dst`, replacing `dst`.
///
/// A plain rename is tried first. Across filesystems the file is copied to a
/// uniquely named staging file next to `dst` and renamed into place, so `dst`
/// never appears half-written.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            debug!(
                "Cross-device rename, falling back to copy: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = staging_path(dst);

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(
            "Failed to remove source after cross-device move: {}: {}",
            src.display(),
            e
        );
    }
    Ok(())
}

/// Hidden sibling path used while publishing `dst`.
pub fn staging_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dst.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Resolve a user-supplied file name inside `dir`.
///
/// Only a single plain path component is accepted; anything that could
/// escape `dir` is rejected. The file must exist.
pub fn resolve_within(dir: &Path, name: &str) -> MediaResult<PathBuf> {
    let name = name.trim();
    let candidate = Path::new(name);
    let mut components = candidate.components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if name.is_empty() || !single_normal {
        return Err(MediaError::invalid_input(format!(
            "'{}' is not a plain file name",
            name
        )));
    }

    let path = dir.join(candidate);
    if !path.is_file() {
        return Err(MediaError::FileNotFound(PathBuf::from(name)));
    }
    Ok(path)
}

/// Remove a file if present.
pub async fn remove_if_exists(path: &Path) -> MediaResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
