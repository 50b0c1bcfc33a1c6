//! Working-directory layout and cleanup.
//!
//! Each request owns `{root}/{request_id}/` with per-item download
//! directories under `items/{index}/`. The finished artifact is staged
//! directly in the request directory so item scratch space can be
//! dropped without touching it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

use haul_models::RequestId;

use crate::error::MediaResult;

pub fn request_dir(root: &Path, id: &RequestId) -> PathBuf {
    root.join(id.as_str())
}

pub fn item_dir(root: &Path, id: &RequestId, index: usize) -> PathBuf {
    request_dir(root, id).join("items").join(index.to_string())
}

/// Remove per-item scratch space, keeping the staged artifact.
pub async fn remove_items_dir(root: &Path, id: &RequestId) -> MediaResult<()> {
    let items = request_dir(root, id).join("items");
    match fs::remove_dir_all(&items).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove everything a request wrote, artifact included.
pub async fn remove_request_dir(root: &Path, id: &RequestId) -> MediaResult<()> {
    let dir = request_dir(root, id);
    match fs::remove_dir_all(&dir).await {
        Ok(()) => {
            debug!(request_id = %id, "removed request directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Delete request directories older than `max_age`.
///
/// Run at worker startup so directories orphaned by a crash do not pile
/// up. Returns the number of directories removed.
pub async fn sweep_stale(root: &Path, max_age: Duration) -> MediaResult<usize> {
    if !root.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat entry, skipping");
                continue;
            }
        };

        let age = modified.elapsed().unwrap_or(Duration::ZERO);
        if age > max_age {
            match fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "swept stale request directory");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to sweep directory"),
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn item_dirs_nest_under_the_request() {
        let id = RequestId::from_string("req-1".to_string());
        let root = Path::new("/tmp/haul");
        assert_eq!(request_dir(root, &id), Path::new("/tmp/haul/req-1"));
        assert_eq!(item_dir(root, &id, 2), Path::new("/tmp/haul/req-1/items/2"));
    }

    #[tokio::test]
    async fn removing_items_keeps_the_artifact() {
        let root = tempfile::tempdir().unwrap();
        let id = RequestId::new();

        let items = item_dir(root.path(), &id, 0);
        fs::create_dir_all(&items).await.unwrap();
        fs::write(items.join("track.mp3"), b"audio").await.unwrap();
        let artifact = request_dir(root.path(), &id).join("bundle.zip");
        fs::write(&artifact, b"zip").await.unwrap();

        remove_items_dir(root.path(), &id).await.unwrap();

        assert!(!items.exists());
        assert!(artifact.exists());

        // Idempotent when already gone.
        remove_items_dir(root.path(), &id).await.unwrap();
        remove_request_dir(root.path(), &id).await.unwrap();
        assert!(!artifact.exists());
        remove_request_dir(root.path(), &id).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_removes_only_old_directories() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("stale-request"))
            .await
            .unwrap();
        fs::write(root.path().join("loose-file"), b"x").await.unwrap();

        // Everything is fresh, a day-long horizon keeps it.
        let removed = sweep_stale(root.path(), Duration::from_secs(86_400))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert!(root.path().join("stale-request").exists());

        // A zero horizon reaps any directory with measurable age.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = sweep_stale(root.path(), Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!root.path().join("stale-request").exists());
        assert!(root.path().join("loose-file").exists());

        let missing = root.path().join("nope");
        assert_eq!(sweep_stale(&missing, Duration::ZERO).await.unwrap(), 0);
    }
}
