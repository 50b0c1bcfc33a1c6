//! Artifact records for completed jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::id::RequestId;

/// Pointer to the finished file of a completed job.
///
/// Created by the worker on success, consumed exactly once by the artifact
/// endpoint, then the file is deleted. Lifecycle: created, served, deleted,
/// or expired unserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub request_id: RequestId,

    /// Absolute filesystem location of the deliverable.
    pub path: PathBuf,

    /// Suggested filename for Content-Disposition.
    pub filename: String,

    /// MIME type for the response.
    pub content_type: String,

    /// File size in bytes.
    pub size: u64,

    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    pub fn new(request_id: RequestId, path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.bin", request_id));
        let content_type = content_type_for(&path).to_string();
        Self {
            request_id,
            path,
            filename,
            content_type,
            size,
            created_at: Utc::now(),
        }
    }
}

/// MIME type from the file extension, `application/octet-stream` otherwise.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
