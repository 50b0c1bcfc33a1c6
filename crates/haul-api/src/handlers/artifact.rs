//! Artifact delivery handler.
//!
//! Artifacts are single-serve: claiming the record removes it, so a second
//! fetch can never succeed, and the file itself is deleted once serving
//! starts.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Response, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use haul_models::RequestId;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// GET /api/artifact/:request_id
///
/// Stream the finished file for a completed request, exactly once.
///
/// Returns:
/// - 200: File stream with Content-Disposition
/// - 404: Not ready, already served, or expired
pub async fn fetch_artifact(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Response<Body>> {
    let id = RequestId::from_string(request_id);

    // Atomically claim the record; concurrent fetches see nothing.
    let record = state
        .artifacts
        .take(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found or expired"))?;

    let file = match tokio::fs::File::open(&record.path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                request_id = %id,
                path = %record.path.display(),
                "Artifact record points at a missing file"
            );
            return Err(ApiError::not_found("File not found or expired"));
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Failed to open artifact: {}",
                e
            )))
        }
    };

    info!(
        request_id = %id,
        filename = %record.filename,
        size = record.size,
        "Serving artifact"
    );

    // The open handle keeps the bytes readable while this unlinks the
    // request directory underneath the stream.
    let cleanup_dir = record.path.parent().map(|p| p.to_path_buf());
    let cleanup_id = id.clone();
    tokio::spawn(async move {
        if let Some(dir) = cleanup_dir {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!(
                    request_id = %cleanup_id,
                    error = %e,
                    "Failed to remove served artifact directory"
                );
            }
        }
    });

    metrics::record_artifact_served();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.content_type.as_str())
        .header(header::CONTENT_LENGTH, record.size)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&record.filename),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// Build a Content-Disposition value with an ASCII fallback name plus an
/// RFC 5987 encoded form when the filename needs it.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == filename {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_disposition() {
        assert_eq!(
            content_disposition("song.mp3"),
            "attachment; filename=\"song.mp3\""
        );
    }

    #[test]
    fn test_unicode_disposition_gets_encoded_form() {
        let value = content_disposition("Canción.mp3");
        assert!(value.starts_with("attachment; filename=\"Canci_n.mp3\""));
        assert!(value.contains("filename*=UTF-8''Canci%C3%B3n.mp3"));
    }

    #[test]
    fn test_quotes_are_sanitized() {
        let value = content_disposition("a\"b.mp3");
        assert!(value.contains("filename=\"a_b.mp3\""));
    }
}
