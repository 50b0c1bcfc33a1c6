//! Download submission handler.

use std::collections::HashMap;

use axum::extract::State;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use haul_models::{DownloadRequest, ItemOverride, UserConfig};
use haul_queue::DownloadJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::validate_source;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Form fields submitted by the download page.
///
/// Everything arrives as strings; `selected_urls` and the two config fields
/// are JSON-encoded by the client.
#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    /// Single URL or free-text search query.
    #[serde(default)]
    pub url: Option<String>,

    /// "true" when the client submits a playlist selection.
    #[serde(default)]
    pub is_playlist_mode: Option<String>,

    /// JSON array of selected item URLs (playlist mode only).
    #[serde(default)]
    pub selected_urls: Option<String>,

    /// JSON object with the user's global settings.
    #[serde(default)]
    pub user_config: Option<String>,

    /// JSON object of per-item overrides keyed by URL.
    #[serde(default)]
    pub item_configs: Option<String>,
}

/// Response for an accepted download.
#[derive(Debug, Serialize)]
pub struct DownloadAccepted {
    /// Identifier for the progress stream and artifact endpoints.
    pub request_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/download
///
/// Validate the submission, seed its progress record, and enqueue it.
///
/// Returns:
/// - 200: Accepted, body carries the request ID
/// - 400: Missing or invalid source / playlist selection
pub async fn download(
    State(state): State<AppState>,
    Form(form): Form<DownloadForm>,
) -> ApiResult<Json<DownloadAccepted>> {
    let playlist_mode = form.is_playlist_mode.as_deref() == Some("true");
    let config = parse_user_config(form.user_config.as_deref());
    let overrides = parse_item_overrides(form.item_configs.as_deref());

    let request = if playlist_mode {
        let selection = parse_selection(form.selected_urls.as_deref())
            .ok_or_else(|| ApiError::bad_request("Error in playlist data."))?;
        if selection.iter().all(|u| u.trim().is_empty()) {
            return Err(ApiError::bad_request(
                "Select at least one item from the playlist.",
            ));
        }
        DownloadRequest::playlist(selection, config).with_overrides(overrides)
    } else {
        let source = form
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("Please enter a URL or song name."))?;
        let source = validate_source(source)
            .into_result()
            .map_err(ApiError::bad_request)?;
        DownloadRequest::new(source, config).with_overrides(overrides)
    };

    let job = DownloadJob::new(request);
    let request_id = job.request_id.clone();

    info!(
        request_id = %request_id,
        playlist = playlist_mode,
        items = job.item_count(),
        "Accepted download request"
    );

    // Seed progress before enqueueing so the stream never observes a gap
    // between acceptance and the worker's first update.
    state
        .progress
        .seed(&request_id, job.item_count() as u32)
        .await?;

    if let Err(e) = state.queue.enqueue(&job).await {
        // The job never reached the queue; drop the seeded record.
        if let Err(cleanup) = state.progress.remove(&request_id).await {
            warn!(
                request_id = %request_id,
                error = %cleanup,
                "Failed to remove orphaned progress record"
            );
        }
        return Err(e.into());
    }

    metrics::record_job_enqueued(if playlist_mode { "playlist" } else { "single" });

    Ok(Json(DownloadAccepted {
        request_id: request_id.to_string(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse the JSON-encoded playlist selection.
/// Missing or blank input is an empty selection; malformed JSON is None.
fn parse_selection(raw: Option<&str>) -> Option<Vec<String>> {
    match raw {
        None => Some(Vec::new()),
        Some(s) if s.trim().is_empty() => Some(Vec::new()),
        Some(s) => serde_json::from_str(s).ok(),
    }
}

/// Parse the user's global settings, falling back to defaults on bad input.
fn parse_user_config(raw: Option<&str>) -> UserConfig {
    raw.and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
        .map(|v| UserConfig::sanitized(&v))
        .unwrap_or_default()
}

/// Parse per-item overrides, falling back to none on bad input.
fn parse_item_overrides(raw: Option<&str>) -> HashMap<String, ItemOverride> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(None), Some(Vec::new()));
        assert_eq!(parse_selection(Some("  ")), Some(Vec::new()));
        assert_eq!(
            parse_selection(Some(r#"["https://youtu.be/a","https://youtu.be/b"]"#)),
            Some(vec![
                "https://youtu.be/a".to_string(),
                "https://youtu.be/b".to_string()
            ])
        );
        assert_eq!(parse_selection(Some("not json")), None);
        assert_eq!(parse_selection(Some(r#"{"a":1}"#)), None);
    }

    #[test]
    fn test_parse_user_config_falls_back_to_defaults() {
        assert_eq!(parse_user_config(None), UserConfig::default());
        assert_eq!(parse_user_config(Some("{broken")), UserConfig::default());

        let cfg = parse_user_config(Some(r#"{"quality":"max","download_video":true}"#));
        assert_eq!(cfg.quality, haul_models::Quality::Max);
        assert!(cfg.download_video);
    }

    #[test]
    fn test_parse_item_overrides() {
        assert!(parse_item_overrides(None).is_empty());
        assert!(parse_item_overrides(Some("oops")).is_empty());

        let overrides = parse_item_overrides(Some(
            r#"{"https://youtu.be/a":{"format":"audio","fileFormat":"flac"}}"#,
        ));
        assert_eq!(overrides.len(), 1);
        assert_eq!(
            overrides["https://youtu.be/a"].file_format.as_deref(),
            Some("flac")
        );
    }
}
