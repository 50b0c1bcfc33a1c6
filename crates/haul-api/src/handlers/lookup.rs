//! Metadata lookup handlers backing the submission form.
//!
//! These endpoints are probe-only: nothing here enqueues work. They answer
//! the form's questions (what is this URL, what is in this playlist, what
//! does this query match, how much would SponsorBlock trim).

use axum::extract::State;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use haul_media::{
    extract_video_id, is_playlist_url, media_info, playlist_info, search, MediaInfo, PlaylistEntry,
};
use haul_models::{format_duration, SponsorCategory};

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_video_id;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Form with a single `url` field.
#[derive(Debug, Deserialize)]
pub struct UrlForm {
    #[serde(default)]
    pub url: Option<String>,
}

/// Form with a single `query` field.
#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub query: Option<String>,
}

/// SponsorBlock lookup form. `categories` is a JSON array of category names;
/// `duration` is the video length in seconds.
#[derive(Debug, Deserialize)]
pub struct SponsorBlockForm {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Probed metadata for one playable source.
#[derive(Debug, Serialize)]
pub struct MediaPayload {
    pub title: String,
    pub uploader: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub duration_secs: f64,
    /// Duration formatted `M:SS` for display.
    pub duration_str: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

impl From<MediaInfo> for MediaPayload {
    fn from(info: MediaInfo) -> Self {
        let video_id = if is_valid_video_id(&info.id) {
            Some(info.id.clone())
        } else {
            extract_video_id(&info.webpage_url)
        };
        Self {
            title: info.title,
            uploader: info.uploader,
            thumbnail: info.thumbnail,
            duration_secs: info.duration,
            duration_str: format_duration(info.duration),
            url: info.webpage_url,
            video_id,
        }
    }
}

/// Response for `POST /api/media_info`.
#[derive(Debug, Serialize)]
pub struct MediaInfoResponse {
    pub success: bool,
    pub is_playlist: bool,
    #[serde(flatten)]
    pub media: Option<MediaPayload>,
}

/// Response for `POST /api/playlist_info`.
#[derive(Debug, Serialize)]
pub struct PlaylistInfoResponse {
    pub success: bool,
    pub playlist: PlaylistPayload,
}

#[derive(Debug, Serialize)]
pub struct PlaylistPayload {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
    pub total: usize,
}

/// Response for `POST /api/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub result: MediaPayload,
}

/// Response for `POST /api/sponsorblock_info`.
#[derive(Debug, Serialize)]
pub struct SponsorBlockResponse {
    pub success: bool,
    pub has_segments: bool,
    pub total_duration_removed: f64,
    pub adjusted_duration: f64,
    /// Adjusted duration formatted `M:SS`.
    pub adjusted_duration_str: String,
    pub categories_found: Vec<String>,
    pub segment_count: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/media_info
///
/// Probe a URL for its metadata.
///
/// Returns:
/// - 200: `{success, is_playlist: true}` for playlist URLs, otherwise the
///   probed title/uploader/duration/thumbnail
/// - 400: Empty URL or failed probe
pub async fn media_info_handler(Form(form): Form<UrlForm>) -> ApiResult<Json<MediaInfoResponse>> {
    let url = form
        .url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Empty URL"))?;

    if is_playlist_url(url) {
        return Ok(Json(MediaInfoResponse {
            success: true,
            is_playlist: true,
            media: None,
        }));
    }

    let info = media_info(url).await.map_err(|e| {
        warn!(url = %url, error = %e, "Media probe failed");
        ApiError::bad_request("Could not get video information.")
    })?;

    Ok(Json(MediaInfoResponse {
        success: true,
        is_playlist: false,
        media: Some(info.into()),
    }))
}

/// POST /api/playlist_info
///
/// List the entries of a playlist URL for the selection UI.
///
/// Returns:
/// - 200: `{success, playlist: {title, entries, total}}`
/// - 400: Not a playlist URL, empty playlist, or failed probe
pub async fn playlist_info_handler(
    Form(form): Form<UrlForm>,
) -> ApiResult<Json<PlaylistInfoResponse>> {
    let url = form
        .url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Empty URL"))?;

    if !is_playlist_url(url) {
        return Err(ApiError::bad_request("Not a playlist URL"));
    }

    let playlist = playlist_info(url).await.map_err(|e| {
        warn!(url = %url, error = %e, "Playlist probe failed");
        ApiError::bad_request("Could not get playlist information.")
    })?;

    if playlist.entries.is_empty() {
        return Err(ApiError::bad_request(
            "The playlist is empty or has no accessible videos.",
        ));
    }

    info!(url = %url, entries = playlist.entries.len(), "Playlist probed");

    let total = playlist.entries.len();
    Ok(Json(PlaylistInfoResponse {
        success: true,
        playlist: PlaylistPayload {
            title: playlist.title,
            entries: playlist.entries,
            total,
        },
    }))
}

/// POST /api/search
///
/// Resolve a free-text query to its first YouTube hit.
///
/// Returns:
/// - 200: `{success, result}` with the first match
/// - 400: No query provided
/// - 404: No results found
pub async fn search_handler(Form(form): Form<SearchForm>) -> ApiResult<Json<SearchResponse>> {
    let query = form
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("No query provided"))?;

    let results = search(query, 1).await.map_err(|e| {
        warn!(query = %query, error = %e, "Search failed");
        ApiError::not_found("No results found")
    })?;
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("No results found"))?;

    info!(query = %query, title = %first.title, "Search resolved");

    Ok(Json(SearchResponse {
        success: true,
        result: first.into(),
    }))
}

/// POST /api/sponsorblock_info
///
/// Aggregate SponsorBlock segments for a video into an adjusted duration.
///
/// A video with no known segments (including a 404 from the API) yields an
/// empty aggregate, never an error.
///
/// Returns:
/// - 200: `{success, has_segments, total_duration_removed, ...}`
/// - 400: Missing or malformed video ID
pub async fn sponsorblock_info_handler(
    State(state): State<AppState>,
    Form(form): Form<SponsorBlockForm>,
) -> ApiResult<Json<SponsorBlockResponse>> {
    let video_id = form
        .video_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Video ID required"))?;

    if !is_valid_video_id(video_id) {
        return Err(ApiError::bad_request("Invalid video ID"));
    }

    let categories = parse_categories(form.categories.as_deref());
    let duration = form
        .duration
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    // Lookup failures degrade to "no segments"; this endpoint only ever
    // improves the preview, it must not block the form.
    let summary = match state.sponsorblock.summarize(video_id, &categories).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(video_id = %video_id, error = %e, "SponsorBlock lookup failed");
            return Ok(Json(empty_aggregate(duration)));
        }
    };

    let total_removed = round2(summary.total_seconds);
    let adjusted = round2((duration - summary.total_seconds).max(0.0));

    Ok(Json(SponsorBlockResponse {
        success: true,
        has_segments: summary.segment_count > 0,
        total_duration_removed: total_removed,
        adjusted_duration: adjusted,
        adjusted_duration_str: format_duration(adjusted),
        categories_found: summary.categories,
        segment_count: summary.segment_count,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse the JSON category list; anything missing, malformed, or empty after
/// dropping unknown names means "all categories".
fn parse_categories(raw: Option<&str>) -> Vec<SponsorCategory> {
    let parsed: Vec<SponsorCategory> = raw
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if parsed.is_empty() {
        SponsorCategory::ALL.to_vec()
    } else {
        parsed
    }
}

fn empty_aggregate(duration: f64) -> SponsorBlockResponse {
    let duration = round2(duration.max(0.0));
    SponsorBlockResponse {
        success: true,
        has_segments: false,
        total_duration_removed: 0.0,
        adjusted_duration: duration,
        adjusted_duration_str: format_duration(duration),
        categories_found: Vec::new(),
        segment_count: 0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categories() {
        assert_eq!(parse_categories(None), SponsorCategory::ALL.to_vec());
        assert_eq!(
            parse_categories(Some("not json")),
            SponsorCategory::ALL.to_vec()
        );
        assert_eq!(
            parse_categories(Some(r#"["sponsor","intro"]"#)),
            vec![SponsorCategory::Sponsor, SponsorCategory::Intro]
        );
        // Unknown names are dropped; all-unknown falls back to everything
        assert_eq!(
            parse_categories(Some(r#"["sponsor","bogus"]"#)),
            vec![SponsorCategory::Sponsor]
        );
        assert_eq!(
            parse_categories(Some(r#"["bogus"]"#)),
            SponsorCategory::ALL.to_vec()
        );
    }

    #[test]
    fn test_media_payload_from_info() {
        let payload = MediaPayload::from(MediaInfo {
            id: "abc123def45".to_string(),
            title: "A Song".to_string(),
            uploader: "Artist".to_string(),
            duration: 213.7,
            thumbnail: None,
            webpage_url: "https://youtu.be/abc123def45".to_string(),
        });
        assert_eq!(payload.video_id.as_deref(), Some("abc123def45"));
        assert_eq!(payload.duration_str, "3:33");
    }

    #[test]
    fn test_empty_aggregate_keeps_duration() {
        let agg = empty_aggregate(213.7);
        assert!(!agg.has_segments);
        assert_eq!(agg.adjusted_duration, 213.7);
        assert_eq!(agg.adjusted_duration_str, "3:33");
        assert_eq!(agg.segment_count, 0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(20.499999), 20.5);
        assert_eq!(round2(0.0), 0.0);
    }
}
