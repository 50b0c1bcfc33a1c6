//! SponsorBlock segment lookups.
//!
//! Used for the pre-download summary endpoint; actual segment removal
//! during downloads is delegated to yt-dlp's own SponsorBlock support.

use serde::{Deserialize, Serialize};
use tracing::debug;

use haul_models::SponsorCategory;

use crate::error::MediaResult;

const DEFAULT_BASE_URL: &str = "https://sponsor.ajay.app";

/// One skippable segment of a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipSegment {
    pub category: String,
    pub start: f64,
    pub end: f64,
}

impl SkipSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Aggregate view over the segments of one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub video_id: String,
    pub segment_count: usize,
    /// Total skippable seconds across all matched segments.
    pub total_seconds: f64,
    /// Distinct categories present, in first-seen order.
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    category: String,
    segment: [f64; 2],
}

/// Client for the SponsorBlock skipSegments API.
#[derive(Debug, Clone)]
pub struct SponsorBlockClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for SponsorBlockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SponsorBlockClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch segments for a video, filtered to the given categories.
    ///
    /// A 404 means no segments are known and maps to an empty list.
    pub async fn segments(
        &self,
        video_id: &str,
        categories: &[SponsorCategory],
    ) -> MediaResult<Vec<SkipSegment>> {
        let url = format!("{}/api/skipSegments?videoID={video_id}", self.base_url);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(%video_id, "no SponsorBlock segments known");
            return Ok(Vec::new());
        }

        let raw: Vec<RawSegment> = response.error_for_status()?.json().await?;
        let wanted: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();

        Ok(raw
            .into_iter()
            .filter(|s| wanted.contains(&s.category.as_str()))
            .map(|s| SkipSegment {
                category: s.category,
                start: s.segment[0],
                end: s.segment[1],
            })
            .collect())
    }

    /// Summarize the skippable time of a video.
    pub async fn summarize(
        &self,
        video_id: &str,
        categories: &[SponsorCategory],
    ) -> MediaResult<SegmentSummary> {
        let segments = self.segments(video_id, categories).await?;
        let total_seconds = segments.iter().map(SkipSegment::duration).sum();
        let mut found: Vec<String> = Vec::new();
        for segment in &segments {
            if !found.contains(&segment.category) {
                found.push(segment.category.clone());
            }
        }
        Ok(SegmentSummary {
            video_id: video_id.to_string(),
            segment_count: segments.len(),
            total_seconds,
            categories: found,
        })
    }
}

/// Extract the 11-character YouTube video id from a URL.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    let candidate = match host {
        "youtu.be" => parsed.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
                Some(v.into_owned())
            } else {
                let mut segments = parsed.path_segments()?;
                match segments.next()? {
                    "embed" | "shorts" | "live" | "v" => segments.next().map(str::to_string),
                    _ => None,
                }
            }
        }
        _ => None,
    };

    candidate.filter(|id| is_video_id(id))
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn video_ids_come_from_common_url_shapes() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=abc123def45"),
            Some("abc123def45".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/abc123def45?t=10"),
            Some("abc123def45".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/abc123def45"),
            Some("abc123def45".to_string())
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/embed/abc123def45"),
            Some("abc123def45".to_string())
        );
        assert_eq!(extract_video_id("https://example.com/watch?v=abc123def45"), None);
        assert_eq!(extract_video_id("https://youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[tokio::test]
    async fn segments_filter_by_category_and_sum() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/skipSegments"))
            .and(query_param("videoID", "abc123def45"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"[
                    {"category": "sponsor", "segment": [10.0, 25.0]},
                    {"category": "selfpromo", "segment": [30.0, 40.0]},
                    {"category": "sponsor", "segment": [50.0, 55.5]}
                ]"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = SponsorBlockClient::with_base_url(server.uri());
        let summary = client
            .summarize("abc123def45", &[SponsorCategory::Sponsor])
            .await
            .unwrap();

        assert_eq!(summary.segment_count, 2);
        assert!((summary.total_seconds - 20.5).abs() < 0.01);
        assert_eq!(summary.categories, vec!["sponsor".to_string()]);
    }

    #[tokio::test]
    async fn unknown_video_yields_empty_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/skipSegments"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SponsorBlockClient::with_base_url(server.uri());
        let summary = client
            .summarize("abc123def45", SponsorCategory::ALL)
            .await
            .unwrap();

        assert_eq!(summary.segment_count, 0);
        assert_eq!(summary.total_seconds, 0.0);
    }
}
