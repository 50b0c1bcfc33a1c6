//! Per-item resolution of a download request.
//!
//! `resolve` merges the global configuration with per-item overrides into one
//! concrete spec per item. It is total: missing or malformed override data
//! always falls through to the documented defaults, never to an error.

use serde::{Deserialize, Serialize};

use crate::config::{AudioFormat, MediaKind, Quality, SponsorCategory, UserConfig, VideoFormat};
use crate::request::DownloadRequest;

/// Concrete container target for one item.
///
/// Carrying the format inside the kind makes a kind/format mismatch
/// unrepresentable downstream of the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "format")]
pub enum TargetFormat {
    Audio(AudioFormat),
    Video(VideoFormat),
}

impl TargetFormat {
    pub fn kind(&self) -> MediaKind {
        match self {
            TargetFormat::Audio(_) => MediaKind::Audio,
            TargetFormat::Video(_) => MediaKind::Video,
        }
    }

    /// File extension of the target container.
    pub fn ext(&self) -> &'static str {
        match self {
            TargetFormat::Audio(f) => f.as_str(),
            TargetFormat::Video(f) => f.as_str(),
        }
    }

    /// Whether the container supports embedded cover art.
    pub fn supports_thumbnail(&self) -> bool {
        match self {
            TargetFormat::Audio(f) => f.supports_thumbnail(),
            TargetFormat::Video(f) => f.supports_thumbnail(),
        }
    }
}

/// The conflict-free download parameters for one item.
///
/// Derived once by [`resolve`]; never mutated. If the request changes, a new
/// spec is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItemSpec {
    /// Source URL (or search query for single-item requests).
    pub url: String,

    /// Target kind and container.
    pub format: TargetFormat,

    /// Quality tier.
    pub quality: Quality,

    /// Embed metadata/chapters/cover art.
    pub embed_metadata: bool,

    /// SponsorBlock categories to trim. Empty means trimming is off.
    pub sponsorblock_categories: Vec<SponsorCategory>,
}

impl ResolvedItemSpec {
    pub fn kind(&self) -> MediaKind {
        self.format.kind()
    }
}

/// The kind an item resolves to when no override names one:
/// video if the global flag is set, audio otherwise.
fn global_kind(config: &UserConfig) -> MediaKind {
    if config.download_video {
        MediaKind::Video
    } else {
        MediaKind::Audio
    }
}

/// Pick the concrete format for `kind`, honoring a valid override and
/// ignoring one that belongs to the other kind.
fn format_for(config: &UserConfig, kind: MediaKind, override_format: Option<&str>) -> TargetFormat {
    match kind {
        MediaKind::Audio => {
            let fmt = override_format
                .and_then(|s| s.parse::<AudioFormat>().ok())
                .unwrap_or(config.audio_format);
            TargetFormat::Audio(fmt)
        }
        MediaKind::Video => {
            let fmt = override_format
                .and_then(|s| s.parse::<VideoFormat>().ok())
                .unwrap_or(config.video_format);
            TargetFormat::Video(fmt)
        }
    }
}

fn spec_for(config: &UserConfig, url: &str, kind: MediaKind, override_format: Option<&str>) -> ResolvedItemSpec {
    ResolvedItemSpec {
        url: url.to_string(),
        format: format_for(config, kind, override_format),
        quality: config.quality,
        embed_metadata: config.embed_metadata,
        sponsorblock_categories: config.active_sponsorblock_categories().to_vec(),
    }
}

/// Resolve a request into one ordered spec per item.
///
/// Single-item requests take the global configuration verbatim. Playlist
/// requests consult the override map per URL: an override's kind wins over
/// the global download-video flag, and its file format wins only when it
/// belongs to the resolved kind.
pub fn resolve(request: &DownloadRequest) -> Vec<ResolvedItemSpec> {
    let config = &request.config;

    if !request.playlist {
        return vec![spec_for(config, &request.source, global_kind(config), None)];
    }

    request
        .selected_urls
        .iter()
        .filter(|url| !url.trim().is_empty())
        .map(|url| {
            let ov = request.overrides.get(url.as_str());
            let kind = ov
                .and_then(|o| o.kind())
                .unwrap_or_else(|| global_kind(config));
            let override_format = ov.and_then(|o| o.file_format.as_deref());
            spec_for(config, url, kind, override_format)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ItemOverride;
    use std::collections::HashMap;

    fn playlist_request(
        urls: &[&str],
        config: UserConfig,
        overrides: HashMap<String, ItemOverride>,
    ) -> DownloadRequest {
        DownloadRequest::playlist(urls.iter().map(|s| s.to_string()).collect(), config)
            .with_overrides(overrides)
    }

    fn ov(format: Option<&str>, file_format: Option<&str>) -> ItemOverride {
        ItemOverride {
            format: format.map(String::from),
            file_format: file_format.map(String::from),
        }
    }

    #[test]
    fn test_single_item_uses_global_config_verbatim() {
        let mut config = UserConfig::default();
        config.quality = Quality::Max;
        let request = DownloadRequest::new("https://youtu.be/abc", config);

        let specs = resolve(&request);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].url, "https://youtu.be/abc");
        assert_eq!(specs[0].format, TargetFormat::Audio(AudioFormat::Mp3));
        assert_eq!(specs[0].quality, Quality::Max);
    }

    #[test]
    fn test_single_item_video_flag_wins() {
        let mut config = UserConfig::default();
        config.download_video = true;
        config.video_format = VideoFormat::Mkv;
        let request = DownloadRequest::new("https://youtu.be/abc", config);

        let specs = resolve(&request);
        assert_eq!(specs[0].format, TargetFormat::Video(VideoFormat::Mkv));
    }

    #[test]
    fn test_one_spec_per_selected_item_in_order() {
        let request = playlist_request(
            &["https://youtu.be/a", "https://youtu.be/b", "https://youtu.be/c"],
            UserConfig::default(),
            HashMap::new(),
        );

        let specs = resolve(&request);
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].url, "https://youtu.be/a");
        assert_eq!(specs[1].url, "https://youtu.be/b");
        assert_eq!(specs[2].url, "https://youtu.be/c");
    }

    #[test]
    fn test_missing_override_falls_back_to_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("https://youtu.be/a".to_string(), ov(Some("video"), None));

        let request = playlist_request(
            &["https://youtu.be/a", "https://youtu.be/b"],
            UserConfig::default(),
            overrides,
        );

        let specs = resolve(&request);
        // a: overridden to video, default video container
        assert_eq!(specs[0].format, TargetFormat::Video(VideoFormat::Mp4));
        // b: no override at all, global flags say audio
        assert_eq!(specs[1].format, TargetFormat::Audio(AudioFormat::Mp3));
    }

    #[test]
    fn test_override_format_and_file_format() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "https://youtu.be/a".to_string(),
            ov(Some("audio"), Some("flac")),
        );

        let request =
            playlist_request(&["https://youtu.be/a"], UserConfig::default(), overrides);

        let specs = resolve(&request);
        assert_eq!(specs[0].format, TargetFormat::Audio(AudioFormat::Flac));
    }

    #[test]
    fn test_mismatched_file_format_falls_back_to_kind_default() {
        // mp3 named for a video item is ignored, not forwarded
        let mut overrides = HashMap::new();
        overrides.insert(
            "https://youtu.be/a".to_string(),
            ov(Some("video"), Some("mp3")),
        );

        let request =
            playlist_request(&["https://youtu.be/a"], UserConfig::default(), overrides);

        let specs = resolve(&request);
        assert_eq!(specs[0].format, TargetFormat::Video(VideoFormat::Mp4));
    }

    #[test]
    fn test_unknown_override_values_are_ignored() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "https://youtu.be/a".to_string(),
            ov(Some("hologram"), Some("divx")),
        );

        let request =
            playlist_request(&["https://youtu.be/a"], UserConfig::default(), overrides);

        let specs = resolve(&request);
        assert_eq!(specs[0].format, TargetFormat::Audio(AudioFormat::Mp3));
    }

    #[test]
    fn test_blank_urls_are_skipped() {
        let request = playlist_request(
            &["https://youtu.be/a", "", "  "],
            UserConfig::default(),
            HashMap::new(),
        );
        assert_eq!(resolve(&request).len(), 1);
    }

    #[test]
    fn test_sponsorblock_carried_only_when_enabled() {
        let mut config = UserConfig::default();
        config.sponsorblock_enabled = true;
        config.sponsorblock_categories =
            vec![SponsorCategory::Sponsor, SponsorCategory::Intro];
        let request = DownloadRequest::new("https://youtu.be/abc", config);

        let specs = resolve(&request);
        assert_eq!(
            specs[0].sponsorblock_categories,
            vec![SponsorCategory::Sponsor, SponsorCategory::Intro]
        );

        let off = DownloadRequest::new("https://youtu.be/abc", UserConfig::default());
        assert!(resolve(&off)[0].sponsorblock_categories.is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut overrides = HashMap::new();
        overrides.insert("https://youtu.be/b".to_string(), ov(None, Some("webm")));
        let request = playlist_request(
            &["https://youtu.be/a", "https://youtu.be/b"],
            UserConfig::default(),
            overrides,
        );

        assert_eq!(resolve(&request), resolve(&request));
    }
}
