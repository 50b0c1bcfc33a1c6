//! User configuration and its whitelist sanitization.
//!
//! Clients submit configuration as free-form JSON. Anything that does not
//! match a whitelisted value falls back to the default for that field, so a
//! stale or hand-edited client payload can never fail a submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target media kind for one downloaded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

/// Quality tier selecting the pipeline's format-selector string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Min,
    #[default]
    Avg,
    Max,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Min => "min",
            Quality::Avg => "avg",
            Quality::Max => "max",
        }
    }

    /// Audio bitrate handed to the extraction postprocessor.
    pub fn audio_bitrate(&self) -> &'static str {
        match self {
            Quality::Min => "64",
            Quality::Avg => "128",
            Quality::Max => "320",
        }
    }
}

impl FromStr for Quality {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" => Ok(Quality::Min),
            "avg" => Ok(Quality::Avg),
            "max" => Ok(Quality::Max),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

/// Audio container/codec targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    M4a,
    Flac,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
        }
    }

    /// Whether the container supports embedded cover art.
    /// WAV does not; the pipeline errors if asked to embed there.
    pub fn supports_thumbnail(&self) -> bool {
        !matches!(self, AudioFormat::Wav)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "m4a" => Ok(AudioFormat::M4a),
            "flac" => Ok(AudioFormat::Flac),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

/// Video container targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Mp4,
    Mov,
    Mkv,
    Webm,
}

impl VideoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mov => "mov",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Webm => "webm",
        }
    }

    /// Whether the container supports embedded cover art.
    pub fn supports_thumbnail(&self) -> bool {
        !matches!(self, VideoFormat::Webm)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(VideoFormat::Mp4),
            "mov" => Ok(VideoFormat::Mov),
            "mkv" => Ok(VideoFormat::Mkv),
            "webm" => Ok(VideoFormat::Webm),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown format: {0}")]
pub struct FormatParseError(String);

/// SponsorBlock segment categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorCategory {
    Sponsor,
    Intro,
    Outro,
    Selfpromo,
    Preview,
    Filler,
    Interaction,
    MusicOfftopic,
}

impl SponsorCategory {
    /// Every category the SponsorBlock API knows about.
    pub const ALL: &'static [SponsorCategory] = &[
        SponsorCategory::Sponsor,
        SponsorCategory::Intro,
        SponsorCategory::Outro,
        SponsorCategory::Selfpromo,
        SponsorCategory::Preview,
        SponsorCategory::Filler,
        SponsorCategory::Interaction,
        SponsorCategory::MusicOfftopic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorCategory::Sponsor => "sponsor",
            SponsorCategory::Intro => "intro",
            SponsorCategory::Outro => "outro",
            SponsorCategory::Selfpromo => "selfpromo",
            SponsorCategory::Preview => "preview",
            SponsorCategory::Filler => "filler",
            SponsorCategory::Interaction => "interaction",
            SponsorCategory::MusicOfftopic => "music_offtopic",
        }
    }
}

impl fmt::Display for SponsorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SponsorCategory {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sponsor" => Ok(SponsorCategory::Sponsor),
            "intro" => Ok(SponsorCategory::Intro),
            "outro" => Ok(SponsorCategory::Outro),
            "selfpromo" => Ok(SponsorCategory::Selfpromo),
            "preview" => Ok(SponsorCategory::Preview),
            "filler" => Ok(SponsorCategory::Filler),
            "interaction" => Ok(SponsorCategory::Interaction),
            "music_offtopic" => Ok(SponsorCategory::MusicOfftopic),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

/// Global configuration snapshot carried by every download request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Quality tier (min/avg/max).
    pub quality: Quality,

    /// Default audio container.
    pub audio_format: AudioFormat,

    /// Default video container.
    pub video_format: VideoFormat,

    /// Download items as video.
    pub download_video: bool,

    /// Download items as audio (the default kind when video is off).
    pub download_audio: bool,

    /// Embed metadata, chapters and cover art into outputs.
    pub embed_metadata: bool,

    /// Trim SponsorBlock segments out of downloads.
    pub sponsorblock_enabled: bool,

    /// Categories to trim when SponsorBlock is enabled.
    pub sponsorblock_categories: Vec<SponsorCategory>,

    /// Raw Netscape cookie text, written to a request-scoped file for the
    /// pipeline. Empty means no cookies.
    #[serde(default)]
    pub cookies: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            quality: Quality::Avg,
            audio_format: AudioFormat::Mp3,
            video_format: VideoFormat::Mp4,
            download_video: false,
            download_audio: true,
            embed_metadata: true,
            sponsorblock_enabled: false,
            sponsorblock_categories: vec![
                SponsorCategory::Sponsor,
                SponsorCategory::MusicOfftopic,
            ],
            cookies: String::new(),
        }
    }
}

impl UserConfig {
    /// Build a config from untrusted JSON, field by field.
    ///
    /// Every recognized field with a whitelisted value is taken; everything
    /// else keeps its default. Unknown category names are dropped from the
    /// list rather than rejecting the whole payload.
    pub fn sanitized(raw: &Value) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = raw.get("quality").and_then(Value::as_str) {
            if let Ok(q) = s.parse() {
                cfg.quality = q;
            }
        }
        if let Some(s) = raw.get("audio_format").and_then(Value::as_str) {
            if let Ok(f) = s.parse() {
                cfg.audio_format = f;
            }
        }
        if let Some(s) = raw.get("video_format").and_then(Value::as_str) {
            if let Ok(f) = s.parse() {
                cfg.video_format = f;
            }
        }
        if let Some(b) = raw.get("download_video").and_then(Value::as_bool) {
            cfg.download_video = b;
        }
        if let Some(b) = raw.get("download_audio").and_then(Value::as_bool) {
            cfg.download_audio = b;
        }
        if let Some(b) = raw.get("embed_metadata").and_then(Value::as_bool) {
            cfg.embed_metadata = b;
        }
        if let Some(b) = raw.get("sponsorblock_enabled").and_then(Value::as_bool) {
            cfg.sponsorblock_enabled = b;
        }
        if let Some(list) = raw.get("sponsorblock_categories").and_then(Value::as_array) {
            cfg.sponsorblock_categories = list
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| s.parse().ok())
                .collect();
        }
        if let Some(s) = raw.get("cookies").and_then(Value::as_str) {
            cfg.cookies = s.to_string();
        }

        cfg
    }

    /// Categories to trim, or an empty slice when SponsorBlock is off.
    pub fn active_sponsorblock_categories(&self) -> &[SponsorCategory] {
        if self.sponsorblock_enabled {
            &self.sponsorblock_categories
        } else {
            &[]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let cfg = UserConfig::default();
        assert_eq!(cfg.quality, Quality::Avg);
        assert_eq!(cfg.audio_format, AudioFormat::Mp3);
        assert_eq!(cfg.video_format, VideoFormat::Mp4);
        assert!(!cfg.download_video);
        assert!(cfg.download_audio);
        assert!(cfg.embed_metadata);
        assert!(!cfg.sponsorblock_enabled);
        assert_eq!(
            cfg.sponsorblock_categories,
            vec![SponsorCategory::Sponsor, SponsorCategory::MusicOfftopic]
        );
    }

    #[test]
    fn test_sanitized_accepts_whitelisted_values() {
        let cfg = UserConfig::sanitized(&json!({
            "quality": "max",
            "audio_format": "flac",
            "video_format": "mkv",
            "download_video": true,
            "sponsorblock_enabled": true,
            "sponsorblock_categories": ["sponsor", "intro"],
            "cookies": "# Netscape HTTP Cookie File",
        }));
        assert_eq!(cfg.quality, Quality::Max);
        assert_eq!(cfg.audio_format, AudioFormat::Flac);
        assert_eq!(cfg.video_format, VideoFormat::Mkv);
        assert!(cfg.download_video);
        assert!(cfg.sponsorblock_enabled);
        assert_eq!(
            cfg.sponsorblock_categories,
            vec![SponsorCategory::Sponsor, SponsorCategory::Intro]
        );
        assert_eq!(cfg.cookies, "# Netscape HTTP Cookie File");
    }

    #[test]
    fn test_sanitized_falls_back_on_invalid_values() {
        let cfg = UserConfig::sanitized(&json!({
            "quality": "ultra",
            "audio_format": "ogg",
            "video_format": 42,
            "download_video": "yes",
        }));
        assert_eq!(cfg.quality, Quality::Avg);
        assert_eq!(cfg.audio_format, AudioFormat::Mp3);
        assert_eq!(cfg.video_format, VideoFormat::Mp4);
        assert!(!cfg.download_video);
    }

    #[test]
    fn test_sanitized_drops_unknown_categories() {
        let cfg = UserConfig::sanitized(&json!({
            "sponsorblock_categories": ["sponsor", "advertisement", "outro"],
        }));
        assert_eq!(
            cfg.sponsorblock_categories,
            vec![SponsorCategory::Sponsor, SponsorCategory::Outro]
        );
    }

    #[test]
    fn test_sanitized_of_non_object_is_default() {
        assert_eq!(UserConfig::sanitized(&json!("nope")), UserConfig::default());
        assert_eq!(UserConfig::sanitized(&json!(null)), UserConfig::default());
    }

    #[test]
    fn test_active_categories_empty_when_disabled() {
        let cfg = UserConfig::default();
        assert!(cfg.active_sponsorblock_categories().is_empty());

        let mut on = UserConfig::default();
        on.sponsorblock_enabled = true;
        assert_eq!(on.active_sponsorblock_categories().len(), 2);
    }
}
