//! Source metadata lookups via `yt-dlp -J`.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Metadata for a single playable source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    /// Duration in seconds, 0 when unknown (live streams).
    pub duration: f64,
    pub thumbnail: Option<String>,
    pub webpage_url: String,
}

/// One entry of a flat playlist listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub url: String,
    pub title: String,
    pub uploader: String,
    pub duration: f64,
}

/// Metadata for a playlist without per-entry format probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
}

/// yt-dlp `-J` output, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    entries: Option<Vec<RawInfo>>,
}

impl RawInfo {
    fn uploader_name(&self) -> String {
        self.uploader
            .clone()
            .or_else(|| self.channel.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn into_media_info(self) -> MediaInfo {
        let uploader = self.uploader_name();
        MediaInfo {
            id: self.id.unwrap_or_default(),
            title: self.title.unwrap_or_else(|| "Untitled".to_string()),
            uploader,
            duration: self.duration.unwrap_or(0.0),
            thumbnail: self.thumbnail,
            webpage_url: self.webpage_url.or(self.url).unwrap_or_default(),
        }
    }

    fn into_playlist_entry(self) -> PlaylistEntry {
        let uploader = self.uploader_name();
        PlaylistEntry {
            url: self.url.clone().or(self.webpage_url.clone()).unwrap_or_default(),
            title: self.title.unwrap_or_else(|| "Untitled".to_string()),
            uploader,
            duration: self.duration.unwrap_or(0.0),
        }
    }
}

/// Probe a single source for metadata.
pub async fn media_info(url: &str) -> MediaResult<MediaInfo> {
    let raw = run_probe(&["-J", "--no-playlist", url]).await?;
    Ok(raw.into_media_info())
}

/// List playlist entries without resolving each one.
pub async fn playlist_info(url: &str) -> MediaResult<PlaylistInfo> {
    let raw = run_probe(&["-J", "--flat-playlist", url]).await?;
    let title = raw.title.clone().unwrap_or_else(|| "Playlist".to_string());
    let entries = raw
        .entries
        .unwrap_or_default()
        .into_iter()
        .map(RawInfo::into_playlist_entry)
        .filter(|e| !e.url.is_empty())
        .collect();
    Ok(PlaylistInfo { title, entries })
}

/// Search YouTube, returning up to `limit` results.
pub async fn search(query: &str, limit: usize) -> MediaResult<Vec<MediaInfo>> {
    let target = format!("ytsearch{limit}:{query}");
    let raw = run_probe(&["-J", "--flat-playlist", &target]).await?;
    Ok(raw
        .entries
        .unwrap_or_default()
        .into_iter()
        .map(RawInfo::into_media_info)
        .collect())
}

/// Whether a URL points at a playlist rather than a single item.
///
/// Playlist URLs get the selection flow; everything else is probed as a
/// single source.
pub fn is_playlist_url(raw: &str) -> bool {
    let Ok(parsed) = url::Url::parse(raw) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);
    if !matches!(host, "youtube.com" | "music.youtube.com" | "youtu.be") {
        return false;
    }

    let has_list = parsed
        .query_pairs()
        .any(|(k, v)| k == "list" && !v.is_empty());
    let playlist_path = parsed
        .path_segments()
        .and_then(|mut s| s.next().map(str::to_string))
        .is_some_and(|first| first == "playlist");

    has_list || playlist_path
}

async fn run_probe(args: &[&str]) -> MediaResult<RawInfo> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    let output = Command::new("yt-dlp")
        .args(args)
        .arg("--no-warnings")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::probe_failed(
            "yt-dlp metadata probe failed",
            Some(stderr.lines().last().unwrap_or("Unknown error").to_string()),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_info_fills_missing_fields() {
        let raw: RawInfo = serde_json::from_str(r#"{"id": "abc", "channel": "Some Channel"}"#).unwrap();
        let info = raw.into_media_info();

        assert_eq!(info.id, "abc");
        assert_eq!(info.title, "Untitled");
        assert_eq!(info.uploader, "Some Channel");
        assert_eq!(info.duration, 0.0);
    }

    #[test]
    fn playlist_urls_are_detected() {
        assert!(is_playlist_url("https://www.youtube.com/playlist?list=PLx1"));
        assert!(is_playlist_url(
            "https://music.youtube.com/watch?v=abc123def45&list=RDabc"
        ));
        assert!(is_playlist_url("https://youtu.be/abc123def45?list=PLx1"));

        assert!(!is_playlist_url("https://www.youtube.com/watch?v=abc123def45"));
        assert!(!is_playlist_url("https://example.com/playlist?list=PLx1"));
        assert!(!is_playlist_url("some song name"));
    }

    #[test]
    fn playlist_entries_drop_urlless_rows() {
        let raw: RawInfo = serde_json::from_str(
            r#"{
                "title": "Mix",
                "entries": [
                    {"url": "https://youtu.be/a", "title": "A", "duration": 10.0},
                    {"title": "deleted video"}
                ]
            }"#,
        )
        .unwrap();

        let entries: Vec<PlaylistEntry> = raw
            .entries
            .unwrap()
            .into_iter()
            .map(RawInfo::into_playlist_entry)
            .filter(|e| !e.url.is_empty())
            .collect();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "A");
    }
}
