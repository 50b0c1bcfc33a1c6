//! yt-dlp command builder and runner.
//!
//! Arguments are derived from a [`ResolvedItemSpec`], so by the time a
//! command is built there is no audio/video ambiguity left to resolve.
//! Live transfer progress is read from stdout through a fixed
//! `--progress-template` and surfaced as [`ItemEvent`]s.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use haul_models::{Quality, ResolvedItemSpec, TargetFormat, VideoFormat};

use crate::error::{MediaError, MediaResult};

/// stdout template: `download:{percent}|{speed bytes/s}|{eta secs}`.
const PROGRESS_TEMPLATE: &str =
    "download:%(progress._percent_str)s|%(progress.speed)s|%(progress.eta)s";

/// Against yt-dlp's own default of 255; leaves room for a suffix on
/// filesystems with a 255-byte name limit once ` - uploader.ext` lands.
const TRIM_FILENAMES: &str = "184";

const OUTPUT_TEMPLATE: &str = "%(title)s - %(uploader)s.%(ext)s";

/// In-progress download companions and leftovers we never treat as output.
const TEMP_EXTENSIONS: &[&str] = &["part", "ytdl", "tmp", "temp", "download"];

/// Sidecars yt-dlp may leave next to the media file.
const SIDECAR_EXTENSIONS: &[&str] = &[
    "jpg",
    "jpeg",
    "png",
    "webp",
    "json",
    "description",
    "vtt",
    "srt",
];

const POSTPROCESSOR_TAGS: &[&str] = &[
    "[ExtractAudio]",
    "[Merger]",
    "[VideoConvertor]",
    "[VideoRemuxer]",
    "[EmbedThumbnail]",
    "[Metadata]",
    "[ThumbnailsConvertor]",
    "[SponsorBlock]",
    "[ModifyChapters]",
];

/// A single parsed transfer report for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProgress {
    /// Percent of this item, 0 to 100.
    pub percent: f64,
    /// Transfer rate in bytes per second, when yt-dlp knows it.
    pub speed: Option<f64>,
    /// Estimated seconds remaining, when yt-dlp knows it.
    pub eta: Option<u64>,
}

/// Events emitted while an item downloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    /// A transfer progress report.
    Progress(ItemProgress),
    /// Post-download processing (extraction, merge, embedding) started.
    Converting,
}

/// Builder for a single-item yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtdlpCommand {
    spec: ResolvedItemSpec,
    dest_dir: PathBuf,
    cookies: Option<PathBuf>,
}

impl YtdlpCommand {
    pub fn new(spec: &ResolvedItemSpec, dest_dir: impl AsRef<Path>) -> Self {
        Self {
            spec: spec.clone(),
            dest_dir: dest_dir.as_ref().to_path_buf(),
            cookies: None,
        }
    }

    /// Pass a Netscape cookies file to yt-dlp.
    pub fn cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies = Some(path.into());
        self
    }

    /// Build the full argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
        ];

        match &self.spec.format {
            TargetFormat::Audio(format) => {
                args.push("-f".into());
                args.push(audio_selector(self.spec.quality).into());
                args.push("-x".into());
                args.push("--audio-format".into());
                args.push(format.as_str().into());
                args.push("--audio-quality".into());
                args.push(self.spec.quality.audio_bitrate().into());
                if matches!(format, haul_models::AudioFormat::Mp3) {
                    // Older players choke on id3v2.4 tags.
                    args.push("--postprocessor-args".into());
                    args.push("ffmpeg:-id3v2_version 3 -write_id3v1 1".into());
                }
            }
            TargetFormat::Video(format) => {
                args.push("-f".into());
                args.push(video_selector(self.spec.quality, *format).into());
                args.push("--merge-output-format".into());
                args.push(format.as_str().into());
                args.push("--concurrent-fragments".into());
                args.push("3".into());
                args.push("--retries".into());
                args.push("3".into());
                args.push("-S".into());
                args.push("vext:mp4,aext:m4a".into());
            }
        }

        if self.spec.embed_metadata {
            args.push("--embed-metadata".into());
            if self.spec.format.supports_thumbnail() {
                args.push("--write-thumbnail".into());
                args.push("--convert-thumbnails".into());
                args.push("jpg".into());
                args.push("--embed-thumbnail".into());
            }
        }

        if !self.spec.sponsorblock_categories.is_empty() {
            let categories: Vec<&str> = self
                .spec
                .sponsorblock_categories
                .iter()
                .map(|c| c.as_str())
                .collect();
            args.push("--sponsorblock-remove".into());
            args.push(categories.join(","));
        }

        if let Some(cookies) = &self.cookies {
            args.push("--cookies".into());
            args.push(cookies.to_string_lossy().into_owned());
        }

        args.push("--trim-filenames".into());
        args.push(TRIM_FILENAMES.into());
        args.push("-o".into());
        args.push(self.dest_dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned());

        args.push(source_argument(&self.spec.url));
        args
    }

    fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    fn target_ext(&self) -> &'static str {
        self.spec.format.ext()
    }
}

/// Audio format selector per quality tier.
fn audio_selector(quality: Quality) -> &'static str {
    match quality {
        Quality::Min => "worstaudio[abr<=96]/worstaudio/worst",
        Quality::Avg => "bestaudio[abr<=160]/bestaudio[abr<=192]/bestaudio/best",
        Quality::Max => "bestaudio/best",
    }
}

/// Video format selector per quality tier and container.
fn video_selector(quality: Quality, format: VideoFormat) -> &'static str {
    match (quality, format) {
        (Quality::Min, _) => "worstvideo[ext=mp4]+worstaudio[ext=m4a]/worst[ext=mp4]/worst",
        (Quality::Avg, VideoFormat::Mp4) => {
            "bestvideo[height<=1080]+bestaudio[ext=m4a]/bestaudio[height<=1080]/best[height<=1080]"
        }
        (Quality::Avg, _) => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
        (Quality::Max, VideoFormat::Mp4) => "bestvideo+bestaudio[ext=m4a]/bestaudio/best",
        (Quality::Max, _) => "bestvideo+bestaudio/best",
    }
}

/// Plain text that is not a URL becomes a YouTube search for one result.
fn source_argument(source: &str) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        source.to_string()
    } else {
        format!("ytsearch1:{source}")
    }
}

/// Runner for yt-dlp commands with live progress and an optional timeout.
pub struct YtdlpRunner {
    timeout_secs: Option<u64>,
}

impl Default for YtdlpRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl YtdlpRunner {
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run a yt-dlp command, reporting progress through `on_event`.
    ///
    /// Returns the path of the finished media file in the destination
    /// directory.
    pub async fn run<F>(&self, cmd: &YtdlpCommand, on_event: F) -> MediaResult<PathBuf>
    where
        F: Fn(ItemEvent) + Send + 'static,
    {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        tokio::fs::create_dir_all(cmd.dest_dir()).await?;

        let args = cmd.build_args();
        debug!("Running yt-dlp: yt-dlp {}", args.join(" "));

        let mut child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let progress_handle = tokio::spawn(async move {
            while let Ok(Some(line)) = stdout_lines.next_line().await {
                if let Some(event) = parse_line(&line) {
                    on_event(event);
                }
            }
        });

        let stderr = child.stderr.take().expect("stderr not captured");
        let mut stderr_lines = BufReader::new(stderr).lines();
        let stderr_handle = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                tail.push(line);
                if tail.len() > 20 {
                    tail.remove(0);
                }
            }
            tail
        });

        let result = self.wait_for_completion(&mut child).await;

        let _ = progress_handle.await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        let status = result?;
        if !status.success() {
            let message = extract_error_line(&stderr_tail, status.code());
            warn!(source = %cmd.spec.url, %message, "yt-dlp failed");
            return Err(MediaError::download_failed(message));
        }

        find_output_file(cmd.dest_dir(), cmd.target_ext())
    }

    /// Wait for the child, killing it on timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        if let Some(timeout_secs) = self.timeout_secs {
            let timeout = tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                child.wait(),
            );
            match timeout.await {
                Ok(result) => Ok(result?),
                Err(_) => {
                    warn!("yt-dlp timed out after {} seconds, killing process", timeout_secs);
                    let _ = child.kill().await;
                    Err(MediaError::Timeout(timeout_secs))
                }
            }
        } else {
            Ok(child.wait().await?)
        }
    }
}

/// Parse one stdout line into an event, if it carries one.
fn parse_line(line: &str) -> Option<ItemEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("download:") {
        let mut parts = rest.splitn(3, '|');
        let percent = parts
            .next()?
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .ok()?;
        let speed = parse_metric(parts.next());
        let eta = parse_metric(parts.next()).map(|v| v as u64);
        return Some(ItemEvent::Progress(ItemProgress {
            percent: percent.clamp(0.0, 100.0),
            speed,
            eta,
        }));
    }

    if POSTPROCESSOR_TAGS.iter().any(|tag| line.starts_with(tag)) {
        return Some(ItemEvent::Converting);
    }

    None
}

/// Numeric template fields render as "NA" when yt-dlp has no value.
fn parse_metric(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "NA" || raw == "N/A" || raw == "None" {
        return None;
    }
    raw.parse().ok()
}

/// Pick the most useful stderr line for an error message.
fn extract_error_line(stderr_tail: &[String], exit_code: Option<i32>) -> String {
    if let Some(line) = stderr_tail.iter().rev().find(|l| l.contains("ERROR")) {
        return line.trim().to_string();
    }
    if let Some(line) = stderr_tail.iter().rev().find(|l| !l.trim().is_empty()) {
        return line.trim().to_string();
    }
    match exit_code {
        Some(code) => format!("yt-dlp exited with status {code}"),
        None => "yt-dlp was killed by a signal".to_string(),
    }
}

/// Locate the finished media file in a per-item directory.
///
/// Prefers a file with the requested extension; otherwise falls back to
/// the newest non-temporary, non-sidecar file. yt-dlp can legitimately
/// produce a different extension when a source cannot be converted.
pub fn find_output_file(dir: &Path, target_ext: &str) -> MediaResult<PathBuf> {
    let mut exact: Option<(SystemTime, PathBuf)> = None;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if TEMP_EXTENSIONS.contains(&ext.as_str()) || SIDECAR_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if ext == target_ext && exact.as_ref().map_or(true, |(t, _)| modified > *t) {
            exact = Some((modified, path.clone()));
        }
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    exact
        .or(newest)
        .map(|(_, path)| path)
        .ok_or_else(|| MediaError::NoOutputFile(dir.to_path_buf()))
}
