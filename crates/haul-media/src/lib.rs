//! Media acquisition for Haul.
//!
//! Everything that touches yt-dlp or the filesystem lives here: command
//! building and execution with live progress, metadata probes,
//! SponsorBlock lookups, cookie staging, ZIP packaging and working
//! directory hygiene. The API and worker crates stay free of process
//! plumbing.

pub mod cookies;
pub mod error;
pub mod package;
pub mod probe;
pub mod sanitize;
pub mod sponsorblock;
pub mod workdir;
pub mod ytdlp;

pub use cookies::stage_cookies;
pub use error::{MediaError, MediaResult};
pub use package::create_zip;
pub use probe::{is_playlist_url, media_info, playlist_info, search, MediaInfo, PlaylistEntry, PlaylistInfo};
pub use sanitize::sanitize_filename;
pub use sponsorblock::{extract_video_id, SegmentSummary, SkipSegment, SponsorBlockClient};
pub use ytdlp::{find_output_file, ItemEvent, ItemProgress, YtdlpCommand, YtdlpRunner};
