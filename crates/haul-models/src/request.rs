//! Download request payloads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{MediaKind, UserConfig};

/// Per-item override from the selection UI, keyed by item URL.
///
/// Both fields arrive as raw strings; anything unparseable is treated as
/// absent so a stale client can never wedge a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemOverride {
    /// Requested media kind ("audio"/"video").
    #[serde(default)]
    pub format: Option<String>,

    /// Requested container ("mp3", "mkv", ...).
    #[serde(default, rename = "fileFormat")]
    pub file_format: Option<String>,
}

impl ItemOverride {
    /// The override's media kind, if it names a valid one.
    pub fn kind(&self) -> Option<MediaKind> {
        self.format.as_deref().and_then(|s| s.parse().ok())
    }
}

/// One submitted download request, immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Single URL or free-text search query. May be empty in playlist mode.
    pub source: String,

    /// Playlist mode: download the selected items instead of `source`.
    pub playlist: bool,

    /// Ordered selected item URLs. Empty unless playlist mode.
    #[serde(default)]
    pub selected_urls: Vec<String>,

    /// Global configuration snapshot taken at submission time.
    pub config: UserConfig,

    /// Per-item overrides keyed by item URL.
    #[serde(default)]
    pub overrides: HashMap<String, ItemOverride>,
}

impl DownloadRequest {
    /// Create a single-item request from a URL or search query.
    pub fn new(source: impl Into<String>, config: UserConfig) -> Self {
        Self {
            source: source.into(),
            playlist: false,
            selected_urls: Vec::new(),
            config,
            overrides: HashMap::new(),
        }
    }

    /// Create a playlist request from an ordered selection.
    pub fn playlist(selected_urls: Vec<String>, config: UserConfig) -> Self {
        Self {
            source: String::new(),
            playlist: true,
            selected_urls,
            config,
            overrides: HashMap::new(),
        }
    }

    /// Attach per-item overrides.
    pub fn with_overrides(mut self, overrides: HashMap<String, ItemOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Number of items this request will download.
    pub fn item_count(&self) -> usize {
        if self.playlist {
            self.selected_urls.len()
        } else {
            1
        }
    }

    /// A request with neither a source nor a selection downloads nothing.
    pub fn is_empty(&self) -> bool {
        if self.playlist {
            self.selected_urls.iter().all(|u| u.trim().is_empty())
        } else {
            self.source.trim().is_empty()
        }
    }
}
