//! Input validation for user-supplied sources.
//!
//! The download pipeline hands whatever source it is given to yt-dlp, which
//! will happily fetch it. Validation here keeps that surface to public
//! http(s) URLs and plain search text: no exotic schemes, no internal hosts.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

/// Maximum source length (URL or search query).
pub const MAX_SOURCE_LENGTH: usize = 2048;

/// URL patterns that must never reach the pipeline (internal ranges and
/// cloud metadata endpoints).
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^https?://127\.").unwrap(),
        Regex::new(r"^https?://localhost").unwrap(),
        Regex::new(r"^https?://0\.0\.0\.0").unwrap(),
        Regex::new(r"^https?://10\.").unwrap(),
        Regex::new(r"^https?://172\.(1[6-9]|2[0-9]|3[0-1])\.").unwrap(),
        Regex::new(r"^https?://192\.168\.").unwrap(),
        Regex::new(r"^https?://169\.254\.").unwrap(),
        Regex::new(r"^https?://\[::1\]").unwrap(),
        Regex::new(r"^https?://\[fd").unwrap(),
        Regex::new(r"^https?://\[fe80").unwrap(),
        Regex::new(r"^https?://metadata\.").unwrap(),
    ]
});

/// Result of source validation.
#[derive(Debug)]
pub enum SourceValidation {
    /// Source is a usable URL or search query.
    Valid(String),
    /// Source is malformed or uses an unsupported protocol.
    Invalid(String),
    /// Source targets an internal or restricted endpoint.
    Blocked,
    /// Source exceeds maximum length.
    TooLong,
}

impl SourceValidation {
    /// Convert to Result for easy error handling.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(source) => Ok(source),
            Self::Invalid(msg) => Err(msg),
            Self::Blocked => {
                Err("URL appears to target an internal or restricted endpoint".to_string())
            }
            Self::TooLong => Err(format!(
                "Source exceeds maximum length of {} characters",
                MAX_SOURCE_LENGTH
            )),
        }
    }
}

/// Validate a download source: an http(s) URL or a free-text search query.
pub fn validate_source(input: &str) -> SourceValidation {
    let source = input.trim();
    if source.is_empty() {
        return SourceValidation::Invalid("Source cannot be empty".to_string());
    }
    if source.len() > MAX_SOURCE_LENGTH {
        return SourceValidation::TooLong;
    }

    let lowered = source.to_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        for pattern in BLOCKED_PATTERNS.iter() {
            if pattern.is_match(&lowered) {
                warn!(url = %source, "Blocked URL pattern detected");
                return SourceValidation::Blocked;
            }
        }
        let parsed = match Url::parse(source) {
            Ok(u) => u,
            Err(e) => return SourceValidation::Invalid(format!("Invalid URL format: {}", e)),
        };
        if parsed.host_str().is_none() {
            return SourceValidation::Invalid("URL must have a valid host".to_string());
        }
        return SourceValidation::Valid(source.to_string());
    }

    if lowered.contains("://") {
        return SourceValidation::Invalid(
            "Invalid protocol. Only HTTP and HTTPS are allowed.".to_string(),
        );
    }

    // Anything else is a search query; strip control characters.
    let query: String = source.chars().filter(|c| !c.is_control()).collect();
    if query.trim().is_empty() {
        return SourceValidation::Invalid("Source cannot be empty".to_string());
    }
    SourceValidation::Valid(query)
}

/// Validate a YouTube video ID: exactly 11 URL-safe base64 characters.
pub fn is_valid_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
