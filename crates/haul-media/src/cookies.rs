//! Per-request cookie staging for yt-dlp.
//!
//! Clients may paste Netscape-format cookie text for age-gated or
//! member-only sources. The text is validated and written into the
//! request's working directory; it is never a path into the server's
//! filesystem.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::MediaResult;

/// A real Netscape cookies file is at least this big.
const MIN_COOKIES_SIZE: usize = 50;

const COOKIES_FILE_NAME: &str = "cookies.txt";

/// Validate that cookie text appears to be in Netscape format.
///
/// Netscape cookie files either start with the standard header or
/// contain tab-separated lines with at least six fields.
pub fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File")
        || content.starts_with("# HTTP Cookie File")
    {
        return true;
    }

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.split('\t').count() >= 6 {
            return true;
        }
    }

    false
}

/// Write validated cookie text into `dir`, returning the file path.
///
/// Returns `None` without touching disk when the text is empty, too
/// short or not recognizable as Netscape format.
pub async fn stage_cookies(content: &str, dir: &Path) -> MediaResult<Option<PathBuf>> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(None);
    }
    if content.len() < MIN_COOKIES_SIZE {
        debug!("cookie text too short ({} bytes), skipping", content.len());
        return Ok(None);
    }
    if !is_valid_netscape_cookies(content) {
        warn!("cookie text is not in Netscape format, skipping");
        return Ok(None);
    }

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(COOKIES_FILE_NAME);
    tokio::fs::write(&path, content).await?;
    debug!(path = %path.display(), "staged cookies file");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t1999999999\tSID\tabcdef123456\n";

    #[test]
    fn header_or_tabbed_lines_validate() {
        assert!(is_valid_netscape_cookies(SAMPLE));
        assert!(is_valid_netscape_cookies(
            ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tSID\tabc\n"
        ));
        assert!(!is_valid_netscape_cookies("SID=abc; Domain=.youtube.com"));
        assert!(!is_valid_netscape_cookies(""));
    }

    #[tokio::test]
    async fn staging_writes_valid_cookies_only() {
        let dir = tempfile::tempdir().unwrap();

        let path = stage_cookies(SAMPLE, dir.path()).await.unwrap();
        let path = path.expect("valid cookies should be staged");
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            SAMPLE.trim()
        );

        assert!(stage_cookies("", dir.path()).await.unwrap().is_none());
        assert!(stage_cookies("junk", dir.path()).await.unwrap().is_none());
    }
}
