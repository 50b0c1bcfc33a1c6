//! Filename sanitization for archive entries and download headers.

/// Longest name we emit, matching the yt-dlp `--trim-filenames` limit.
const MAX_LEN: usize = 184;

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a string safe to use as a bare filename.
///
/// Path separators, Windows-reserved punctuation and control characters
/// become underscores; leading and trailing dots go away so the result
/// can never climb directories or hide itself. Overlong names are cut
/// ahead of the extension.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control() || FORBIDDEN.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        return "download".to_string();
    }

    if trimmed.chars().count() <= MAX_LEN {
        return trimmed.to_string();
    }

    // Keep the extension when shortening.
    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().count() <= 10 => {
            let keep = MAX_LEN.saturating_sub(ext.chars().count() + 1);
            let stem: String = stem.chars().take(keep).collect();
            format!("{stem}.{ext}")
        }
        _ => trimmed.chars().take(MAX_LEN).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_and_controls_become_underscores() {
        assert_eq!(sanitize_filename("a/b\\c.mp3"), "a_b_c.mp3");
        assert_eq!(sanitize_filename("tab\there.mp3"), "tab_here.mp3");
        assert_eq!(sanitize_filename("quo\"te?.mp4"), "quo_te_.mp4");
    }

    #[test]
    fn traversal_attempts_are_neutralized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("..."), "download");
        assert_eq!(sanitize_filename(""), "download");
    }

    #[test]
    fn long_names_keep_their_extension() {
        let long = format!("{}.mp3", "x".repeat(300));
        let out = sanitize_filename(&long);
        assert!(out.chars().count() <= MAX_LEN);
        assert!(out.ends_with(".mp3"));
    }

    #[test]
    fn ordinary_names_pass_through() {
        assert_eq!(
            sanitize_filename("Song Title - Artist.mp3"),
            "Song Title - Artist.mp3"
        );
    }
}
