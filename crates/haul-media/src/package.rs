//! Multi-item artifact packaging.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{MediaError, MediaResult};
use crate::sanitize::sanitize_filename;

/// Bundle finished files into a ZIP archive at `dest`.
///
/// Entry names are flattened and sanitized; collisions get a numeric
/// suffix. Returns the archive size in bytes. Runs on the blocking
/// pool since the zip crate's writer is synchronous.
pub async fn create_zip(files: Vec<PathBuf>, dest: PathBuf) -> MediaResult<u64> {
    let archive = dest.clone();
    let size = tokio::task::spawn_blocking(move || build_zip(&files, &archive))
        .await
        .map_err(|e| MediaError::internal(format!("zip task panicked: {e}")))??;

    info!(archive = %dest.display(), size, "created ZIP artifact");
    Ok(size)
}

fn build_zip(files: &[PathBuf], dest: &Path) -> MediaResult<u64> {
    let out = std::fs::File::create(dest)?;
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used: HashSet<String> = HashSet::new();
    for path in files {
        let base = path
            .file_name()
            .map(|n| sanitize_filename(&n.to_string_lossy()))
            .unwrap_or_else(|| "download".to_string());
        let name = unique_name(&base, &mut used);

        zip.start_file(name, options)?;
        let mut input = std::fs::File::open(path)?;
        io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?;

    Ok(dest.metadata()?.len())
}

/// Disambiguate duplicate entry names with ` (n)` before the extension.
fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };
    for n in 1.. {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("counter space exhausted");
}
