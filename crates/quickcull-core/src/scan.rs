//! Folder enumeration for the filmstrip.
//!
//! A folder is scanned non-recursively, keeping regular files with a
//! supported extension and handing back a lexicographically sorted list.
//! That sorted list is exactly what the loader's `set_paths` expects.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::decode::RAW_EXTENSIONS;

/// Non-RAW raster extensions accepted into the filmstrip.
const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read folder {path}: {source}")]
    ReadFolder {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Whether a file would be picked up by a folder scan.
pub fn is_supported(path: &Path) -> bool {
    path.extension().and_then(OsStr::to_str).is_some_and(|ext| {
        RASTER_EXTENSIONS
            .iter()
            .chain(RAW_EXTENSIONS)
            .any(|supported| ext.eq_ignore_ascii_case(supported))
    })
}

/// Enumerate the supported images directly inside `dir`, sorted
/// lexicographically.
///
/// Subdirectories are not descended into. An unreadable entry is skipped
/// with a warning; an unreadable folder is an error.
pub fn scan_folder(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.path().is_none_or(|p| p == dir) {
                    return Err(ScanError::ReadFolder {
                        path: dir.to_path_buf(),
                        source: err,
                    });
                }
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    Ok(paths)
}
