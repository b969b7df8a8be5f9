//! Image decoding pipeline for Quickcull.
//!
//! This module provides functionality for:
//! - Decoding standard raster images (JPEG, PNG, BMP) with EXIF orientation
//! - Extracting embedded JPEG previews from RAW files (fast path)
//! - Proportional resizing into the thumbnail and preview tiers
//!
//! # Performance Strategy
//!
//! RAW files are never demosaiced. The embedded camera preview is extracted
//! and decoded instead, which is orders of magnitude faster and plenty for
//! culling decisions. Only when extraction fails does a path fall through to
//! the generic decoder.
//!
//! RAW detection is by filename extension alone - no content sniffing - so
//! that the loader can route a path without opening the file.

mod raster;
mod raw_preview;
mod resize;
mod types;

pub use raster::{decode_raster, read_orientation};
pub use raw_preview::{decode_raw_preview, extract_preview_bytes};
pub use resize::{fit_box, resize_to_box, PREVIEW_FILTER, THUMBNAIL_FILTER};
pub use types::{BoxSize, DecodeError, DecodedImage, FilterType, Orientation};

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// Extensions treated as camera RAW containers (case-insensitive).
pub const RAW_EXTENSIONS: &[&str] = &["arw", "cr2", "nef", "dng", "orf"];

/// Whether a path should be routed through embedded-preview extraction.
pub fn is_raw_path(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| RAW_EXTENSIONS.iter().any(|raw| ext.eq_ignore_ascii_case(raw)))
}

/// Decode a file at native resolution, used for interactive zoom.
///
/// RAW paths yield the embedded preview at its stored resolution; raster
/// paths decode fully with orientation applied. No scaling happens here.
///
/// # Errors
///
/// Returns an error if the file cannot be read or no decode path succeeds.
pub fn decode_full(path: &Path) -> Result<DecodedImage, DecodeError> {
    let bytes = fs::read(path)?;

    if is_raw_path(path) {
        match raw_preview::decode_raw_preview(&bytes) {
            Ok(image) => return Ok(image),
            // Fall through: the extension may be wrong, or the container
            // unusual enough that the generic decoder gets a chance
            Err(err) => tracing::debug!(
                path = %path.display(),
                error = %err,
                "embedded preview extraction failed, trying generic decode"
            ),
        }
    }

    decode_raster(&bytes)
}

/// Decode a file and scale it proportionally into `max_box`.
///
/// This is the entry point the loader uses for both resolution tiers; the
/// filter selects the speed/quality tradeoff per tier.
///
/// # Errors
///
/// Returns an error if the file cannot be read, decoded, or resized.
pub fn decode_to_box(
    path: &Path,
    max_box: BoxSize,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    let full = decode_full(path)?;
    resize_to_box(&full, max_box, filter)
}
