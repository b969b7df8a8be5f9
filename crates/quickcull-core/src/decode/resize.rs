//! Proportional image resizing for the thumbnail and preview tiers.
//!
//! All functions return new `DecodedImage` instances without modifying the
//! input.

use super::{BoxSize, DecodeError, DecodedImage, FilterType};

/// Filter used for filmstrip thumbnails - speed over quality.
pub const THUMBNAIL_FILTER: FilterType = FilterType::Bilinear;

/// Filter used for the main viewing pane - quality over speed.
pub const PREVIEW_FILTER: FilterType = FilterType::Lanczos3;

/// Compute the dimensions that fit a source image proportionally inside a
/// bounding box.
///
/// The scale factor is `min(box_w / w, box_h / h)`, applied to both axes and
/// rounded; the aspect ratio is preserved and the output never exceeds the
/// box on either axis. A degenerate source (either dimension zero) yields
/// the box dimensions unchanged rather than dividing by zero.
pub fn fit_box(width: u32, height: u32, max_box: BoxSize) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_box.width, max_box.height);
    }

    let scale = f64::min(
        f64::from(max_box.width) / f64::from(width),
        f64::from(max_box.height) / f64::from(height),
    );

    let out_w = (f64::from(width) * scale).round() as u32;
    let out_h = (f64::from(height) * scale).round() as u32;
    (out_w.max(1), out_h.max(1))
}

/// Resize an image to fit proportionally inside `max_box`.
///
/// # Errors
///
/// Returns `DecodeError::CorruptedFile` if the source pixel buffer cannot be
/// reinterpreted as an RGB image.
pub fn resize_to_box(
    image: &DecodedImage,
    max_box: BoxSize,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    let (width, height) = fit_box(image.width, image.height, max_box);

    // Fast path: already at the target size
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let rgb_image = image
        .to_rgb_image()
        .ok_or_else(|| DecodeError::CorruptedFile("pixel buffer size mismatch".to_string()))?;

    let resized = image::imageops::resize(&rgb_image, width, height, filter.to_image_filter());
    Ok(DecodedImage::from_rgb_image(resized))
}
