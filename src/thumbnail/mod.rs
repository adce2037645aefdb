//! `ThumbnailMaker` (component C2): bounded-box resize that preserves
//! aspect ratio. See spec.md section 4.2.

use image::imageops::FilterType;
use image::ImageFormat;
use thiserror::Error;
use tracing::warn;

/// Longest edge of a generated thumbnail, in pixels, absent an override
/// from `Settings::thumb_max_edge`.
pub const DEFAULT_MAX_EDGE: u32 = 512;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("failed to decode source image: {0}")]
    Decode(String),
    #[error("failed to encode thumbnail: {0}")]
    Encode(String),
}

/// Resizes `bytes` so its longest edge is at most `max_edge`, preserving
/// aspect ratio and EXIF orientation (spec.md section 4.2), and re-encodes
/// as JPEG. Never upscales: images already within bounds pass through a
/// lossless re-encode at full fidelity. `orientation` is the raw EXIF
/// `Orientation` tag value (1-8); `None` or `1` leaves the image untouched.
///
/// # Errors
/// Returns `ThumbnailError` if the source can't be decoded or the result
/// can't be encoded. Callers treat thumbnail failure as non-fatal
/// (spec.md section 4.2, "Decode failure") and proceed without one.
pub fn make_thumbnail(
    bytes: &[u8],
    max_edge: u32,
    orientation: Option<u16>,
) -> Result<Vec<u8>, ThumbnailError> {
    let img = image::load_from_memory(bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
    let img = apply_orientation(img, orientation);

    let (width, height) = (img.width(), img.height());
    let longest = width.max(height);

    let resized = if longest <= max_edge {
        img
    } else {
        img.resize(max_edge, max_edge, FilterType::Lanczos3)
    };

    let mut out = Vec::new();
    resized
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
    Ok(out)
}

/// Rotates/flips a decoded image to upright per the EXIF `Orientation`
/// convention (values 1-8). `image::load_from_memory` never applies this
/// itself, so it has to happen here before resizing.
fn apply_orientation(img: image::DynamicImage, orientation: Option<u16>) -> image::DynamicImage {
    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}

/// Best-effort variant used by the process worker: logs and returns `None`
/// on any failure rather than propagating, since a missing thumbnail never
/// blocks clustering or metadata (spec.md section 4.2).
pub fn try_make_thumbnail(bytes: &[u8], max_edge: u32, orientation: Option<u16>) -> Option<Vec<u8>> {
    match make_thumbnail(bytes, max_edge, orientation) {
        Ok(thumb) => Some(thumb),
        Err(e) => {
            warn!("thumbnail generation failed, continuing without one: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        vec![
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
            0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08,
            0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xDD, 0x8D,
            0xB0, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ]
    }

    #[test]
    fn small_image_passes_through_without_upscaling() {
        let thumb = make_thumbnail(&tiny_png(), DEFAULT_MAX_EDGE, None).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), 1);
        assert_eq!(decoded.height(), 1);
    }

    #[test]
    fn garbage_input_fails_decode_not_panic() {
        let result = make_thumbnail(b"not an image", DEFAULT_MAX_EDGE, None);
        assert!(matches!(result, Err(ThumbnailError::Decode(_))));
    }

    #[test]
    fn orientation_six_rotates_90_degrees() {
        // A landscape image; orientation 6 (90deg CW) should swap dimensions.
        let mut buf = Vec::new();
        image::DynamicImage::new_rgb8(4, 2)
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();

        let thumb = make_thumbnail(&buf, DEFAULT_MAX_EDGE, Some(6)).unwrap();
        let rotated = image::load_from_memory(&thumb).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
    }

    #[test]
    fn orientation_one_and_none_are_untouched() {
        let thumb_none = make_thumbnail(&tiny_png(), DEFAULT_MAX_EDGE, None).unwrap();
        let thumb_one = make_thumbnail(&tiny_png(), DEFAULT_MAX_EDGE, Some(1)).unwrap();
        let decoded_none = image::load_from_memory(&thumb_none).unwrap();
        let decoded_one = image::load_from_memory(&thumb_one).unwrap();
        assert_eq!((decoded_none.width(), decoded_none.height()), (1, 1));
        assert_eq!((decoded_one.width(), decoded_one.height()), (1, 1));
    }

    #[test]
    fn try_make_thumbnail_is_none_on_failure() {
        assert!(try_make_thumbnail(b"garbage", DEFAULT_MAX_EDGE, None).is_none());
    }
}
