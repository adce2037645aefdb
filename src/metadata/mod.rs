//! `MetadataExtractor` (component C1): parses EXIF/GPS from an image file
//! and produces a canonical `PhotoMetadata`. See spec.md section 4.1.
//!
//! A closed record type, not an open map (spec.md section 9, "Dynamic
//! dicts as metadata") — unknown EXIF tags are simply not read.

use std::io::Cursor;

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMetadata {
    pub shot_at: Option<DateTime<Utc>>,
    pub gps: Option<(f64, f64)>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    /// Raw EXIF `Orientation` tag value (1-8), consumed by
    /// `thumbnail::make_thumbnail` to rotate/flip before resizing.
    pub orientation: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// `jpg`/`jpeg`, `png`, `tiff`, `heic`/`heif` are the mimes spec.md names.
/// HEIC decoding is best-effort (spec.md section 12): this build has no HEIC
/// decoder linked in, so `supports_heic` is `false` and HEIC inputs report
/// `MetadataUnavailable` at the call site instead of failing ingest.
#[must_use]
pub fn supports_heic() -> bool {
    false
}

#[must_use]
pub fn is_supported_mime(mime: &str) -> bool {
    matches!(
        mime,
        "image/jpeg" | "image/png" | "image/tiff" | "image/heic" | "image/heif"
    )
}

/// Extracts `PhotoMetadata` from raw image bytes. Pure aside from reading
/// the provided byte slice — no filesystem or network I/O.
///
/// # Errors
/// Returns `ExtractError::UnsupportedMime` for mimes outside spec.md's
/// accepted set, or `ExtractError::Decode` if dimensions can't be read from
/// a mime that should support it.
pub fn extract(bytes: &[u8], mime: &str) -> Result<PhotoMetadata, ExtractError> {
    if !is_supported_mime(mime) {
        return Err(ExtractError::UnsupportedMime(mime.to_string()));
    }

    if (mime == "image/heic" || mime == "image/heif") && !supports_heic() {
        warn!("HEIC extraction unavailable, returning metadata-less result");
        return Ok(PhotoMetadata {
            shot_at: None,
            gps: None,
            width: None,
            height: None,
            camera_make: None,
            camera_model: None,
            orientation: None,
        });
    }

    let (width, height) = image_dimensions(bytes, mime);
    let exif = read_exif(bytes);

    Ok(PhotoMetadata {
        shot_at: exif.as_ref().and_then(|e| e.shot_at),
        gps: exif.as_ref().and_then(|e| e.gps),
        width,
        height,
        camera_make: exif.as_ref().and_then(|e| e.camera_make.clone()),
        camera_model: exif.as_ref().and_then(|e| e.camera_model.clone()),
        orientation: exif.as_ref().and_then(|e| e.orientation),
    })
}

fn image_dimensions(bytes: &[u8], mime: &str) -> (Option<u32>, Option<u32>) {
    let format = match mime {
        "image/jpeg" => image::ImageFormat::Jpeg,
        "image/png" => image::ImageFormat::Png,
        "image/tiff" => image::ImageFormat::Tiff,
        _ => return (None, None),
    };
    match image::load_from_memory_with_format(bytes, format) {
        Ok(img) => (Some(img.width()), Some(img.height())),
        Err(e) => {
            warn!("failed to read image dimensions: {}", e);
            (None, None)
        }
    }
}

struct ExifFields {
    shot_at: Option<DateTime<Utc>>,
    gps: Option<(f64, f64)>,
    camera_make: Option<String>,
    camera_model: Option<String>,
    orientation: Option<u16>,
}

fn read_exif(bytes: &[u8]) -> Option<ExifFields> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;

    let shot_at = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTimeDigitized, In::PRIMARY))
        .and_then(|field| parse_exif_datetime(&field.display_value().to_string()));

    let gps = read_gps(&exif).filter(|&(lat, lon)| is_valid_coordinate(lat, lon));

    let camera_make = exif
        .get_field(Tag::Make, In::PRIMARY)
        .map(|f| f.display_value().to_string());
    let camera_model = exif
        .get_field(Tag::Model, In::PRIMARY)
        .map(|f| f.display_value().to_string());
    let orientation = read_orientation(&exif);

    Some(ExifFields { shot_at, gps, camera_make, camera_model, orientation })
}

fn read_orientation(exif: &exif::Exif) -> Option<u16> {
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match &field.value {
        Value::Short(values) => values.first().copied(),
        _ => None,
    }
}

/// EXIF ASCII datetimes are `"YYYY:MM:DD HH:MM:SS"`, with no timezone;
/// treated as UTC in the absence of one (spec.md doesn't require timezone
/// resolution beyond what EXIF itself carries). `display_value()` renders
/// that colon-separated form verbatim, so the date portion's colons have to
/// be swapped for dashes before `chrono` can parse it.
fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.len() < 19 {
        return None;
    }
    let date = raw[..10].replace(':', "-");
    let normalized = format!("{date} {}", &raw[11..19]);
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
}

fn read_gps(exif: &exif::Exif) -> Option<(f64, f64)> {
    let lat = dms_to_degrees(exif.get_field(Tag::GPSLatitude, In::PRIMARY)?)?;
    let lat_ref = exif
        .get_field(Tag::GPSLatitudeRef, In::PRIMARY)
        .map(|f| f.display_value().to_string())
        .unwrap_or_default();
    let lon = dms_to_degrees(exif.get_field(Tag::GPSLongitude, In::PRIMARY)?)?;
    let lon_ref = exif
        .get_field(Tag::GPSLongitudeRef, In::PRIMARY)
        .map(|f| f.display_value().to_string())
        .unwrap_or_default();

    let signed_lat = if lat_ref.contains('S') { -lat } else { lat };
    let signed_lon = if lon_ref.contains('W') { -lon } else { lon };
    Some((signed_lat, signed_lon))
}

fn dms_to_degrees(field: &exif::Field) -> Option<f64> {
    match &field.value {
        Value::Rational(values) if values.len() == 3 => {
            let degrees = values[0].to_f64();
            let minutes = values[1].to_f64();
            let seconds = values[2].to_f64();
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        _ => None,
    }
}

/// Invalid coordinates (section 4.1) are dropped, not errors.
fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_mime() {
        let result = extract(b"not an image", "application/pdf");
        assert!(matches!(result, Err(ExtractError::UnsupportedMime(_))));
    }

    #[test]
    fn heic_without_capability_is_metadata_less_not_an_error() {
        let result = extract(b"whatever", "image/heic").unwrap();
        assert_eq!(result.shot_at, None);
        assert_eq!(result.gps, None);
    }

    #[test]
    fn invalid_coordinates_are_dropped() {
        assert!(!is_valid_coordinate(91.0, 0.0));
        assert!(!is_valid_coordinate(0.0, 181.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
        assert!(is_valid_coordinate(45.0, -122.0));
    }

    #[test]
    fn exif_datetime_without_timezone_parses_as_utc() {
        use chrono::TimeZone;
        assert_eq!(
            parse_exif_datetime("2024:06:10 10:00:00"),
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn plain_image_without_exif_has_no_shot_at() {
        // A minimal 1x1 PNG with no EXIF segment at all.
        let png: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
            0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08,
            0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xDD, 0x8D,
            0xB0, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ];
        let metadata = extract(png, "image/png").unwrap();
        assert_eq!(metadata.shot_at, None);
        assert_eq!(metadata.width, Some(1));
        assert_eq!(metadata.height, Some(1));
    }
}
