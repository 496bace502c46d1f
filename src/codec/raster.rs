//! Raster half of the built-in provider: `image`-backed decode/encode with
//! per-format save defaults, EXIF extraction via `kamadak-exif`, and EXIF
//! carry-over via `little_exif`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use exif::{In, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};

use super::{Decoded, EncodeOptions};
use crate::error::{ConvertError, Result};
use crate::formats::FormatToken;
use crate::metadata::{ExifSummary, GpsAltitude, GpsCoordinate, GpsRational, Scalar};

/// Decode a raster file, opportunistically parsing EXIF when the source
/// format carries it.
pub(super) fn decode(path: &Path, token: FormatToken) -> Result<Decoded> {
    let reader = image::ImageReader::open(path)?
        .with_guessed_format()
        .map_err(|e| ConvertError::codec(path, format!("cannot detect format: {e}")))?;
    let image = reader
        .decode()
        .map_err(|e| ConvertError::codec(path, e))?;

    let (exif, extras) = if token.supports_exif() {
        read_native_metadata(path)
    } else {
        (None, BTreeMap::new())
    };

    Ok(Decoded { image, exif, extras })
}

/// Encode with the destination format's save defaults.
///
/// Lossy formats take the quality knob; lossless-with-compression formats
/// use a fixed scheme (PNG default deflate, TIFF's encoder-default
/// compression); JPEG disallows alpha and is coerced to 3-channel color.
pub(super) fn encode(
    image: &DynamicImage,
    token: FormatToken,
    options: &EncodeOptions,
    dest: &Path,
) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let quality = options.quality.clamp(1, 100);

    let result = match token {
        FormatToken::Jpeg => {
            // JPEG has no alpha channel; force 3-channel color.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, quality))
        }
        FormatToken::Png => image.write_with_encoder(PngEncoder::new_with_quality(
            &mut cursor,
            CompressionType::Default,
            FilterType::Adaptive,
        )),
        FormatToken::Tiff => image.write_with_encoder(TiffEncoder::new(&mut cursor)),
        FormatToken::WebP => {
            // image's WebP encoder is lossless-only; the quality knob does
            // not apply.
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut cursor))
        }
        FormatToken::Bmp => image.write_to(&mut cursor, ImageFormat::Bmp),
        #[cfg(feature = "avif")]
        FormatToken::Avif => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut cursor,
                4,
                quality,
            ))
        }
        // Raw/Heif/Pdf and feature-gated Avif are rejected by the caller.
        other => {
            return Err(ConvertError::codec(
                dest,
                format!("no raster encoder for {other}"),
            ))
        }
    };

    result.map_err(|e| ConvertError::codec(dest, e))?;
    Ok(cursor.into_inner())
}

/// Copy the embedded EXIF tree from `source` onto `dest`.
///
/// Reads the full tag set rather than individual fields so unknown maker
/// notes survive the trip.
pub(super) fn carry_exif(source: &Path, dest: &Path) -> Result<()> {
    let metadata = little_exif::metadata::Metadata::new_from_path(source).map_err(|e| {
        ConvertError::Codec {
            path: source.to_path_buf(),
            message: format!("cannot read EXIF: {e:?}"),
        }
    })?;
    // little_exif can panic when the destination has no existing EXIF
    // segment; contain it so carry-over stays best-effort.
    let written = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        metadata.write_to_file(dest)
    }));
    match written {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConvertError::Codec {
            path: dest.to_path_buf(),
            message: format!("cannot write EXIF: {e:?}"),
        }),
        Err(_) => Err(ConvertError::Codec {
            path: dest.to_path_buf(),
            message: "EXIF writer panicked".to_string(),
        }),
    }
}

/// Extract the EXIF summary and scalar extras from an image file.
///
/// Returns empty values if the file has no EXIF data or parsing fails;
/// partial data is fine. Intentionally lenient: metadata is never fatal.
pub(super) fn read_native_metadata(
    path: &Path,
) -> (Option<ExifSummary>, BTreeMap<String, Scalar>) {
    let Some(exif) = read_container(path) else {
        return (None, BTreeMap::new());
    };

    // Stated pixel density round-trips as opaque extras rather than as
    // summary fields.
    let mut extras = BTreeMap::new();
    if let Some(x) = get_rational(&exif, Tag::XResolution) {
        extras.insert("dpi_x".to_string(), Scalar::Float(x));
    }
    if let Some(y) = get_rational(&exif, Tag::YResolution) {
        extras.insert("dpi_y".to_string(), Scalar::Float(y));
    }

    let summary = ExifSummary {
        camera_make: get_string(&exif, Tag::Make),
        camera_model: get_string(&exif, Tag::Model),
        captured_at: get_datetime(&exif),
        exposure_time: exif
            .get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| format!("{}s", f.display_value())),
        f_number: exif
            .get_field(Tag::FNumber, In::PRIMARY)
            .map(|f| format!("f/{}", f.display_value())),
        iso: get_u32(&exif, Tag::PhotographicSensitivity),
        focal_length: get_focal_length(&exif),
        orientation: get_u32(&exif, Tag::Orientation),
        description: get_string(&exif, Tag::ImageDescription),
        artist: get_string(&exif, Tag::Artist),
        gps_latitude: get_gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        gps_longitude: get_gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        gps_altitude: get_gps_altitude(&exif),
    };

    let summary = if summary.is_empty() {
        None
    } else {
        Some(summary)
    };
    (summary, extras)
}

fn read_container(path: &Path) -> Option<exif::Exif> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    exif::Reader::new().read_from_container(&mut reader).ok()
}

fn get_rational(exif: &exif::Exif, tag: Tag) -> Option<f64> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Rational(v) => v.first().map(|r| r.to_f64()),
            _ => None,
        })
}

fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY).map(|f| {
        let s = f.display_value().to_string();
        s.trim_matches('"').to_string()
    })
}

fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| u32::from(x)),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
}

/// Capture datetime, preferring DateTimeOriginal over DateTime.
fn get_datetime(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
        .map(|f| f.display_value().to_string().trim_matches('"').to_string())
}

fn get_focal_length(exif: &exif::Exif) -> Option<f32> {
    exif.get_field(Tag::FocalLength, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Rational(v) => v.first().map(|r| r.to_f64() as f32),
            _ => None,
        })
}

/// Read a GPS coordinate as its raw degree/minute/second rationals plus
/// hemisphere reference. Conversion to decimal happens in the metadata
/// model, not here.
fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<GpsCoordinate> {
    let coord = exif.get_field(coord_tag, In::PRIMARY)?;
    let reference = exif.get_field(ref_tag, In::PRIMARY)?;

    let dms = match &coord.value {
        Value::Rational(rationals) if rationals.len() >= 3 => [
            GpsRational::new(rationals[0].num, rationals[0].denom),
            GpsRational::new(rationals[1].num, rationals[1].denom),
            GpsRational::new(rationals[2].num, rationals[2].denom),
        ],
        _ => return None,
    };

    let ref_str = reference.display_value().to_string();
    let reference = ref_str
        .chars()
        .find(|c| matches!(c, 'N' | 'S' | 'E' | 'W'))?;

    Some(GpsCoordinate { dms, reference })
}

fn get_gps_altitude(exif: &exif::Exif) -> Option<GpsAltitude> {
    let altitude = exif.get_field(Tag::GPSAltitude, In::PRIMARY)?;
    let value = match &altitude.value {
        Value::Rational(v) => v.first().map(|r| GpsRational::new(r.num, r.denom))?,
        _ => return None,
    };

    // Reference byte: 0 = above sea level, 1 = below. Absent means above.
    let below_sea_level = exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .map(|f| match &f.value {
            Value::Byte(v) => v.first() == Some(&1),
            _ => false,
        })
        .unwrap_or(false);

    Some(GpsAltitude {
        value,
        below_sea_level,
    })
}
