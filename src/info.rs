//! Read-only asset inspection.
//!
//! `asset_info` answers "what is this file" without converting anything:
//! dimensions and color mode for rasters, page count and the info
//! dictionary for documents, plus timestamps, the EXIF summary, and the
//! derived GPS view.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::codec::CodecProvider;
use crate::error::{ConvertError, Result};
use crate::formats::FormatToken;
use crate::metadata::{DocumentInfo, ExifSummary, GpsPosition, Scalar, Timestamps};

/// Everything knowable about one asset without modifying it.
#[derive(Debug, Clone, Serialize)]
pub struct AssetInfo {
    pub path: PathBuf,
    pub format: FormatToken,
    /// Pixel dimensions; absent for documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Decoded color mode, e.g. "rgb8" or "rgba16"; absent for documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<String>,
    pub timestamps: Timestamps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifSummary>,
    /// Decimal-degree view derived from the raw EXIF GPS rationals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsPosition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Scalar>,
    /// Document fields; present only for multi-page sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRecord>,
}

/// Document-specific portion of [`AssetInfo`].
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub page_count: usize,
    pub info: DocumentInfo,
    /// First page's (width, height) in points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page_size: Option<(f32, f32)>,
}

/// Inspect one asset. Never writes.
pub fn asset_info(path: &Path, codec: &Arc<dyn CodecProvider>) -> Result<AssetInfo> {
    if !path.exists() {
        return Err(ConvertError::NotFound(path.to_path_buf()));
    }
    let format = FormatToken::classify(path).ok_or_else(|| ConvertError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string(),
    })?;

    let timestamps = Timestamps::capture(path)?;

    if format.is_document() {
        let handle = codec.open_document(path)?;
        return Ok(AssetInfo {
            path: path.to_path_buf(),
            format,
            width: None,
            height: None,
            color_mode: None,
            timestamps,
            exif: None,
            gps: None,
            extras: BTreeMap::new(),
            document: Some(DocumentRecord {
                page_count: handle.page_count,
                info: handle.info,
                first_page_size: handle.first_page_size,
            }),
        });
    }

    let decoded = codec.decode(path, format)?;
    let gps = decoded.exif.as_ref().and_then(|e| e.gps());

    Ok(AssetInfo {
        path: path.to_path_buf(),
        format,
        width: Some(decoded.image.width()),
        height: Some(decoded.image.height()),
        color_mode: Some(color_mode_name(decoded.image.color()).to_string()),
        timestamps,
        exif: decoded.exif,
        gps,
        extras: decoded.extras,
        document: None,
    })
}

fn color_mode_name(color: image::ColorType) -> &'static str {
    use image::ColorType;
    match color {
        ColorType::L8 => "l8",
        ColorType::La8 => "la8",
        ColorType::Rgb8 => "rgb8",
        ColorType::Rgba8 => "rgba8",
        ColorType::L16 => "l16",
        ColorType::La16 => "la16",
        ColorType::Rgb16 => "rgb16",
        ColorType::Rgba16 => "rgba16",
        ColorType::Rgb32F => "rgb32f",
        ColorType::Rgba32F => "rgba32f",
        _ => "unknown",
    }
}
