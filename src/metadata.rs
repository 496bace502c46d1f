//! The canonical in-memory metadata model.
//!
//! These records are built when an asset is loaded and dropped after the
//! conversion that used them. The model is format-agnostic in
//! representation but format-aware in validity: the EXIF category is only
//! meaningful when the bound format can carry it, and the GPS record is a
//! derived *view* over the raw EXIF rationals, never re-encoded.

use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File timestamps captured at load time and applied at save time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<SystemTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<SystemTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<SystemTime>,
}

impl Timestamps {
    /// Snapshot the timestamps of an existing file.
    pub fn capture(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            created: meta.created().ok(),
            modified: meta.modified().ok(),
            accessed: meta.accessed().ok(),
        })
    }

    /// Apply the captured modified/accessed times to `path`.
    ///
    /// Creation time has no portable setter and is silently skipped; the
    /// modified and accessed times are restored exactly, to the precision
    /// the filesystem supports.
    pub fn apply(&self, path: &Path) -> Result<()> {
        let mut times = FileTimes::new();
        if let Some(accessed) = self.accessed {
            times = times.set_accessed(accessed);
        }
        if let Some(modified) = self.modified {
            times = times.set_modified(modified);
        }
        let file = File::options().write(true).open(path)?;
        file.set_times(times)?;
        Ok(())
    }
}

/// A single EXIF unsigned rational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsRational {
    pub num: u32,
    pub den: u32,
}

impl GpsRational {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }
}

/// A latitude or longitude as stored in EXIF: degree/minute/second rationals
/// plus a hemisphere reference (`N`/`S` or `E`/`W`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpsCoordinate {
    pub dms: [GpsRational; 3],
    pub reference: char,
}

impl GpsCoordinate {
    /// Decimal degrees: `deg + min/60 + sec/3600`, negated for the southern
    /// and western hemispheres. Exact to IEEE double precision.
    pub fn to_decimal(&self) -> f64 {
        let [deg, min, sec] = self.dms;
        let value = deg.to_f64() + min.to_f64() / 60.0 + sec.to_f64() / 3600.0;
        if self.reference == 'S' || self.reference == 'W' {
            -value
        } else {
            value
        }
    }
}

/// Altitude rational with its below-sea-level flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpsAltitude {
    pub value: GpsRational,
    pub below_sea_level: bool,
}

impl GpsAltitude {
    pub fn to_decimal(&self) -> f64 {
        let value = self.value.to_f64();
        if self.below_sea_level {
            -value
        } else {
            value
        }
    }
}

/// Derived GPS position in decimal degrees / meters.
///
/// This is a read-only view computed from the raw rationals; the rationals
/// themselves are what an EXIF-capable destination would carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpsPosition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// Structured EXIF summary extracted opportunistically at decode time.
///
/// All fields are optional: parse failures degrade to partial data and are
/// never fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExifSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    /// Exposure time as displayed, e.g. "1/250s".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,
    /// Aperture as displayed, e.g. "f/2.8".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
    /// TIFF ImageDescription; used as the document title when a single
    /// image becomes a one-page document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// TIFF Artist; used as the document author in the same case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude: Option<GpsCoordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude: Option<GpsCoordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_altitude: Option<GpsAltitude>,
}

impl ExifSummary {
    /// Derive the decimal GPS view, if any GPS tags were present.
    pub fn gps(&self) -> Option<GpsPosition> {
        if self.gps_latitude.is_none()
            && self.gps_longitude.is_none()
            && self.gps_altitude.is_none()
        {
            return None;
        }
        Some(GpsPosition {
            latitude: self.gps_latitude.map(|c| c.to_decimal()),
            longitude: self.gps_longitude.map(|c| c.to_decimal()),
            altitude: self.gps_altitude.map(|a| a.to_decimal()),
        })
    }

    /// Whether any field carries data.
    pub fn is_empty(&self) -> bool {
        self.camera_make.is_none()
            && self.camera_model.is_none()
            && self.captured_at.is_none()
            && self.exposure_time.is_none()
            && self.f_number.is_none()
            && self.iso.is_none()
            && self.focal_length.is_none()
            && self.orientation.is_none()
            && self.description.is_none()
            && self.artist.is_none()
            && self.gps_latitude.is_none()
            && self.gps_longitude.is_none()
            && self.gps_altitude.is_none()
    }
}

/// A scalar format-native info value that round-trips opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

/// Document-level metadata, present only for multi-page sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rational(num: u32, den: u32) -> GpsRational {
        GpsRational::new(num, den)
    }

    #[test]
    fn test_gps_latitude_north() {
        // 40 deg 26 min 46 sec N -> 40.446111...
        let coord = GpsCoordinate {
            dms: [rational(40, 1), rational(26, 1), rational(46, 1)],
            reference: 'N',
        };
        let decimal = coord.to_decimal();
        assert!((decimal - 40.446111).abs() < 1e-6, "got {decimal}");
    }

    #[test]
    fn test_gps_latitude_south_flips_sign() {
        let coord = GpsCoordinate {
            dms: [rational(40, 1), rational(26, 1), rational(46, 1)],
            reference: 'S',
        };
        assert!((coord.to_decimal() + 40.446111).abs() < 1e-6);
    }

    #[test]
    fn test_gps_longitude_west_flips_sign() {
        let coord = GpsCoordinate {
            dms: [rational(79, 1), rational(58, 1), rational(56, 1)],
            reference: 'W',
        };
        assert!(coord.to_decimal() < 0.0);
    }

    #[test]
    fn test_gps_fractional_rationals() {
        // Sub-second precision stored as 4630/100 seconds.
        let coord = GpsCoordinate {
            dms: [rational(40, 1), rational(26, 1), rational(4630, 100)],
            reference: 'N',
        };
        let expected = 40.0 + 26.0 / 60.0 + 46.30 / 3600.0;
        assert!((coord.to_decimal() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_altitude_below_sea_level() {
        let alt = GpsAltitude {
            value: rational(425, 10),
            below_sea_level: true,
        };
        assert!((alt.to_decimal() + 42.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominator_does_not_panic() {
        assert_eq!(rational(1, 0).to_f64(), 0.0);
    }

    #[test]
    fn test_gps_view_absent_without_tags() {
        let summary = ExifSummary::default();
        assert!(summary.gps().is_none());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_timestamps_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        let dest = dir.path().join("dest.bin");
        std::fs::write(&source, b"a").unwrap();
        std::fs::write(&dest, b"b").unwrap();

        let captured = Timestamps::capture(&source).unwrap();
        captured.apply(&dest).unwrap();

        let restored = Timestamps::capture(&dest).unwrap();
        assert_eq!(captured.modified, restored.modified);
    }
}
