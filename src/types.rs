//! Core data types shared across the conversion pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::formats::FormatToken;

/// An immutable reference to one input or output file: path, detected
/// format token, and an existence/mtime snapshot taken at probe time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<FormatToken>,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<SystemTime>,
}

impl Asset {
    /// Snapshot a path: classify the extension and record existence/mtime.
    pub fn probe(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = FormatToken::classify(&path);
        let meta = std::fs::metadata(&path).ok();
        Self {
            exists: meta.is_some(),
            modified: meta.and_then(|m| m.modified().ok()),
            path,
            token,
        }
    }
}

/// Options for a single conversion.
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    /// Quality for lossy destination formats, clamped to `[1, 100]`.
    pub quality: u8,
    /// Rasterization density for document sources (`zoom = dpi / 72`);
    /// `None` uses the default 2x upscale. Raster encoders in this stack
    /// do not embed a density, so the value has no effect on
    /// raster-to-raster conversions.
    pub dpi: Option<(f32, f32)>,
    pub preserve_metadata: bool,
    pub preserve_timestamps: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            quality: 95,
            dpi: None,
            preserve_metadata: true,
            preserve_timestamps: true,
        }
    }
}

impl ConvertOptions {
    pub fn clamped_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }
}

/// One unit of work: source, destination, options. Immutable once created
/// and consumed exactly once by the pipeline.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: Asset,
    pub dest: Asset,
    pub options: ConvertOptions,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>, options: ConvertOptions) -> Self {
        Self {
            source: Asset::probe(source),
            dest: Asset::probe(dest),
            options,
        }
    }
}

/// Outcome of one job. Produced exactly once; never retried automatically.
/// Both variants keep the job's source so reporting can name it.
#[derive(Debug)]
pub enum ConversionResult {
    Success {
        source: Asset,
        output: Asset,
    },
    Failure {
        source: Asset,
        dest: Asset,
        error: ConvertError,
    },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }

    /// Collapse into a plain `Result`, discarding the job context.
    pub fn into_result(self) -> Result<Asset, ConvertError> {
        match self {
            ConversionResult::Success { output, .. } => Ok(output),
            ConversionResult::Failure { error, .. } => Err(error),
        }
    }
}

/// Options for a batch run over a directory tree.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Target format; `None` preserves each source's own format.
    pub output_format: Option<FormatToken>,
    pub recursive: bool,
    pub quality: u8,
    pub preserve_metadata: bool,
    pub preserve_timestamps: bool,
    /// Drop jobs whose destination is already newer than the source.
    pub skip_existing: bool,
    /// `<= 1` runs sequentially in enumeration order; `> 1` uses a bounded
    /// pool of exactly this many concurrent workers.
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_format: None,
            recursive: false,
            quality: 95,
            preserve_metadata: true,
            preserve_timestamps: true,
            skip_existing: true,
            workers: 1,
        }
    }
}

impl BatchOptions {
    pub(crate) fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            quality: self.quality,
            dpi: None,
            preserve_metadata: self.preserve_metadata,
            preserve_timestamps: self.preserve_timestamps,
        }
    }
}

/// Invoked exactly once per discovered job with (source, destination,
/// error-or-none), in every dispatch and delivery mode.
pub type ProgressCallback = Arc<dyn Fn(&Path, &Path, Option<&ConvertError>) + Send + Sync>;
