//! Error types for pixport conversions.
//!
//! The taxonomy distinguishes precondition failures (missing files,
//! unsupported or codec-gated formats) from codec failures wrapping the
//! underlying decode/encode machinery. Metadata degradation is never an
//! error: it is logged and the pixel conversion proceeds.

use std::path::PathBuf;
use thiserror::Error;

use crate::formats::FormatToken;

/// Top-level error type for conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Source file or input root does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// The file extension is not a recognized, supported format.
    /// Checked before any I/O happens.
    #[error("unsupported format for {path}: {extension:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The format is recognized but requires an optional codec that is not
    /// present in this build or on this system.
    #[error("codec unavailable for {format}: {hint}")]
    CodecUnavailable { format: FormatToken, hint: String },

    /// Conversions with no defined target semantics (e.g. encoding to
    /// sensor RAW, which is source-only by design).
    #[error("conversion to {format} is not supported")]
    Unimplemented { format: FormatToken },

    /// Every requested page index is outside `[0, page_count)`.
    #[error("no valid pages in {requested:?} (document has {page_count} pages)")]
    InvalidPageRange {
        requested: Vec<usize>,
        page_count: usize,
    },

    /// Wraps an underlying decode/encode/rasterize failure.
    #[error("codec failure for {path}: {message}")]
    Codec { path: PathBuf, message: String },

    /// A document operation was attempted on an empty or malformed PDF.
    #[error("document error for {path}: {message}")]
    Document { path: PathBuf, message: String },

    /// General I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Shorthand for wrapping a codec-layer error with its path context.
    pub(crate) fn codec(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Codec {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Shorthand for wrapping a document-layer error with its path context.
    pub(crate) fn document(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Document {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience type alias for pixport results.
pub type Result<T> = std::result::Result<T, ConvertError>;
