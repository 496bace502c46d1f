//! The codec provider boundary.
//!
//! Everything that touches actual pixel bytes or PDF internals sits behind
//! [`CodecProvider`]: raster decode/encode, EXIF carry-over, document
//! opening, page rasterization, and document compaction. The pipeline and
//! batch orchestrator only ever talk to this trait, so a custom provider
//! (e.g. one with HEIF or sensor-RAW support) can be injected without
//! touching the pipeline.

mod document;
mod raster;

use std::collections::BTreeMap;
use std::path::Path;

use image::DynamicImage;

use crate::error::{ConvertError, Result};
use crate::formats::{CapabilitySet, FormatToken};
use crate::metadata::{DocumentInfo, ExifSummary, Scalar};

/// Result of decoding a raster asset: the pixel buffer plus whatever
/// format-native metadata could be read.
pub struct Decoded {
    pub image: DynamicImage,
    /// Parsed EXIF, when the source format carries it and parsing worked.
    pub exif: Option<ExifSummary>,
    /// Opaque scalar info fields carried through to the destination.
    pub extras: BTreeMap<String, Scalar>,
}

/// Encoder knobs resolved by the pipeline before calling `encode`.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Quality in `[1, 100]` for lossy formats; ignored by lossless ones.
    pub quality: u8,
}

/// A lightweight snapshot of an opened document: page count, info
/// dictionary, and the first page's point dimensions.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub page_count: usize,
    pub info: DocumentInfo,
    pub first_page_size: Option<(f32, f32)>,
}

/// External collaborator performing pixel decode/encode and document
/// primitives. Implementations must be shareable across worker tasks.
pub trait CodecProvider: Send + Sync {
    /// Optional-codec availability, probed once at construction.
    fn capabilities(&self) -> CapabilitySet;

    /// Decode a raster asset, capturing native metadata opportunistically.
    /// EXIF parse failures degrade to `exif: None`, never an error.
    fn decode(&self, path: &Path, token: FormatToken) -> Result<Decoded>;

    /// Encode a pixel buffer to destination-format bytes, applying the
    /// format's save defaults (quality, forced color mode, compression).
    fn encode(
        &self,
        image: &DynamicImage,
        token: FormatToken,
        options: &EncodeOptions,
        dest: &Path,
    ) -> Result<Vec<u8>>;

    /// Copy the source's embedded EXIF tree onto an already-encoded
    /// destination file. Best-effort: callers treat failures as warnings.
    fn carry_exif(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Open a document and read its page count and info dictionary.
    fn open_document(&self, path: &Path) -> Result<DocumentHandle>;

    /// Render one page into a pixel buffer at the given scale
    /// (1.0 = 72 dpi).
    fn rasterize_page(&self, path: &Path, page_index: usize, scale: f32)
        -> Result<DynamicImage>;

    /// Structural copy of a document: garbage-collect unreferenced objects
    /// and recompress streams, preserving all pages without rasterizing.
    fn compact_document(&self, path: &Path, dest: &Path) -> Result<()>;
}

/// The built-in provider: `image` for raster codecs, `kamadak-exif` /
/// `little_exif` for metadata, `lopdf` for document structure, and a
/// system pdfium library (when present) for page rasterization.
pub struct DefaultCodec {
    caps: CapabilitySet,
}

impl DefaultCodec {
    /// Probe optional codec availability once and fix the capability set.
    pub fn new() -> Self {
        let caps = CapabilitySet {
            avif: cfg!(feature = "avif"),
            // No crate in this stack decodes HEIF or sensor RAW; these stay
            // behind the provider seam for custom implementations.
            heif: false,
            raw_decode: false,
            pdf_rasterizer: document::pdfium_available(),
        };
        tracing::debug!(?caps, "probed codec capabilities");
        Self { caps }
    }
}

impl Default for DefaultCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecProvider for DefaultCodec {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn decode(&self, path: &Path, token: FormatToken) -> Result<Decoded> {
        match token {
            FormatToken::Pdf => Err(ConvertError::codec(
                path,
                "documents are decoded via rasterize_page, not decode",
            )),
            FormatToken::Raw | FormatToken::Heif => Err(ConvertError::CodecUnavailable {
                format: token,
                hint: CapabilitySet::hint_for(token).to_string(),
            }),
            FormatToken::Avif if !self.caps.avif => Err(ConvertError::CodecUnavailable {
                format: token,
                hint: CapabilitySet::hint_for(token).to_string(),
            }),
            _ => raster::decode(path, token),
        }
    }

    fn encode(
        &self,
        image: &DynamicImage,
        token: FormatToken,
        options: &EncodeOptions,
        dest: &Path,
    ) -> Result<Vec<u8>> {
        match token {
            FormatToken::Raw => Err(ConvertError::Unimplemented { format: token }),
            FormatToken::Heif => Err(ConvertError::CodecUnavailable {
                format: token,
                hint: CapabilitySet::hint_for(token).to_string(),
            }),
            FormatToken::Avif if !self.caps.avif => Err(ConvertError::CodecUnavailable {
                format: token,
                hint: CapabilitySet::hint_for(token).to_string(),
            }),
            FormatToken::Pdf => Err(ConvertError::codec(
                dest,
                "documents are assembled by the document adapter, not encode",
            )),
            _ => raster::encode(image, token, options, dest),
        }
    }

    fn carry_exif(&self, source: &Path, dest: &Path) -> Result<()> {
        raster::carry_exif(source, dest)
    }

    fn open_document(&self, path: &Path) -> Result<DocumentHandle> {
        document::open(path)
    }

    fn rasterize_page(
        &self,
        path: &Path,
        page_index: usize,
        scale: f32,
    ) -> Result<DynamicImage> {
        document::rasterize_page(path, page_index, scale)
    }

    fn compact_document(&self, path: &Path, dest: &Path) -> Result<()> {
        document::compact(path, dest)
    }
}
