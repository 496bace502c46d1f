//! Pixport - format-aware image and document conversion.
//!
//! Pixport converts raster images (JPEG, PNG, BMP, TIFF, WebP, AVIF) and
//! PDF documents between formats while preserving what can be preserved:
//! embedded EXIF for EXIF-capable pairs, file timestamps, and document
//! info dictionaries.
//!
//! # Architecture
//!
//! ```text
//! Asset → Classify → Pre-flight checks → Decode → Encode → Write
//!                                            ↘ metadata / timestamps ↗
//! ```
//!
//! Everything that touches pixel bytes or PDF internals lives behind the
//! [`CodecProvider`] trait; [`Converter`] wires the default provider into
//! the conversion pipeline and batch orchestrator.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixport::{Converter, ConvertOptions, BatchOptions};
//!
//! #[tokio::main]
//! async fn main() -> pixport::Result<()> {
//!     let converter = Converter::new();
//!     converter
//!         .convert("./photo.png", "./photo.webp", ConvertOptions::default())
//!         .await?;
//!
//!     let batch = converter
//!         .batch_convert("./in", "./out", BatchOptions::default(), None)
//!         .await?;
//!     println!("converted {} files", batch.succeeded());
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod document;
pub mod error;
pub mod formats;
pub mod info;
pub mod metadata;
pub mod pipeline;
pub mod types;

pub use codec::{CodecProvider, Decoded, DefaultCodec, DocumentHandle, EncodeOptions};
pub use document::{DocumentAdapter, FitPolicy, PageSize, Placement};
pub use error::{ConvertError, Result};
pub use formats::{CapabilitySet, FormatRegistry, FormatToken};
pub use info::{AssetInfo, DocumentRecord};
pub use metadata::{
    DocumentInfo, ExifSummary, GpsAltitude, GpsCoordinate, GpsPosition, GpsRational, Scalar,
    Timestamps,
};
pub use pipeline::{BatchOrchestrator, BatchOutput, ConversionPipeline};
pub use types::{
    Asset, BatchOptions, ConversionJob, ConversionResult, ConvertOptions, ProgressCallback,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The main entry point: a conversion pipeline plus batch orchestration
/// over a single codec provider.
#[derive(Clone)]
pub struct Converter {
    codec: Arc<dyn CodecProvider>,
    pipeline: ConversionPipeline,
    orchestrator: BatchOrchestrator,
}

impl Converter {
    /// Build a converter on the built-in provider, probing optional codec
    /// availability once.
    pub fn new() -> Self {
        Self::with_provider(Arc::new(DefaultCodec::new()))
    }

    /// Build a converter on a custom provider (e.g. one with HEIF or
    /// sensor-RAW support).
    pub fn with_provider(codec: Arc<dyn CodecProvider>) -> Self {
        tracing::debug!("initializing pixport v{VERSION}");
        let pipeline = ConversionPipeline::new(Arc::clone(&codec));
        let orchestrator = BatchOrchestrator::new(pipeline.clone());
        Self {
            codec,
            pipeline,
            orchestrator,
        }
    }

    /// The provider's optional-codec availability, fixed at construction.
    pub fn capabilities(&self) -> CapabilitySet {
        self.codec.capabilities()
    }

    /// Convert one asset. The destination format is taken from the
    /// destination path's extension.
    pub async fn convert(
        &self,
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        options: ConvertOptions,
    ) -> Result<Asset> {
        let job = ConversionJob::new(source, dest, options);
        self.pipeline.execute_job(job).await.into_result()
    }

    /// Convert a directory tree, collecting every per-job result.
    pub async fn batch_convert(
        &self,
        input_root: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
        options: BatchOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<BatchOutput> {
        self.orchestrator
            .run(input_root.as_ref(), output_root.as_ref(), &options, progress)
            .await
    }

    /// Convert a directory tree, streaming each successful output path as
    /// its job completes.
    pub async fn batch_convert_stream(
        &self,
        input_root: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
        options: BatchOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<mpsc::Receiver<PathBuf>> {
        self.orchestrator
            .run_streaming(input_root.as_ref(), output_root.as_ref(), &options, progress)
            .await
    }

    /// Inspect an asset without converting it.
    pub async fn asset_info(&self, path: impl Into<PathBuf>) -> Result<AssetInfo> {
        let path = path.into();
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || info::asset_info(&path, &codec))
            .await
            .map_err(|e| ConvertError::Codec {
                path: PathBuf::new(),
                message: format!("inspection task aborted: {e}"),
            })?
    }

    /// Rasterize a document's pages to `page_{index}.{ext}` files under
    /// `out_dir`. `pages` of `None` means all pages; `extension` is accepted
    /// with or without the leading dot.
    pub async fn document_to_images(
        &self,
        source: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        extension: &str,
        quality: u8,
        dpi: f32,
        pages: Option<Vec<usize>>,
    ) -> Result<Vec<PathBuf>> {
        let source = source.into();
        let out_dir = out_dir.into();
        let format =
            FormatToken::from_extension(extension).ok_or_else(|| ConvertError::UnsupportedFormat {
                path: source.clone(),
                extension: extension.to_string(),
            })?;
        let adapter = self.pipeline.document_adapter().clone();

        tokio::task::spawn_blocking(move || {
            adapter.document_to_images(&source, &out_dir, format, quality, dpi, pages.as_deref())
        })
        .await
        .map_err(|e| ConvertError::Codec {
            path: PathBuf::new(),
            message: format!("rasterization task aborted: {e}"),
        })?
    }

    /// Assemble one document from a list of images, one page per image.
    pub async fn images_to_document(
        &self,
        images: Vec<PathBuf>,
        dest: impl Into<PathBuf>,
        page_size: PageSize,
        fit: FitPolicy,
        quality: u8,
        info: Option<DocumentInfo>,
    ) -> Result<PathBuf> {
        let dest = dest.into();
        let adapter = self.pipeline.document_adapter().clone();

        tokio::task::spawn_blocking(move || {
            adapter.images_to_document(&images, &dest, page_size, fit, quality, info.as_ref())
        })
        .await
        .map_err(|e| ConvertError::Codec {
            path: PathBuf::new(),
            message: format!("assembly task aborted: {e}"),
        })?
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}
