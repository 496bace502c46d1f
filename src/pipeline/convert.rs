//! Single-asset conversion.
//!
//! One job flows through fixed stages: pre-flight checks that need no
//! pixel I/O, route selection by source/destination kind, decode, encode,
//! write, then best-effort metadata and timestamp carry-over. Every check
//! that can fail without touching pixels fails before any decode work.

use std::sync::Arc;

use crate::codec::{CodecProvider, EncodeOptions};
use crate::document::DocumentAdapter;
use crate::error::{ConvertError, Result};
use crate::formats::{CapabilitySet, FormatRegistry, FormatToken};
use crate::metadata::Timestamps;
use crate::types::{Asset, ConversionJob, ConversionResult};

/// Executes one conversion job at a time. Cheap to clone; clones share the
/// codec provider.
#[derive(Clone)]
pub struct ConversionPipeline {
    registry: FormatRegistry,
    codec: Arc<dyn CodecProvider>,
    adapter: DocumentAdapter,
}

impl ConversionPipeline {
    pub fn new(codec: Arc<dyn CodecProvider>) -> Self {
        let registry = FormatRegistry::new(codec.capabilities());
        let adapter = DocumentAdapter::new(Arc::clone(&codec));
        Self {
            registry,
            codec,
            adapter,
        }
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn document_adapter(&self) -> &DocumentAdapter {
        &self.adapter
    }

    /// Run one job synchronously and return the written output asset.
    pub fn execute(&self, job: &ConversionJob) -> Result<Asset> {
        let source = &job.source.path;
        let dest = &job.dest.path;

        if !source.exists() {
            return Err(ConvertError::NotFound(source.clone()));
        }
        let src_token = job
            .source
            .token
            .ok_or_else(|| unsupported(&job.source))?;
        let dest_token = job.dest.token.ok_or_else(|| unsupported(&job.dest))?;

        self.check_source(src_token, dest_token)?;
        self.check_dest(dest_token)?;

        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            from = %src_token,
            to = %dest_token,
            "converting"
        );

        // Timestamps are captured before anything is written so the
        // destination can inherit them afterwards.
        let timestamps = if job.options.preserve_timestamps {
            Timestamps::capture(source).ok()
        } else {
            None
        };

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match (src_token.is_document(), dest_token.is_document()) {
            // document -> document: structural copy, never rasterized
            (true, true) => self.adapter.copy_compact(source, dest)?,
            // document -> raster: first page through the encode path, at
            // the requested density when one is given
            (true, false) => {
                let scale = job
                    .options
                    .dpi
                    .map(|(x, _)| x / 72.0)
                    .unwrap_or(crate::document::DOCUMENT_RASTER_SCALE);
                let image = self.adapter.rasterize_first_page(source, scale)?;
                let options = EncodeOptions {
                    quality: job.options.clamped_quality(),
                };
                let bytes = self.codec.encode(&image, dest_token, &options, dest)?;
                std::fs::write(dest, bytes)?;
            }
            // raster -> document: one-page document on a Letter page
            (false, true) => {
                self.adapter.image_to_document(
                    source,
                    dest,
                    job.options.clamped_quality(),
                    None,
                    job.options.preserve_metadata,
                )?;
            }
            // raster -> raster
            (false, false) => {
                let decoded = self.codec.decode(source, src_token)?;
                let options = EncodeOptions {
                    quality: job.options.clamped_quality(),
                };
                let bytes = self.codec.encode(&decoded.image, dest_token, &options, dest)?;
                std::fs::write(dest, bytes)?;

                // EXIF carry-over happens after the encoded file exists, and
                // only between two EXIF-capable containers. Failure leaves a
                // valid converted file, so it degrades to a warning.
                if job.options.preserve_metadata
                    && src_token.supports_exif()
                    && dest_token.supports_exif()
                {
                    if let Err(e) = self.codec.carry_exif(source, dest) {
                        tracing::warn!(
                            source = %source.display(),
                            dest = %dest.display(),
                            error = %e,
                            "metadata carry-over failed; output kept without EXIF"
                        );
                    }
                }
            }
        }

        if let Some(times) = timestamps {
            if let Err(e) = times.apply(dest) {
                tracing::warn!(
                    dest = %dest.display(),
                    error = %e,
                    "could not restore timestamps"
                );
            }
        }

        Ok(Asset::probe(dest))
    }

    /// Run one job on the blocking pool and fold the outcome into a
    /// [`ConversionResult`].
    pub async fn execute_job(&self, job: ConversionJob) -> ConversionResult {
        let pipeline = self.clone();
        let source = job.source.clone();
        let dest = job.dest.clone();

        let outcome =
            tokio::task::spawn_blocking(move || pipeline.execute(&job)).await;

        match outcome {
            Ok(Ok(output)) => ConversionResult::Success { source, output },
            Ok(Err(error)) => ConversionResult::Failure {
                source,
                dest,
                error,
            },
            Err(join_error) => ConversionResult::Failure {
                error: ConvertError::Codec {
                    path: source.path.clone(),
                    message: format!("conversion task aborted: {join_error}"),
                },
                source,
                dest,
            },
        }
    }

    /// Source-side pre-flight: the source's codec must be present before
    /// any file I/O happens.
    fn check_source(&self, src: FormatToken, dest: FormatToken) -> Result<()> {
        let caps = self.registry.capabilities();
        match src {
            FormatToken::Raw if !caps.raw_decode => Err(missing_codec(src)),
            FormatToken::Heif if !caps.heif => Err(missing_codec(src)),
            FormatToken::Avif if !caps.avif => Err(missing_codec(src)),
            // Rasterizing a document needs pdfium; document->document does
            // not.
            FormatToken::Pdf if !dest.is_document() && !caps.pdf_rasterizer => {
                Err(missing_codec(FormatToken::Pdf))
            }
            _ => Ok(()),
        }
    }

    /// Destination-side pre-flight: source-only formats are never encoded.
    fn check_dest(&self, dest: FormatToken) -> Result<()> {
        let caps = self.registry.capabilities();
        match dest {
            FormatToken::Raw => Err(ConvertError::Unimplemented { format: dest }),
            FormatToken::Heif if !caps.heif => Err(missing_codec(dest)),
            FormatToken::Avif if !caps.avif => Err(missing_codec(dest)),
            _ => Ok(()),
        }
    }
}

fn unsupported(asset: &Asset) -> ConvertError {
    ConvertError::UnsupportedFormat {
        path: asset.path.clone(),
        extension: asset
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string(),
    }
}

fn missing_codec(format: FormatToken) -> ConvertError {
    ConvertError::CodecUnavailable {
        format,
        hint: CapabilitySet::hint_for(format).to_string(),
    }
}
