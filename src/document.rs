//! Document adapter: PDF-as-source and PDF-as-target conversions.
//!
//! Covers the four document routes: document→document (structural
//! copy-compact, no rasterizing), image→document (one page per image, fit
//! to a page box), document→image (rasterize one page), and page
//! extraction (rasterize a page set to raster files).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};

use crate::codec::{CodecProvider, EncodeOptions};
use crate::error::{ConvertError, Result};
use crate::formats::FormatToken;
use crate::metadata::DocumentInfo;

/// Default upscale factor for the single-page document→raster route,
/// used when no density is requested.
pub const DOCUMENT_RASTER_SCALE: f32 = 2.0;

/// Named page box sizes, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    A3,
    A5,
}

impl PageSize {
    /// Parse a page size name, case-insensitively. Unknown names fall back
    /// to A4.
    pub fn parse(name: &str) -> PageSize {
        match name.to_ascii_lowercase().as_str() {
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            "a3" => PageSize::A3,
            "a5" => PageSize::A5,
            _ => PageSize::A4,
        }
    }

    /// (width, height) in points.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::A3 => (842.0, 1191.0),
            PageSize::A5 => (420.0, 595.0),
        }
    }
}

/// How an image is scaled and positioned within a page box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitPolicy {
    /// Uniform scale, centered, preserves aspect; may letterbox.
    #[default]
    Contain,
    /// Uniform scale, centered, fills the page; overflow is clipped by the
    /// page box rather than cropped in pixels.
    Cover,
    /// Independent x/y scale filling the page exactly; ignores aspect.
    Stretch,
}

impl FitPolicy {
    /// Parse a fit policy name; unknown names fall back to `Contain`.
    pub fn parse(name: &str) -> FitPolicy {
        match name.to_ascii_lowercase().as_str() {
            "cover" => FitPolicy::Cover,
            "stretch" => FitPolicy::Stretch,
            _ => FitPolicy::Contain,
        }
    }

    /// Compute the placement of an `img_w`×`img_h` image on a
    /// `page_w`×`page_h` page, in the page's units.
    pub fn placement(self, img_w: f32, img_h: f32, page_w: f32, page_h: f32) -> Placement {
        match self {
            FitPolicy::Stretch => Placement {
                x: 0.0,
                y: 0.0,
                width: page_w,
                height: page_h,
            },
            FitPolicy::Contain | FitPolicy::Cover => {
                let ratio_x = page_w / img_w;
                let ratio_y = page_h / img_h;
                let scale = if self == FitPolicy::Contain {
                    ratio_x.min(ratio_y)
                } else {
                    ratio_x.max(ratio_y)
                };
                let width = img_w * scale;
                let height = img_h * scale;
                Placement {
                    x: (page_w - width) / 2.0,
                    y: (page_h - height) / 2.0,
                    width,
                    height,
                }
            }
        }
    }
}

/// Resolved position and size of an image on a page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// PDF specialization of the conversion pipeline.
#[derive(Clone)]
pub struct DocumentAdapter {
    codec: Arc<dyn CodecProvider>,
}

impl DocumentAdapter {
    pub fn new(codec: Arc<dyn CodecProvider>) -> Self {
        Self { codec }
    }

    /// document→document: structural copy preserving all pages.
    pub fn copy_compact(&self, source: &Path, dest: &Path) -> Result<()> {
        self.codec.compact_document(source, dest)
    }

    /// document→raster working buffer: page 0 at the given scale
    /// (1.0 = 72 dpi).
    pub fn rasterize_first_page(&self, source: &Path, scale: f32) -> Result<DynamicImage> {
        let handle = self.codec.open_document(source)?;
        if handle.page_count == 0 {
            return Err(ConvertError::document(source, "document has no pages"));
        }
        self.codec.rasterize_page(source, 0, scale)
    }

    /// image→document: a single source image becomes a one-page document
    /// sized to the Letter page box with aspect-preserving centering.
    ///
    /// With `preserve_metadata` set and no explicit info, the document
    /// title/author are taken from the image's descriptive EXIF tags.
    pub fn image_to_document(
        &self,
        source: &Path,
        dest: &Path,
        quality: u8,
        info: Option<&DocumentInfo>,
        preserve_metadata: bool,
    ) -> Result<PathBuf> {
        let token = FormatToken::classify(source).ok_or_else(|| ConvertError::UnsupportedFormat {
            path: source.to_path_buf(),
            extension: extension_of(source),
        })?;
        let decoded = self.codec.decode(source, token)?;

        let derived = match (info, &decoded.exif) {
            (None, Some(exif)) if preserve_metadata => Some(DocumentInfo {
                title: exif.description.clone(),
                author: exif.artist.clone(),
                ..DocumentInfo::default()
            }),
            _ => None,
        };

        self.assemble(
            &[(source.to_path_buf(), decoded.image)],
            dest,
            PageSize::Letter,
            FitPolicy::Contain,
            quality,
            info.or(derived.as_ref()),
        )
    }

    /// images→document: each image becomes one page of `page_size`, placed
    /// per `fit`. Per-image failures are logged and skipped; the document
    /// fails only when no image could be placed.
    pub fn images_to_document(
        &self,
        images: &[PathBuf],
        dest: &Path,
        page_size: PageSize,
        fit: FitPolicy,
        quality: u8,
        info: Option<&DocumentInfo>,
    ) -> Result<PathBuf> {
        if images.is_empty() {
            return Err(ConvertError::document(dest, "no images provided"));
        }
        if let Some(missing) = images.iter().find(|p| !p.exists()) {
            return Err(ConvertError::NotFound(missing.clone()));
        }

        let mut decoded = Vec::new();
        for path in images {
            let Some(token) = FormatToken::classify(path) else {
                tracing::warn!(path = %path.display(), "skipping unsupported page image");
                continue;
            };
            match self.codec.decode(path, token) {
                Ok(d) => decoded.push((path.clone(), d.image)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping page image");
                }
            }
        }
        if decoded.is_empty() {
            return Err(ConvertError::document(
                dest,
                "no valid images in the provided list",
            ));
        }

        self.assemble(&decoded, dest, page_size, fit, quality, info)
    }

    /// document→images: rasterize a set of pages to raster files named
    /// `page_{index}.{ext}` under `out_dir`.
    ///
    /// The rasterizer's native output is already a lossless buffer, so PNG
    /// targets are written directly; other formats go through the encode
    /// path with its save defaults.
    pub fn document_to_images(
        &self,
        source: &Path,
        out_dir: &Path,
        format: FormatToken,
        quality: u8,
        dpi: f32,
        pages: Option<&[usize]>,
    ) -> Result<Vec<PathBuf>> {
        if !source.exists() {
            return Err(ConvertError::NotFound(source.to_path_buf()));
        }

        let handle = self.codec.open_document(source)?;
        if handle.page_count == 0 {
            return Err(ConvertError::document(source, "document has no pages"));
        }

        let selected: Vec<usize> = match pages {
            None => (0..handle.page_count).collect(),
            Some(requested) => requested
                .iter()
                .copied()
                .filter(|p| *p < handle.page_count)
                .collect(),
        };
        if selected.is_empty() {
            return Err(ConvertError::InvalidPageRange {
                requested: pages.unwrap_or_default().to_vec(),
                page_count: handle.page_count,
            });
        }

        std::fs::create_dir_all(out_dir)?;
        let scale = dpi / 72.0;
        let options = EncodeOptions { quality };

        let mut outputs = Vec::with_capacity(selected.len());
        for page_index in selected {
            let image = self.codec.rasterize_page(source, page_index, scale)?;
            let out = out_dir.join(format!("page_{page_index}.{}", format.extension()));

            if format == FormatToken::Png {
                image
                    .save_with_format(&out, ImageFormat::Png)
                    .map_err(|e| ConvertError::codec(&out, e))?;
            } else {
                let bytes = self.codec.encode(&image, format, &options, &out)?;
                std::fs::write(&out, bytes)?;
            }
            tracing::debug!(page = page_index, out = %out.display(), "rasterized page");
            outputs.push(out);
        }
        Ok(outputs)
    }

    /// Build the printpdf document from decoded pages and write it out.
    fn assemble(
        &self,
        pages: &[(PathBuf, DynamicImage)],
        dest: &Path,
        page_size: PageSize,
        fit: FitPolicy,
        _quality: u8,
        info: Option<&DocumentInfo>,
    ) -> Result<PathBuf> {
        let (page_w, page_h) = page_size.dimensions_pt();
        let title = info
            .and_then(|i| i.title.as_deref())
            .unwrap_or("Converted document");

        let mut document = PdfDocument::new(title);
        if let Some(info) = info {
            if let Some(author) = &info.author {
                document.metadata.info.author = author.clone();
            }
            if let Some(subject) = &info.subject {
                document.metadata.info.subject = subject.clone();
            }
            if let Some(keywords) = &info.keywords {
                document.metadata.info.keywords = keywords
                    .split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
            }
        }

        let mut pdf_pages = Vec::with_capacity(pages.len());
        for (path, image) in pages {
            let rgb = image.to_rgb8();
            let (img_w, img_h) = (rgb.width() as f32, rgb.height() as f32);
            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: image.width() as usize,
                height: image.height() as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let image_id = document.add_image(&raw);

            let placement = fit.placement(img_w, img_h, page_w, page_h);
            // With dpi=72 the image's native size in points equals its size
            // in pixels, so the axis scales are placement/pixel ratios.
            let ops = vec![Op::UseXobject {
                id: image_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(placement.x)),
                    translate_y: Some(Pt(placement.y)),
                    scale_x: Some(placement.width / img_w),
                    scale_y: Some(placement.height / img_h),
                    dpi: Some(72.0),
                    rotate: None,
                },
            }];
            pdf_pages.push(PdfPage::new(Mm::from(Pt(page_w)), Mm::from(Pt(page_h)), ops));
            tracing::debug!(page = %path.display(), ?placement, "placed page image");
        }
        document.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = document.save(&PdfSaveOptions::default(), &mut warnings);
        std::fs::write(dest, bytes)?;

        Ok(dest.to_path_buf())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string()
}
