//! Document half of the built-in provider: `lopdf` for structural reads and
//! compaction, pdfium (bound to the system library at runtime) for page
//! rasterization.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use lopdf::{Document, Object};
use pdfium_render::prelude::*;

use super::DocumentHandle;
use crate::error::{ConvertError, Result};
use crate::formats::{CapabilitySet, FormatToken};
use crate::metadata::DocumentInfo;

// pdfium is not thread-safe; all rasterization is serialized behind this
// lock even when the batch pool runs many conversions concurrently.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Probe whether the system pdfium library can be bound. Called once when
/// the default provider is constructed.
pub(super) fn pdfium_available() -> bool {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    Pdfium::bind_to_system_library().is_ok()
}

/// Open a PDF and snapshot its page count, info dictionary, and first-page
/// point dimensions.
pub(super) fn open(path: &Path) -> Result<DocumentHandle> {
    let document = Document::load(path).map_err(|e| ConvertError::document(path, e))?;
    let pages = document.get_pages();
    let page_count = pages.len();

    let mut info = read_info(&document);
    info.page_count = page_count;

    let first_page_size = pages
        .values()
        .next()
        .and_then(|id| media_box(&document, *id));

    tracing::debug!(path = %path.display(), page_count, "opened document");

    Ok(DocumentHandle {
        page_count,
        info,
        first_page_size,
    })
}

/// Structural copy: drop unreferenced objects and zero-length streams,
/// recompress, and save. Pages are preserved; nothing is rasterized.
pub(super) fn compact(path: &Path, dest: &Path) -> Result<()> {
    let mut document = Document::load(path).map_err(|e| ConvertError::document(path, e))?;

    document.prune_objects();
    document.delete_zero_length_streams();
    document.renumber_objects();
    document.compress();

    document
        .save(dest)
        .map_err(|e| ConvertError::document(dest, e))?;

    tracing::debug!(
        source = %path.display(),
        dest = %dest.display(),
        "compacted document"
    );
    Ok(())
}

/// Rasterize one page at the given scale (1.0 = 72 dpi).
pub(super) fn rasterize_page(path: &Path, page_index: usize, scale: f32) -> Result<DynamicImage> {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let bindings =
        Pdfium::bind_to_system_library().map_err(|_| ConvertError::CodecUnavailable {
            format: FormatToken::Pdf,
            hint: CapabilitySet::hint_for(FormatToken::Pdf).to_string(),
        })?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ConvertError::document(path, e))?;

    let page_count = document.pages().len() as usize;
    if page_index >= page_count {
        return Err(ConvertError::InvalidPageRange {
            requested: vec![page_index],
            page_count,
        });
    }

    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| ConvertError::document(path, e))?;

    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| ConvertError::document(path, e))?;

    Ok(bitmap.as_image())
}

/// Read the trailer Info dictionary into a `DocumentInfo`.
fn read_info(document: &Document) -> DocumentInfo {
    let mut info = DocumentInfo::default();

    let Some(dict) = document
        .trailer
        .get(b"Info")
        .ok()
        .map(|obj| resolve(document, obj))
        .and_then(|obj| match obj {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        })
    else {
        return info;
    };

    info.title = string_entry(document, dict, b"Title");
    info.author = string_entry(document, dict, b"Author");
    info.subject = string_entry(document, dict, b"Subject");
    info.keywords = string_entry(document, dict, b"Keywords");
    info.creator = string_entry(document, dict, b"Creator");
    info.producer = string_entry(document, dict, b"Producer");
    info
}

/// First-page /MediaBox as (width, height) in points.
fn media_box(document: &Document, page_id: lopdf::ObjectId) -> Option<(f32, f32)> {
    let page = document.get_object(page_id).ok()?;
    let Object::Dictionary(dict) = page else {
        return None;
    };
    let Object::Array(coords) = resolve(document, dict.get(b"MediaBox").ok()?) else {
        return None;
    };
    if coords.len() != 4 {
        return None;
    }
    let numbers: Vec<f32> = coords.iter().filter_map(number).collect();
    if numbers.len() != 4 {
        return None;
    }
    Some((numbers[2] - numbers[0], numbers[3] - numbers[1]))
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    if let Object::Reference(id) = object {
        document.get_object(*id).unwrap_or(object)
    } else {
        object
    }
}

fn string_entry(document: &Document, dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let object = resolve(document, dict.get(key).ok()?);
    match object {
        Object::String(bytes, _) => {
            let value = String::from_utf8_lossy(bytes).into_owned();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }
        _ => None,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        #[allow(clippy::unnecessary_cast)]
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
