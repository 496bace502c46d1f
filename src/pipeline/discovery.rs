//! Job discovery: enumerate an input tree into conversion jobs.
//!
//! Discovery is eager: the full job list is built before any conversion
//! starts, so a batch's work is fixed up front and progress can be
//! reported against a known total.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::{ConvertError, Result};
use crate::formats::FormatRegistry;
use crate::types::{BatchOptions, ConversionJob};

/// Enumerate supported files under `input_root` and pair each with its
/// mirrored destination under `output_root`.
///
/// Non-recursive runs look only at the top level. Files whose extension is
/// unknown, or whose format the registry reports unsupported, are skipped.
/// With `skip_existing`, a job is dropped when its destination is already
/// at least as new as the source.
pub fn discover_jobs(
    input_root: &Path,
    output_root: &Path,
    options: &BatchOptions,
    registry: &FormatRegistry,
) -> Result<Vec<ConversionJob>> {
    if !input_root.is_dir() {
        return Err(ConvertError::NotFound(input_root.to_path_buf()));
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut jobs = Vec::new();

    for entry in WalkDir::new(input_root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let source = entry.path();

        let Some(token) = registry.classify_supported(source) else {
            tracing::trace!(path = %source.display(), "skipping unsupported file");
            continue;
        };

        // Mirror the source's position relative to the input root.
        let relative = source.strip_prefix(input_root).unwrap_or(source);
        let mut dest = output_root.join(relative);
        let target_token = options.output_format.unwrap_or(token);
        dest.set_extension(target_token.extension());

        if options.skip_existing && is_up_to_date(source, &dest) {
            tracing::debug!(
                source = %source.display(),
                dest = %dest.display(),
                "destination up to date, skipping"
            );
            continue;
        }

        jobs.push(ConversionJob::new(source, dest, options.convert_options()));
    }

    tracing::debug!(count = jobs.len(), root = %input_root.display(), "discovered jobs");
    Ok(jobs)
}

/// Whether `dest` exists and is at least as new as `source`.
fn is_up_to_date(source: &Path, dest: &Path) -> bool {
    let Ok(dest_meta) = std::fs::metadata(dest) else {
        return false;
    };
    let (Ok(dest_mtime), Ok(src_mtime)) = (
        dest_meta.modified(),
        std::fs::metadata(source).and_then(|m| m.modified()),
    ) else {
        return false;
    };
    dest_mtime >= src_mtime
}
