//! Format classification and capability flags.
//!
//! `FormatToken` maps file extensions to container kinds; `FormatRegistry`
//! answers support questions against a `CapabilitySet` built once at startup
//! and read-only afterwards. Nothing here performs I/O on asset files.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A supported container format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatToken {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    WebP,
    /// Sensor RAW. Source-only: decodable through a RAW-capable codec
    /// provider, never a conversion target.
    Raw,
    Heif,
    Avif,
    Pdf,
}

impl FormatToken {
    /// Classify a path by its extension (case-insensitive).
    ///
    /// Returns `None` for unknown extensions. Classification is purely
    /// lexical; whether the token is actually *supported* depends on the
    /// registry's capability set.
    pub fn classify(path: &Path) -> Option<FormatToken> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "jfif" => Some(FormatToken::Jpeg),
            "png" => Some(FormatToken::Png),
            "bmp" => Some(FormatToken::Bmp),
            "tiff" | "tif" => Some(FormatToken::Tiff),
            "webp" => Some(FormatToken::WebP),
            "raw" => Some(FormatToken::Raw),
            "heif" | "heic" => Some(FormatToken::Heif),
            "avif" => Some(FormatToken::Avif),
            "pdf" => Some(FormatToken::Pdf),
            _ => None,
        }
    }

    /// Parse a format token from an extension string, with or without the
    /// leading dot (`".webp"` and `"webp"` are both accepted).
    pub fn from_extension(ext: &str) -> Option<FormatToken> {
        let trimmed = ext.trim_start_matches('.');
        if trimmed.is_empty() {
            return None;
        }
        Self::classify(Path::new(&format!("x.{trimmed}")))
    }

    /// Canonical extension for this token, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            FormatToken::Jpeg => "jpg",
            FormatToken::Png => "png",
            FormatToken::Bmp => "bmp",
            FormatToken::Tiff => "tiff",
            FormatToken::WebP => "webp",
            FormatToken::Raw => "raw",
            FormatToken::Heif => "heif",
            FormatToken::Avif => "avif",
            FormatToken::Pdf => "pdf",
        }
    }

    /// Whether the container can carry an embedded EXIF tree.
    pub fn supports_exif(self) -> bool {
        matches!(
            self,
            FormatToken::Jpeg
                | FormatToken::Tiff
                | FormatToken::WebP
                | FormatToken::Heif
                | FormatToken::Avif
        )
    }

    /// Whether this is a multi-page document format.
    pub fn is_document(self) -> bool {
        matches!(self, FormatToken::Pdf)
    }

    /// Formats that can be read but never written.
    pub fn is_source_only(self) -> bool {
        matches!(self, FormatToken::Raw)
    }
}

impl fmt::Display for FormatToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Optional-codec availability, probed once at startup.
///
/// The flags are injected into [`FormatRegistry`] and never mutated
/// per-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    /// AVIF encode/decode (the `avif` crate feature).
    pub avif: bool,
    /// HEIF/HEIC pixel codec. Never advertised by the built-in provider;
    /// a custom `CodecProvider` implementation may enable it.
    pub heif: bool,
    /// Sensor RAW decoding. Same situation as HEIF.
    pub raw_decode: bool,
    /// PDF page rasterization (a system pdfium library could be bound).
    pub pdf_rasterizer: bool,
}

impl CapabilitySet {
    /// Everything off. Useful as a baseline for custom providers.
    pub const fn none() -> Self {
        Self {
            avif: false,
            heif: false,
            raw_decode: false,
            pdf_rasterizer: false,
        }
    }

    /// Remediation hint for a missing optional codec, named so error
    /// messages can tell the caller what to install.
    pub fn hint_for(token: FormatToken) -> &'static str {
        match token {
            FormatToken::Avif => "build pixport with the `avif` feature enabled",
            FormatToken::Heif => "install a HEIF-capable codec provider",
            FormatToken::Raw => "install a RAW-capable codec provider",
            FormatToken::Pdf => "install the pdfium dynamic library",
            _ => "no optional codec is required for this format",
        }
    }
}

/// Maps format tokens to support and capability answers.
///
/// Stateless apart from the capability set fixed at construction.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    caps: CapabilitySet,
}

impl FormatRegistry {
    pub fn new(caps: CapabilitySet) -> Self {
        Self { caps }
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    /// Classify a path and check support in one step.
    pub fn classify_supported(&self, path: &Path) -> Option<FormatToken> {
        FormatToken::classify(path).filter(|t| self.is_supported(*t))
    }

    /// Whether the token is usable with the current capability set.
    ///
    /// A recognized extension whose optional codec is absent reports
    /// unsupported (e.g. `.avif` without the avif capability).
    pub fn is_supported(&self, token: FormatToken) -> bool {
        match token {
            FormatToken::Avif => self.caps.avif,
            FormatToken::Heif => self.caps.heif,
            FormatToken::Raw => self.caps.raw_decode,
            _ => true,
        }
    }

    /// Whether the token's support is gated on an optional codec.
    pub fn requires_optional_codec(&self, token: FormatToken) -> bool {
        matches!(
            token,
            FormatToken::Avif | FormatToken::Heif | FormatToken::Raw
        )
    }

    /// Whether the token can carry EXIF metadata.
    pub fn supports_metadata(&self, token: FormatToken) -> bool {
        token.supports_exif()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn all_caps() -> CapabilitySet {
        CapabilitySet {
            avif: true,
            heif: true,
            raw_decode: true,
            pdf_rasterizer: true,
        }
    }

    #[test]
    fn test_classify_case_insensitive() {
        assert_eq!(
            FormatToken::classify(Path::new("a.JPG")),
            Some(FormatToken::Jpeg)
        );
        assert_eq!(
            FormatToken::classify(Path::new("a.jfif")),
            Some(FormatToken::Jpeg)
        );
        assert_eq!(
            FormatToken::classify(Path::new("scan.TIF")),
            Some(FormatToken::Tiff)
        );
        assert_eq!(
            FormatToken::classify(Path::new("doc.Pdf")),
            Some(FormatToken::Pdf)
        );
        assert_eq!(FormatToken::classify(Path::new("notes.txt")), None);
        assert_eq!(FormatToken::classify(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn test_from_extension_with_and_without_dot() {
        assert_eq!(FormatToken::from_extension(".webp"), Some(FormatToken::WebP));
        assert_eq!(FormatToken::from_extension("webp"), Some(FormatToken::WebP));
        assert_eq!(FormatToken::from_extension(".heic"), Some(FormatToken::Heif));
        assert_eq!(FormatToken::from_extension(""), None);
        assert_eq!(FormatToken::from_extension(".xyz"), None);
    }

    #[test]
    fn test_avif_gated_on_capability() {
        let without = FormatRegistry::new(CapabilitySet::none());
        assert!(!without.is_supported(FormatToken::Avif));
        assert!(without.classify_supported(Path::new("a.avif")).is_none());

        let with = FormatRegistry::new(all_caps());
        assert!(with.is_supported(FormatToken::Avif));
        assert_eq!(
            with.classify_supported(Path::new("a.avif")),
            Some(FormatToken::Avif)
        );
    }

    #[test]
    fn test_exif_capable_formats() {
        assert!(FormatToken::Jpeg.supports_exif());
        assert!(FormatToken::Tiff.supports_exif());
        assert!(FormatToken::WebP.supports_exif());
        assert!(!FormatToken::Png.supports_exif());
        assert!(!FormatToken::Bmp.supports_exif());
        assert!(!FormatToken::Pdf.supports_exif());
    }

    #[test]
    fn test_raw_is_source_only() {
        assert!(FormatToken::Raw.is_source_only());
        assert!(!FormatToken::Jpeg.is_source_only());
    }

    #[test]
    fn test_ubiquitous_formats_always_supported() {
        let registry = FormatRegistry::new(CapabilitySet::none());
        for token in [
            FormatToken::Jpeg,
            FormatToken::Png,
            FormatToken::Bmp,
            FormatToken::Tiff,
            FormatToken::WebP,
            FormatToken::Pdf,
        ] {
            assert!(registry.is_supported(token), "{token} should be supported");
        }
    }
}
