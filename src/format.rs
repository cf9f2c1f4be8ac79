//! Format classification: filename → [`SourceKind`], raw token → [`TargetFormat`].
//!
//! Classification happens before a single byte is staged, so uploads of
//! types that would be rejected anyway never touch the disk.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Format family of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Image,
    PdfDocument,
    WordDocument,
    PresentationDocument,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Image => "Image",
            SourceKind::PdfDocument => "PdfDocument",
            SourceKind::WordDocument => "WordDocument",
            SourceKind::PresentationDocument => "PresentationDocument",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested output format.
///
/// Unknown tokens are kept verbatim in [`TargetFormat::Other`] so the
/// registry can name them in its "unsupported" message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    Png,
    Jpg,
    Jpeg,
    Pdf,
    Docx,
    Doc,
    Pptx,
    Ppt,
    Other(String),
}

impl TargetFormat {
    /// The normalized token (`"png"`, `"docx"`, …, or the opaque token).
    pub fn token(&self) -> &str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Pdf => "pdf",
            TargetFormat::Docx => "docx",
            TargetFormat::Doc => "doc",
            TargetFormat::Pptx => "pptx",
            TargetFormat::Ppt => "ppt",
            TargetFormat::Other(s) => s,
        }
    }

    /// Extension of the file actually produced.
    ///
    /// Legacy tokens produce the modern container, so `doc` → `docx` and
    /// `ppt` → `pptx`.
    pub fn file_extension(&self) -> &str {
        match self {
            TargetFormat::Doc => "docx",
            TargetFormat::Ppt => "pptx",
            other => other.token(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Png => "image/png",
            TargetFormat::Jpg | TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Pdf => "application/pdf",
            TargetFormat::Docx | TargetFormat::Doc => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            TargetFormat::Pptx | TargetFormat::Ppt => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            TargetFormat::Other(_) => "application/octet-stream",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TargetFormat::Other(_))
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Registry lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub source: SourceKind,
    pub target: TargetFormat,
}

impl ConversionKey {
    pub fn new(source: SourceKind, target: TargetFormat) -> Self {
        Self { source, target }
    }
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.source, self.target)
    }
}

/// Extensions accepted for upload, in documentation order.
pub const ACCEPTED_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "pdf", "docx", "doc", "pptx", "ppt"];

/// Map a filename to its [`SourceKind`] by extension (case-insensitive).
pub fn classify(filename: &str) -> Result<SourceKind, ConvertError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let kind = match extension.as_deref() {
        Some("jpg" | "jpeg" | "png") => Some(SourceKind::Image),
        Some("pdf") => Some(SourceKind::PdfDocument),
        Some("docx" | "doc") => Some(SourceKind::WordDocument),
        Some("pptx" | "ppt") => Some(SourceKind::PresentationDocument),
        _ => None,
    };

    kind.ok_or_else(|| ConvertError::UnsupportedExtension {
        filename: filename.to_string(),
        extension,
    })
}

/// Normalize a user-supplied target token. Never fails.
pub fn normalize_target(raw: &str) -> TargetFormat {
    let token = raw.trim().to_ascii_lowercase();
    match token.as_str() {
        "png" => TargetFormat::Png,
        "jpg" => TargetFormat::Jpg,
        "jpeg" => TargetFormat::Jpeg,
        "pdf" => TargetFormat::Pdf,
        "docx" => TargetFormat::Docx,
        "doc" => TargetFormat::Doc,
        "pptx" => TargetFormat::Pptx,
        "ppt" => TargetFormat::Ppt,
        _ => TargetFormat::Other(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_families() {
        assert_eq!(classify("photo.JPG").unwrap(), SourceKind::Image);
        assert_eq!(classify("photo.jpeg").unwrap(), SourceKind::Image);
        assert_eq!(classify("scan.png").unwrap(), SourceKind::Image);
        assert_eq!(classify("paper.Pdf").unwrap(), SourceKind::PdfDocument);
        assert_eq!(classify("report.docx").unwrap(), SourceKind::WordDocument);
        assert_eq!(classify("old.DOC").unwrap(), SourceKind::WordDocument);
        assert_eq!(classify("deck.pptx").unwrap(), SourceKind::PresentationDocument);
        assert_eq!(classify("deck.ppt").unwrap(), SourceKind::PresentationDocument);
    }

    #[test]
    fn classify_rejects_unknown_and_missing_extensions() {
        for name in ["notes.txt", "archive.tar.gz", "README", "", ".docx"] {
            let err = classify(name).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::UnsupportedExtension, "{name}");
        }
    }

    #[test]
    fn normalize_is_case_and_whitespace_insensitive() {
        assert_eq!(normalize_target("  PNG "), TargetFormat::Png);
        assert_eq!(normalize_target("Jpeg"), TargetFormat::Jpeg);
        assert_eq!(normalize_target("pptx\n"), TargetFormat::Pptx);
    }

    #[test]
    fn normalize_preserves_unknown_tokens() {
        let t = normalize_target(" XYZ ");
        assert_eq!(t, TargetFormat::Other("xyz".into()));
        assert_eq!(t.token(), "xyz");
        assert!(!t.is_known());
    }

    #[test]
    fn legacy_targets_produce_modern_extensions() {
        assert_eq!(TargetFormat::Doc.file_extension(), "docx");
        assert_eq!(TargetFormat::Ppt.file_extension(), "pptx");
        assert_eq!(TargetFormat::Jpeg.file_extension(), "jpeg");
        assert_eq!(TargetFormat::Doc.mime_type(), TargetFormat::Docx.mime_type());
    }

    #[test]
    fn key_display_names_both_sides() {
        let key = ConversionKey::new(SourceKind::WordDocument, normalize_target("xyz"));
        assert_eq!(key.to_string(), "WordDocument → xyz");
    }
}
