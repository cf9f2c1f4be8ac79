//! PDF reading via pdfium: page rasterisation and per-page text.
//!
//! Everything here is blocking; callers run it on the blocking pool (see
//! [`crate::strategy`]).
//!
//! ## Library binding
//!
//! pdfium is a shared library loaded at runtime. The lookup order is the
//! configured path, then `PDFIUM_LIB_PATH`, then the system loader. Each may
//! name the library file itself or the directory holding it. A library
//! that cannot be bound is reported as [`ConvertError::ExternalUnavailable`],
//! the same kind as a missing office renderer: both are deployment
//! dependencies outside the crate. The paths tried and the loader errors go
//! to the log only; the caller sees a fixed message.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 7,000 × 10,000 px bitmap. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::error::ConvertError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PDFIUM: &str = "pdfium";
const BIND_FAILED: &str = "libpdfium could not be loaded";

/// Page rasterisation settings.
#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    pub dpi: u32,
    pub max_pixels: u32,
}

/// Bind pdfium, trying `explicit`, then `PDFIUM_LIB_PATH`, then the system.
pub fn bind(explicit: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let mut tried = Vec::new();

    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    for candidate in candidates {
        let lib = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&candidate)
        } else {
            candidate.clone()
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => tried.push(format!("{}: {e:?}", lib.display())),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            tried.push(format!("system library: {e:?}"));
            warn!("Failed to bind pdfium: {}", tried.join("; "));
            Err(ConvertError::ExternalUnavailable {
                program: PDFIUM.to_string(),
                detail: BIND_FAILED.to_string(),
            })
        }
    }
}

fn open<'a>(pdfium: &'a Pdfium, bytes: &'a [u8]) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ConvertError::SourceUnreadable(format!("PDF could not be opened: {e:?}")))
}

/// Render every page of a PDF, in order.
pub fn rasterize(
    pdfium: &Pdfium,
    bytes: &[u8],
    opts: RasterOptions,
) -> Result<Vec<DynamicImage>, ConvertError> {
    let document = open(pdfium, bytes)?;
    let pages = document.pages();
    let total = pages.len() as usize;
    info!("PDF loaded: {} pages", total);
    if total == 0 {
        return Err(ConvertError::SourceUnreadable("PDF has no pages".into()));
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(opts.dpi as f32 / 72.0)
        .set_maximum_width(opts.max_pixels as i32)
        .set_maximum_height(opts.max_pixels as i32);

    let mut images = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ConvertError::SourceUnreadable(format!("page {} failed to render: {e:?}", idx + 1))
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }
    Ok(images)
}

/// Extract the text layer of every page, in order. Pages without text
/// yield an empty string rather than being skipped, so indices line up.
pub fn page_texts(pdfium: &Pdfium, bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let document = open(pdfium, bytes)?;
    let mut texts = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| {
            ConvertError::SourceUnreadable(format!("page {} text unavailable: {e:?}", idx + 1))
        })?;
        texts.push(text.all());
    }
    debug!("Extracted text from {} pages", texts.len());
    Ok(texts)
}

/// Split a page's text layer into trimmed, non-empty lines.
pub fn text_lines(page: &str) -> Vec<String> {
    page.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lines_drops_blank_lines() {
        let lines = text_lines("  Title \r\n\n body line\n   \nend");
        assert_eq!(lines, vec!["Title", "body line", "end"]);
    }

    #[test]
    fn unbindable_library_does_not_expose_paths() {
        // When a system pdfium exists the bogus path is skipped.
        match bind(Some(Path::new("/srv/internal/secret/libpdfium-test.so"))) {
            Ok(_) => {}
            Err(e) => {
                assert_eq!(e.kind(), crate::ErrorKind::ExternalUnavailable);
                let message = e.to_string();
                assert!(message.contains(BIND_FAILED), "{message}");
                assert!(!message.contains("/srv/internal"), "{message}");
                assert!(!message.contains("renderer"), "{message}");
            }
        }
    }

    #[test]
    fn garbage_bytes_are_unreadable_when_pdfium_is_present() {
        let Ok(pdfium) = bind(None) else {
            eprintln!("SKIP: pdfium not available");
            return;
        };
        let err = page_texts(&pdfium, b"not a pdf").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SourceUnreadable);
    }
}
