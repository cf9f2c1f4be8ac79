//! Configuration types for the conversion engine.
//!
//! Every knob lives in [`ConverterConfig`], built via its
//! [`ConverterConfigBuilder`]. One struct is easy to share across request
//! handlers and to log at startup.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upload ceiling enforced by collaborators before invoking the engine.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Configuration for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use docshift::{ConverterConfig, RendererPolicy};
///
/// let config = ConverterConfig::builder()
///     .office_pdf(RendererPolicy::Structural)
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Parent directory for per-request workspaces. Default: system temp dir.
    pub staging_root: Option<PathBuf>,

    /// How Word/PowerPoint → PDF is bound for this deployment. Default: `Auto`.
    pub office_pdf: RendererPolicy,

    /// External renderer executable. Default: `soffice`.
    pub renderer_program: String,

    /// Arguments placed before the standard headless argv. Default: empty.
    ///
    /// Lets the renderer be a wrapper, e.g. program `sh` with args
    /// `["/opt/render.sh"]`.
    pub renderer_args: Vec<String>,

    /// Hard wall-clock limit for one renderer invocation. Default: 120.
    pub renderer_timeout_secs: u64,

    /// Raster density for PDF pages. Range: 72–600. Default: 150.
    pub dpi: u32,

    /// Cap on either edge of a rendered PDF page, in pixels. Default: 4000.
    ///
    /// A large-format page at 300 DPI would otherwise allocate hundreds of
    /// megabytes of pixels.
    pub max_rendered_pixels: u32,

    /// JPEG quality, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Slide titles longer than this are cut. Default: 100.
    pub max_title_chars: usize,

    /// Wrap width of the structural PDF layout. Default: 95.
    pub max_line_chars: usize,

    /// Failure messages are cut to this many characters. Default: 2000.
    pub max_diagnostic_chars: usize,

    /// Largest upload collaborators accept. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Explicit libpdfium location. If None, `PDFIUM_LIB_PATH` and then the
    /// system library are tried.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            staging_root: None,
            office_pdf: RendererPolicy::default(),
            renderer_program: "soffice".to_string(),
            renderer_args: Vec::new(),
            renderer_timeout_secs: 120,
            dpi: 150,
            max_rendered_pixels: 4000,
            jpeg_quality: 90,
            max_title_chars: 100,
            max_line_chars: 95,
            max_diagnostic_chars: 2000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pdfium_library_path: None,
        }
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn staging_root(&self) -> PathBuf {
        self.staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn staging_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_root = Some(dir.into());
        self
    }

    pub fn office_pdf(mut self, policy: RendererPolicy) -> Self {
        self.config.office_pdf = policy;
        self
    }

    pub fn renderer_program(mut self, program: impl Into<String>) -> Self {
        self.config.renderer_program = program.into();
        self
    }

    pub fn renderer_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.renderer_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn renderer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.renderer_timeout_secs = secs;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_title_chars(mut self, n: usize) -> Self {
        self.config.max_title_chars = n;
        self
    }

    pub fn max_line_chars(mut self, n: usize) -> Self {
        self.config.max_line_chars = n;
        self
    }

    pub fn max_diagnostic_chars(mut self, n: usize) -> Self {
        self.config.max_diagnostic_chars = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConfigError> {
        let c = &self.config;
        if c.renderer_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Renderer timeout must be ≥ 1 second".into(),
            ));
        }
        if c.renderer_program.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Renderer program must not be empty".into(),
            ));
        }
        if c.max_title_chars == 0 || c.max_line_chars < 10 {
            return Err(ConfigError::InvalidConfig(format!(
                "Text limits too small: title {} chars, line {} chars (line must be ≥ 10)",
                c.max_title_chars, c.max_line_chars
            )));
        }
        if c.max_diagnostic_chars < 16 {
            return Err(ConfigError::InvalidConfig(format!(
                "max_diagnostic_chars must be ≥ 16, got {}",
                c.max_diagnostic_chars
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which Word/PowerPoint → PDF strategy the registry binds.
///
/// Exactly one strategy is bound per deployment; the choice is made once,
/// when the [`crate::Converter`] is constructed, never per request.
///
/// | Policy | Binding |
/// |--------|---------|
/// | `Auto` | external renderer if its executable is found, else structural (default) |
/// | `External` | always the external renderer; a missing binary surfaces as `ExternalUnavailable` |
/// | `Structural` | always the in-process text layout |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RendererPolicy {
    #[default]
    Auto,
    External,
    Structural,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConverterConfig::default();
        assert_eq!(c.renderer_program, "soffice");
        assert_eq!(c.renderer_timeout_secs, 120);
        assert_eq!(c.office_pdf, RendererPolicy::Auto);
        assert_eq!(c.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(c.jpeg_quality, 90);
    }

    #[test]
    fn builder_clamps_ranges() {
        let c = ConverterConfig::builder()
            .dpi(10)
            .jpeg_quality(0)
            .max_rendered_pixels(5)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 72);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ConverterConfig::builder()
            .renderer_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn builder_rejects_empty_program() {
        assert!(ConverterConfig::builder()
            .renderer_program("  ")
            .build()
            .is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let c = ConverterConfig::builder()
            .renderer_args(["/opt/render.sh"])
            .office_pdf(RendererPolicy::External)
            .build()
            .unwrap();
        let json = serde_json::to_string(&c).unwrap();
        let back: ConverterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.renderer_args, vec!["/opt/render.sh".to_string()]);
        assert_eq!(back.office_pdf, RendererPolicy::External);
    }
}
