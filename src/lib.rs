//! # docshift
//!
//! Convert uploaded documents between images, PDF, Word and PowerPoint.
//!
//! ## Why a dispatch engine?
//!
//! Each conversion pair needs a different tool: an image codec, a PDF
//! rasteriser, an OOXML reader, a headless office suite. Instead of nested
//! branches per pair, this crate keeps one table of `(source, target)` →
//! strategy, stages every upload in a private workspace, and turns every
//! failure into a value. Callers get exactly one [`ConversionOutcome`] per
//! request and never see a temp path.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (bytes, filename, target)
//!  │
//!  ├─ 1. Classify   extension → SourceKind, token → TargetFormat
//!  ├─ 2. Resolve    static allow-list; miss → Unsupported, nothing staged
//!  ├─ 3. Stage      request-private workspace (UUID-named temp dir)
//!  ├─ 4. Run        in-process on the blocking pool, or external renderer
//!  │                 with a hard timeout
//!  ├─ 5. Package    one file as-is, several pages zipped
//!  └─ 6. Release    workspace removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift::{ConversionOutcome, Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConverterConfig::default());
//!     let bytes = std::fs::read("slides.pptx")?;
//!     match converter.convert(&bytes, "slides.pptx", "pdf").await {
//!         ConversionOutcome::Success(a) => std::fs::write(&a.filename, &a.bytes)?,
//!         ConversionOutcome::Unsupported { .. } => eprintln!("not supported"),
//!         ConversionOutcome::Failure { kind, message } => eprintln!("{kind}: {message}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Conversions
//!
//! | Source | Targets |
//! |--------|---------|
//! | Image (`.png .jpg .jpeg`) | png, jpg, jpeg, pdf, docx, doc, pptx, ppt |
//! | PDF | png, jpg, jpeg (one file per page, zipped when > 1), docx, doc, pptx, ppt |
//! | Word (`.docx .doc`) | pdf, docx, doc, pptx, ppt |
//! | PowerPoint (`.pptx .ppt`) | pdf, docx, doc, pptx, ppt |
//!
//! Legacy targets (`doc`, `ppt`) produce the modern container.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`    | on  | Enables the `docshift` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | off | HTTP collaborator on axum (`docshift serve`) |
//!
//! ## Runtime Dependencies
//!
//! PDF rasterisation and text extraction load libpdfium at runtime.
//! Word/PowerPoint → PDF prefers a headless office suite (`soffice`);
//! without one the in-process structural layout is bound instead.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod external;
pub mod format;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod registry;
#[cfg(feature = "server")]
pub mod server;
pub mod strategy;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConverterConfig, ConverterConfigBuilder, RendererPolicy, DEFAULT_MAX_UPLOAD_BYTES,
};
pub use convert::Converter;
pub use error::{ConfigError, ConvertError, ErrorKind};
pub use external::ExternalRenderer;
pub use format::{
    classify, normalize_target, ConversionKey, SourceKind, TargetFormat, ACCEPTED_EXTENSIONS,
};
pub use output::{Artifact, ConversionOutcome, ConversionResult, PackagedArtifact};
pub use registry::StrategyRegistry;
pub use strategy::{Renderer, Strategy};
