//! Error types for the docshift library.
//!
//! Three layers reflect three distinct audiences:
//!
//! * [`ConvertError`] — what went wrong inside the engine. Produced by the
//!   classifier, the workspace, every pipeline stage and the external
//!   renderer adapter. Never escapes [`crate::Converter::convert`].
//!
//! * [`ErrorKind`] — the stable, data-less taxonomy carried by
//!   [`crate::ConversionOutcome::Failure`]. Callers branch on this, never on
//!   library-specific error types.
//!
//! * [`ConfigError`] — returned by [`crate::ConverterConfigBuilder::build`]
//!   before any conversion runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The upload's extension is absent or not recognised.
    UnsupportedExtension,
    /// Valid source, but no strategy is bound for the requested target.
    UnsupportedConversion,
    /// The source bytes could not be decoded or parsed.
    SourceUnreadable,
    /// The target could not be encoded or written.
    EncodingFailed,
    /// The external renderer (or the pdfium engine) is not installed.
    ExternalUnavailable,
    /// The external renderer exceeded its wall-clock budget.
    ExternalTimeout,
    /// The external renderer exited with a non-zero status.
    ExternalProcessError,
    /// The external renderer exited cleanly but wrote nothing usable.
    ExternalOutputMissing,
    /// Staged files could not be removed. Logged only.
    CleanupFailed,
}

impl ErrorKind {
    /// `true` when the failure is caused by the request itself rather than
    /// by the engine; HTTP collaborators answer these with a 400.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::UnsupportedExtension | ErrorKind::UnsupportedConversion
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedExtension => "UnsupportedExtension",
            ErrorKind::UnsupportedConversion => "UnsupportedConversion",
            ErrorKind::SourceUnreadable => "SourceUnreadable",
            ErrorKind::EncodingFailed => "EncodingFailed",
            ErrorKind::ExternalUnavailable => "ExternalUnavailable",
            ErrorKind::ExternalTimeout => "ExternalTimeout",
            ErrorKind::ExternalProcessError => "ExternalProcessError",
            ErrorKind::ExternalOutputMissing => "ExternalOutputMissing",
            ErrorKind::CleanupFailed => "CleanupFailed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors raised inside the conversion engine.
///
/// Messages never contain staging paths: variants carry file *names* or
/// diagnostic text only.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Classification ────────────────────────────────────────────────────
    /// Filename has no extension, or one outside the accepted set.
    #[error("Unsupported file extension {extension:?} for '{filename}'. Accepted: .jpg .jpeg .png .pdf .docx .doc .pptx .ppt")]
    UnsupportedExtension {
        filename: String,
        extension: Option<String>,
    },

    // ── Strategy errors ───────────────────────────────────────────────────
    /// Decoding or parsing the source failed.
    #[error("Source file is unreadable: {0}")]
    SourceUnreadable(String),

    /// Encoding or writing the target failed.
    #[error("Failed to encode output: {0}")]
    EncodingFailed(String),

    // ── External renderer ─────────────────────────────────────────────────
    /// Renderer binary (or shared library) could not be found or loaded.
    #[error("External dependency '{program}' is not available: {detail}")]
    ExternalUnavailable { program: String, detail: String },

    /// Renderer was killed after exceeding its timeout.
    #[error("External renderer '{program}' timed out after {secs}s")]
    ExternalTimeout { program: String, secs: u64 },

    /// Renderer exited with a non-zero status.
    #[error("External renderer '{program}' failed ({status}): {stderr}")]
    ExternalProcessError {
        program: String,
        status: String,
        stderr: String,
    },

    /// Renderer exited with status 0 but the expected file is absent.
    #[error("External renderer '{program}' reported success but did not produce '{expected}'")]
    ExternalOutputMissing { program: String, expected: String },

    // ── Workspace ─────────────────────────────────────────────────────────
    /// Removing the request workspace failed. Never overrides an outcome.
    #[error("Failed to remove staged files: {0}")]
    CleanupFailed(String),
}

impl ConvertError {
    /// Map this error onto the stable taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::UnsupportedExtension { .. } => ErrorKind::UnsupportedExtension,
            ConvertError::SourceUnreadable(_) => ErrorKind::SourceUnreadable,
            ConvertError::EncodingFailed(_) => ErrorKind::EncodingFailed,
            ConvertError::ExternalUnavailable { .. } => ErrorKind::ExternalUnavailable,
            ConvertError::ExternalTimeout { .. } => ErrorKind::ExternalTimeout,
            ConvertError::ExternalProcessError { .. } => ErrorKind::ExternalProcessError,
            ConvertError::ExternalOutputMissing { .. } => ErrorKind::ExternalOutputMissing,
            ConvertError::CleanupFailed(_) => ErrorKind::CleanupFailed,
        }
    }

    pub(crate) fn unreadable(context: &str, err: impl fmt::Display) -> Self {
        ConvertError::SourceUnreadable(format!("{context}: {err}"))
    }

    pub(crate) fn encoding(context: &str, err: impl fmt::Display) -> Self {
        ConvertError::EncodingFailed(format!("{context}: {err}"))
    }
}

/// Builder validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
