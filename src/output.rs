//! Result types produced by strategies and returned to callers.

use crate::error::ErrorKind;
use crate::format::{SourceKind, TargetFormat};
use serde::Serialize;
use std::fmt;

/// One named output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// What a strategy produced, before packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    /// Exactly one output file.
    Single {
        bytes: Vec<u8>,
        filename: String,
        mime_type: String,
    },
    /// Several output files to be bundled into one archive.
    Multi {
        artifacts: Vec<Artifact>,
        archive_name: String,
    },
}

impl ConversionResult {
    /// Number of files the strategy produced.
    pub fn artifact_count(&self) -> usize {
        match self {
            ConversionResult::Single { .. } => 1,
            ConversionResult::Multi { artifacts, .. } => artifacts.len(),
        }
    }
}

/// Final, packaged response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagedArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    /// Number of files inside (1 unless the result was archived).
    pub entries: usize,
}

/// Every call to [`crate::Converter::convert`] ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success(PackagedArtifact),
    Unsupported {
        source: SourceKind,
        target: TargetFormat,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success(_))
    }

    /// The failure kind, with `Unsupported` reported as
    /// [`ErrorKind::UnsupportedConversion`].
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ConversionOutcome::Success(_) => None,
            ConversionOutcome::Unsupported { .. } => Some(ErrorKind::UnsupportedConversion),
            ConversionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Consume the outcome, yielding the artifact or `None`.
    pub fn into_artifact(self) -> Option<PackagedArtifact> {
        match self {
            ConversionOutcome::Success(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionOutcome::Success(a) => {
                write!(f, "Converted: {} ({} bytes)", a.filename, a.bytes.len())
            }
            ConversionOutcome::Unsupported { source, target } => {
                write!(f, "Unsupported conversion: {source} → {target}")
            }
            ConversionOutcome::Failure { message, .. } => f.write_str(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_message_is_stable() {
        let o = ConversionOutcome::Unsupported {
            source: SourceKind::WordDocument,
            target: TargetFormat::Other("xyz".into()),
        };
        assert_eq!(o.to_string(), "Unsupported conversion: WordDocument → xyz");
        assert_eq!(o.error_kind(), Some(ErrorKind::UnsupportedConversion));
        assert!(o.into_artifact().is_none());
    }

    #[test]
    fn failure_displays_its_message_only() {
        let o = ConversionOutcome::Failure {
            kind: ErrorKind::SourceUnreadable,
            message: "Source file is unreadable: bad header".into(),
        };
        assert_eq!(o.to_string(), "Source file is unreadable: bad header");
        assert!(!o.is_success());
    }
}
