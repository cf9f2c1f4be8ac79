//! Result packaging: shape a [`ConversionResult`] into one downloadable file.
//!
//! Strategies name their output with [`single_name`] and [`archive_name`];
//! packaging keeps those names.
//!
//! | Result | Filename | Content type |
//! |--------|----------|--------------|
//! | `Single` | `<basename>.<target extension>` | the strategy's MIME type |
//! | `Multi` | `<basename>_<target>s.zip` | `application/zip` |
//!
//! Archive entries keep the names the strategy gave them, in order.

use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::output::{ConversionResult, PackagedArtifact};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Archive name for a multi-artifact result, e.g. `deck_pngs.zip`.
pub fn archive_name(basename: &str, target: &TargetFormat) -> String {
    format!("{basename}_{}s.{ARCHIVE_EXTENSION}", target.token())
}

/// Final filename for a single-artifact result.
pub fn single_name(basename: &str, target: &TargetFormat) -> String {
    format!("{basename}.{}", target.file_extension())
}

/// Package a strategy result for delivery.
pub fn package(result: ConversionResult) -> Result<PackagedArtifact, ConvertError> {
    match result {
        ConversionResult::Single {
            bytes,
            filename,
            mime_type,
        } => Ok(PackagedArtifact {
            bytes,
            filename,
            content_type: mime_type,
            entries: 1,
        }),
        ConversionResult::Multi {
            artifacts,
            archive_name,
        } => {
            let entries = artifacts.len();
            let bytes = write_zip(
                artifacts
                    .iter()
                    .map(|a| (a.filename.as_str(), a.bytes.as_slice())),
            )?;
            Ok(PackagedArtifact {
                bytes,
                filename: archive_name,
                content_type: ARCHIVE_CONTENT_TYPE.to_string(),
                entries,
            })
        }
    }
}

/// Write `(name, bytes)` entries into a deflated zip, in iteration order.
///
/// Every entry carries the zip epoch timestamp, so identical entries
/// produce identical archives.
pub(crate) fn write_zip<'a, I>(entries: I) -> Result<Vec<u8>, ConvertError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        zip.start_file(name, options)
            .map_err(|e| ConvertError::encoding("archive entry failed", e))?;
        zip.write_all(bytes)
            .map_err(|e| ConvertError::encoding("archive write failed", e))?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| ConvertError::encoding("archive finalize failed", e))?;
    Ok(cursor.into_inner())
}
