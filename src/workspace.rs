//! Request-scoped staging: one private directory per conversion.
//!
//! ## Why a directory, not a single temp file?
//!
//! The external renderer reads an input *path* and writes its result next
//! to an output *directory*, and legacy inputs produce a normalized copy
//! before the real strategy runs. Keeping the upload, every intermediate,
//! and the renderer profile under one [`TempDir`] means a single removal
//! releases all of them. The directory is removed by [`Workspace::release`]
//! on normal paths, and by `TempDir`'s drop if the future is cancelled or a
//! panic unwinds through the caller.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// A staged upload plus any intermediates produced while converting it.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: TempDir,
    input: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under `root` and write `bytes` into it.
    ///
    /// The directory name carries a per-request UUID, so two requests with
    /// the same original filename never collide.
    pub fn stage(root: &Path, filename: &str, bytes: &[u8]) -> Result<Self, ConvertError> {
        let id = Uuid::new_v4();
        std::fs::create_dir_all(root)
            .map_err(|e| ConvertError::encoding("failed to prepare staging root", e))?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("docshift-{id}-"))
            .tempdir_in(root)
            .map_err(|e| ConvertError::encoding("failed to create workspace", e))?;

        let input = dir.path().join(sanitize_filename(filename));
        std::fs::write(&input, bytes)
            .map_err(|e| ConvertError::encoding("failed to stage upload", e))?;

        debug!(
            request = %id,
            bytes = bytes.len(),
            "Staged upload as {}",
            input.display()
        );

        Ok(Self { id, dir, input })
    }

    /// Per-request identifier, also used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Root of the workspace directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The staged upload.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Create (if needed) and return a named subdirectory for intermediates.
    pub fn scratch_dir(&self, name: &str) -> Result<PathBuf, ConvertError> {
        let path = self.dir.path().join(sanitize_filename(name));
        std::fs::create_dir_all(&path)
            .map_err(|e| ConvertError::encoding("failed to create scratch directory", e))?;
        Ok(path)
    }

    /// Remove the workspace and everything in it. Consumes `self`, so the
    /// release happens at most once.
    ///
    /// Failure is reported as [`ConvertError::CleanupFailed`] for logging;
    /// callers must not let it replace the conversion's own outcome.
    pub fn release(self) -> Result<(), ConvertError> {
        let id = self.id;
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!(request = %id, "Released workspace");
                Ok(())
            }
            Err(e) => {
                warn!(request = %id, "Failed to remove workspace {}: {}", path.display(), e);
                Err(ConvertError::CleanupFailed(e.to_string()))
            }
        }
    }
}

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Reduce an arbitrary client filename to a safe single path component.
///
/// Directory parts are dropped, runs of anything outside `[A-Za-z0-9._-]`
/// become `_`, and leading dots are stripped so the result is never hidden
/// or a parent reference. Falls back to `upload`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = RE_UNSAFE.replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.').trim_matches('_');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// File stem of the sanitized filename, used to name outputs.
pub fn output_basename(filename: &str) -> String {
    let safe = sanitize_filename(filename);
    match Path::new(&safe).file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => "converted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_unsafe_runs() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\My Report.docx"), "My_Report.docx");
        assert_eq!(sanitize_filename("..hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("résumé final.pdf"), "r_sum_final.pdf");
        assert_eq!(sanitize_filename("///"), "upload");
    }

    #[test]
    fn basename_is_stem_of_sanitized_name() {
        assert_eq!(output_basename("photo.png"), "photo");
        assert_eq!(output_basename("my deck.v2.pptx"), "my_deck.v2");
        assert_eq!(output_basename(""), "upload");
    }

    #[test]
    fn stage_and_release_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::stage(root.path(), "report.docx", b"hello").unwrap();
        assert_eq!(std::fs::read(ws.input()).unwrap(), b"hello");
        assert!(ws.input().ends_with("report.docx"));

        let scratch = ws.scratch_dir("render").unwrap();
        std::fs::write(scratch.join("report.pdf"), b"%PDF").unwrap();

        let ws_root = ws.root().to_path_buf();
        ws.release().unwrap();
        assert!(!ws_root.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn same_filename_gets_distinct_workspaces() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::stage(root.path(), "photo.png", b"a").unwrap();
        let b = Workspace::stage(root.path(), "photo.png", b"b").unwrap();
        assert_ne!(a.input(), b.input());
        assert_ne!(a.id(), b.id());
        assert_eq!(std::fs::read(a.input()).unwrap(), b"a");
        assert_eq!(std::fs::read(b.input()).unwrap(), b"b");
    }

    #[test]
    fn drop_also_removes_workspace() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::stage(root.path(), "x.pdf", b"%PDF").unwrap();
        let ws_root = ws.root().to_path_buf();
        drop(ws);
        assert!(!ws_root.exists());
    }
}
