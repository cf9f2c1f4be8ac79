//! The public conversion entry point.
//!
//! [`Converter::convert`] runs the whole request:
//!
//! ```text
//! classify ─▶ normalize target ─▶ resolve ─▶ stage ─▶ run strategy ─▶ package ─▶ release
//!    │                               │
//!    └─ UnsupportedExtension         └─ Unsupported (nothing staged)
//! ```
//!
//! Every call ends in exactly one [`ConversionOutcome`]; no error escapes.
//! The workspace is released on every path after staging, and a release
//! failure is logged without touching the outcome.

use crate::config::{ConverterConfig, RendererPolicy};
use crate::error::ConvertError;
use crate::external::{bounded, ExternalRenderer};
use crate::format::{classify, normalize_target, ConversionKey};
use crate::output::ConversionOutcome;
use crate::package::package;
use crate::registry::StrategyRegistry;
use crate::strategy::Job;
use crate::workspace::{output_basename, Workspace};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const WORKSPACE_PLACEHOLDER: &str = "<workspace>";

/// A configured conversion engine.
///
/// Cheap to clone; clones share configuration. The office → PDF renderer
/// is bound once in [`Converter::new`] and never changes afterwards.
///
/// # Example
/// ```rust,no_run
/// use docshift::{Converter, ConverterConfig, ConversionOutcome};
///
/// #[tokio::main]
/// async fn main() {
///     let converter = Converter::new(ConverterConfig::default());
///     let bytes = std::fs::read("photo.png").unwrap();
///     match converter.convert(&bytes, "photo.png", "jpg").await {
///         ConversionOutcome::Success(artifact) => {
///             std::fs::write(&artifact.filename, &artifact.bytes).unwrap();
///         }
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
    registry: Arc<StrategyRegistry>,
    renderer: ExternalRenderer,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        let renderer = ExternalRenderer::from_config(&config);
        let available = config.office_pdf == RendererPolicy::Auto && renderer.is_available();
        let registry = StrategyRegistry::new(config.office_pdf, available);
        info!(
            "Converter ready: office → PDF via {:?} renderer ({}), {} conversion pairs",
            registry.office_renderer(),
            renderer.program(),
            registry.supported_pairs().len()
        );
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            renderer,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Convert `bytes`, uploaded as `filename`, to `target_raw`.
    pub async fn convert(
        &self,
        bytes: &[u8],
        filename: &str,
        target_raw: &str,
    ) -> ConversionOutcome {
        let start = Instant::now();
        let target = normalize_target(target_raw);

        let source = match classify(filename) {
            Ok(source) => source,
            Err(e) => {
                info!("Rejected upload: {}", e);
                return self.failure(&e, None);
            }
        };

        let key = ConversionKey::new(source, target.clone());
        let Some(strategy) = self.registry.resolve(&key) else {
            info!("Unsupported conversion: {}", key);
            return ConversionOutcome::Unsupported { source, target };
        };

        let workspace = match Workspace::stage(&self.config.staging_root(), filename, bytes) {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Staging failed: {}", e);
                return self.failure(&e, None);
            }
        };
        let request = workspace.id();
        info!(
            request = %request,
            source = %source,
            target = %target,
            strategy = %strategy,
            bytes = bytes.len(),
            "Converting upload"
        );

        let basename = output_basename(filename);
        let job = Job::new(&self.config, &basename, &target);
        let result = match strategy.run(&workspace, job, &self.renderer).await {
            Ok(result) => {
                debug!(
                    request = %request,
                    "Strategy produced {} artifact(s)",
                    result.artifact_count()
                );
                package(result)
            }
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(artifact) => ConversionOutcome::Success(artifact),
            Err(e) => {
                warn!(request = %request, kind = %e.kind(), "Conversion failed: {}", e);
                self.failure(&e, Some(workspace.root()))
            }
        };

        // Already logged inside release(); never overrides the outcome.
        let _ = workspace.release();

        info!(
            request = %request,
            elapsed_ms = start.elapsed().as_millis() as u64,
            success = outcome.is_success(),
            "Finished: {}",
            outcome
        );
        outcome
    }

    /// Blocking wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime; must not be called from inside
    /// an async context.
    pub fn convert_sync(
        &self,
        bytes: &[u8],
        filename: &str,
        target_raw: &str,
    ) -> ConversionOutcome {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.convert(bytes, filename, target_raw)),
            Err(e) => self.failure(
                &ConvertError::encoding("failed to create tokio runtime", e),
                None,
            ),
        }
    }

    /// Convert the file at `input` and write the artifact into `out_dir`.
    ///
    /// On success the file is `out_dir/<artifact.filename>`, written to a
    /// temporary name first and renamed into place, so a partial file is
    /// never visible.
    pub async fn convert_file(
        &self,
        input: &Path,
        target_raw: &str,
        out_dir: &Path,
    ) -> ConversionOutcome {
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Classify first so rejected types are never read.
        if let Err(e) = classify(&filename) {
            return self.failure(&e, None);
        }

        let bytes = match tokio::fs::read(input).await {
            Ok(b) => b,
            Err(e) => return self.failure(&ConvertError::unreadable("input unreadable", e), None),
        };

        let outcome = self.convert(&bytes, &filename, target_raw).await;
        let ConversionOutcome::Success(artifact) = &outcome else {
            return outcome;
        };

        let dest = out_dir.join(&artifact.filename);
        if let Err(e) = write_atomic(out_dir, &dest, &artifact.bytes).await {
            return self.failure(&e, None);
        }
        info!("Wrote {}", dest.display());
        outcome
    }

    /// Fold an error into a bounded, path-free failure outcome.
    fn failure(&self, err: &ConvertError, workspace: Option<&Path>) -> ConversionOutcome {
        let mut message = err.to_string();
        if let Some(root) = workspace {
            let root = root.to_string_lossy();
            if !root.is_empty() {
                message = message.replace(root.as_ref(), WORKSPACE_PLACEHOLDER);
            }
        }
        ConversionOutcome::Failure {
            kind: err.kind(),
            message: bounded(&message, self.config.max_diagnostic_chars),
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConverterConfig::default())
    }
}

async fn write_atomic(dir: &Path, dest: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::encoding("output directory unavailable", e))?;

    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| ConvertError::encoding("output write failed", e))?;
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ConvertError::encoding("output rename failed", e));
    }
    Ok(())
}
