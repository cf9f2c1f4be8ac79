//! External renderer adapter: headless office-suite invocation with a hard
//! timeout.
//!
//! The renderer is a black box that takes an input path and an output
//! directory and writes `<input stem>.<ext>` into that directory. The
//! adapter never trusts the exit code alone: a zero exit without the
//! expected file is [`ConvertError::ExternalOutputMissing`].
//!
//! ## Process lifetime
//!
//! On unix the child leads its own process group. The office suite forks
//! its real worker from a launcher, so on timeout the whole group is sent
//! `SIGKILL` and the direct child is reaped before the adapter returns. The
//! group is swept again after a normal exit so no worker outlives the
//! request that started it.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Handle on the configured external renderer.
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    program: String,
    prefix_args: Vec<String>,
    timeout: Duration,
    max_stderr_chars: usize,
}

impl ExternalRenderer {
    pub fn new(program: impl Into<String>, prefix_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix_args,
            timeout,
            max_stderr_chars: 2000,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            program: config.renderer_program.clone(),
            prefix_args: config.renderer_args.clone(),
            timeout: Duration::from_secs(config.renderer_timeout_secs),
            max_stderr_chars: config.max_diagnostic_chars,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the renderer executable can be found.
    ///
    /// A program containing a path separator is checked directly; a bare
    /// name is searched on `PATH`. No process is spawned.
    pub fn is_available(&self) -> bool {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file();
        }
        let Some(paths) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&paths).any(|dir| {
            let candidate = dir.join(program);
            candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
        })
    }

    /// Render `input` to PDF inside `out_dir`.
    pub async fn render_to_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        self.convert_to(input, out_dir, "pdf").await
    }

    /// Convert `input` to `extension` (`pdf`, `docx`, `pptx`) inside `out_dir`.
    ///
    /// Returns the path of the produced file, which is always
    /// `out_dir/<input stem>.<extension>`.
    pub async fn convert_to(
        &self,
        input: &Path,
        out_dir: &Path,
        extension: &str,
    ) -> Result<PathBuf, ConvertError> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let expected_name = format!("{stem}.{extension}");
        let expected = out_dir.join(&expected_name);

        // A private profile per invocation: the office suite refuses to run
        // two instances against one profile.
        let profile_dir = out_dir.join(".profile");
        let args = self.build_args(input, out_dir, &profile_dir, extension);
        debug!("Invoking {} {:?}", self.program, args);

        let start = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::ExternalUnavailable {
                    program: self.program.clone(),
                    detail: "executable not found on PATH".to_string(),
                }
            } else {
                ConvertError::ExternalProcessError {
                    program: self.program.clone(),
                    status: "spawn failed".to_string(),
                    stderr: e.to_string(),
                }
            }
        })?;

        let pgid = child.id();

        // Drain stderr concurrently so a chatty renderer never blocks on a
        // full pipe.
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                kill_group(pgid);
                let _ = child.kill().await;
                abort(stderr_task);
                return Err(ConvertError::ExternalProcessError {
                    program: self.program.clone(),
                    status: "wait failed".to_string(),
                    stderr: e.to_string(),
                });
            }
            Err(_) => {
                // The child is not reaped yet, so its pid still names the group.
                kill_group(pgid);
                // kill() sends SIGKILL and waits, so the child is reaped here.
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out renderer: {}", e);
                }
                abort(stderr_task);
                warn!(
                    "Renderer '{}' exceeded {}s; killed",
                    self.program,
                    self.timeout.as_secs()
                );
                return Err(ConvertError::ExternalTimeout {
                    program: self.program.clone(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        // Workers left behind by a launcher that exited.
        kill_group(pgid);

        // Grandchildren may keep the pipe open after the child exits.
        let stderr = match stderr_task {
            Some(mut task) => match tokio::time::timeout(Duration::from_secs(5), &mut task).await {
                Ok(joined) => joined.unwrap_or_default(),
                Err(_) => {
                    task.abort();
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = bounded(&String::from_utf8_lossy(&stderr), self.max_stderr_chars);
            warn!("Renderer '{}' failed with {}: {}", self.program, status, stderr);
            return Err(ConvertError::ExternalProcessError {
                program: self.program.clone(),
                status: status.to_string(),
                stderr,
            });
        }

        if !expected.is_file() {
            return Err(ConvertError::ExternalOutputMissing {
                program: self.program.clone(),
                expected: expected_name,
            });
        }

        info!(
            "Renderer produced {} in {}ms",
            expected_name,
            start.elapsed().as_millis()
        );
        Ok(expected)
    }

    fn build_args(
        &self,
        input: &Path,
        out_dir: &Path,
        profile_dir: &Path,
        extension: &str,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.prefix_args.iter().map(OsString::from).collect();
        args.push(format!("-env:UserInstallation={}", file_url(profile_dir)).into());
        args.push("--headless".into());
        args.push("--norestore".into());
        args.push("--convert-to".into());
        args.push(extension.into());
        args.push("--outdir".into());
        args.push(out_dir.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }
}

/// Send `SIGKILL` to every process in the renderer's group.
#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid addresses a group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!("Killed renderer process group {}", pgid);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}

fn abort(task: Option<tokio::task::JoinHandle<Vec<u8>>>) {
    if let Some(task) = task {
        task.abort();
    }
}

/// `file://` URL for a local directory, as the office suite expects for
/// `UserInstallation`.
fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

/// Cut `text` to at most `max` characters, marking the cut.
pub(crate) fn bounded(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
