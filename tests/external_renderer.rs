//! External renderer behaviour, exercised with shell-script stand-ins.
//!
//! Each script is run as `sh <script> <headless argv…>`, the same argv the
//! office suite receives, so the adapter's process handling is tested
//! without an office suite installed.
#![cfg(unix)]

use docshift::pipeline::office::read_pptx;
use docshift::pipeline::ooxml::{write_docx, Block};
use docshift::{ConversionOutcome, Converter, ConverterConfig, ErrorKind, RendererPolicy};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Parses `--convert-to` / `--outdir` / input like the real renderer.
const ARGV_PARSER: &str = r#"
argv="$*"
ext=""; out=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) ext="$2"; shift 2 ;;
    --outdir) out="$2"; shift 2 ;;
    *) input="$1"; shift ;;
  esac
done
stem=$(basename "$input"); stem="${stem%.*}"
"#;

struct Fixture {
    staging: tempfile::TempDir,
    scripts: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            staging: tempfile::tempdir().unwrap(),
            scripts: tempfile::tempdir().unwrap(),
        }
    }

    fn script(&self, body: &str) -> PathBuf {
        let path = self.scripts.path().join("render.sh");
        std::fs::write(&path, format!("{ARGV_PARSER}\n{body}\n")).unwrap();
        path
    }

    fn converter(&self, script: &Path, timeout_secs: u64) -> Converter {
        Converter::new(
            ConverterConfig::builder()
                .staging_root(self.staging.path())
                .office_pdf(RendererPolicy::External)
                .renderer_program("sh")
                .renderer_args([script.to_string_lossy().to_string()])
                .renderer_timeout_secs(timeout_secs)
                .build()
                .unwrap(),
        )
    }

    fn assert_staging_empty(&self) {
        let left: Vec<_> = std::fs::read_dir(self.staging.path())
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .collect();
        assert!(left.is_empty(), "staging root not empty: {left:?}");
    }
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let blocks: Vec<Block> = paragraphs.iter().map(|p| Block::Paragraph(p.to_string())).collect();
    write_docx(&blocks).unwrap()
}

/// Whether `pid` is still running. Zombies count as gone: an orphan waits
/// for init to reap it.
#[cfg(target_os = "linux")]
fn running(pid: &str) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid.trim())) else {
        return false;
    };
    let state = stat.rsplit(')').next().unwrap_or("").trim_start().chars().next();
    !matches!(state, Some('Z') | Some('X') | None)
}

/// Polls `running` for up to three seconds.
#[cfg(target_os = "linux")]
async fn gone(pid: &str) -> bool {
    for _ in 0..30 {
        if !running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn legacy_doc() -> Vec<u8> {
    let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    bytes.resize(1024, 0);
    bytes
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn renderer_output_becomes_the_artifact() {
    let fx = Fixture::new();
    let script = fx.script(r#"cp "$input" "$out/$stem.$ext""#);
    let c = fx.converter(&script, 30);
    let input = docx(&["Hello"]);

    let outcome = c.convert(&input, "report.docx", "pdf").await;
    let artifact = match outcome {
        ConversionOutcome::Success(artifact) => artifact,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(artifact.filename, "report.pdf");
    assert_eq!(artifact.content_type, "application/pdf");
    assert_eq!(artifact.bytes, input);
    fx.assert_staging_empty();
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let fx = Fixture::new();
    let script = fx.script("echo boom >&2; exit 3");
    let c = fx.converter(&script, 30);

    let outcome = c.convert(&docx(&["x"]), "report.docx", "pdf").await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ExternalProcessError));
    let message = outcome.to_string();
    assert!(message.contains("boom"), "{message}");
    assert!(
        !message.contains(&fx.staging.path().to_string_lossy().to_string()),
        "{message}"
    );
    fx.assert_staging_empty();
}

#[tokio::test]
async fn clean_exit_without_output_is_missing_output() {
    let fx = Fixture::new();
    let script = fx.script("exit 0");
    let c = fx.converter(&script, 30);

    let outcome = c.convert(&docx(&["x"]), "slides.pptx", "pdf").await;
    // The input is a docx renamed .pptx; the renderer never reads it.
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ExternalOutputMissing));
    assert!(outcome.to_string().contains("slides.pdf"));
    fx.assert_staging_empty();
}

#[tokio::test]
async fn renderer_gets_a_private_profile() {
    let fx = Fixture::new();
    let seen = fx.scripts.path().join("argv.txt");
    let script = fx.script(&format!(
        r#"echo "$argv" > '{}'; cp "$input" "$out/$stem.$ext""#,
        seen.display()
    ));
    let c = fx.converter(&script, 30);

    let outcome = c.convert(&docx(&["x"]), "report.docx", "pdf").await;
    assert!(outcome.is_success(), "{outcome:?}");
    let argv = std::fs::read_to_string(&seen).unwrap();
    assert!(argv.contains("-env:UserInstallation=file://"), "{argv}");
    assert!(argv.contains(&fx.staging.path().to_string_lossy().to_string()), "{argv}");
    assert!(argv.contains("--headless"), "{argv}");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_the_renderer() {
    let fx = Fixture::new();
    let pidfile = fx.scripts.path().join("pid");
    let script = fx.script(&format!("echo $$ > '{}'; exec sleep 30", pidfile.display()));
    let c = fx.converter(&script, 1);

    let start = Instant::now();
    let outcome = c.convert(&docx(&["x"]), "report.docx", "pdf").await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ExternalTimeout));
    assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());

    let pid = std::fs::read_to_string(&pidfile).unwrap();
    assert!(!running(&pid), "renderer {} still alive", pid.trim());
    fx.assert_staging_empty();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_forked_workers() {
    let fx = Fixture::new();
    let pidfile = fx.scripts.path().join("worker");
    // A launcher that forks the real worker and waits on it.
    let script = fx.script(&format!("sleep 30 & echo $! > '{}'; wait", pidfile.display()));
    let c = fx.converter(&script, 1);

    let start = Instant::now();
    let outcome = c.convert(&docx(&["x"]), "report.docx", "pdf").await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ExternalTimeout));
    assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());

    let pid = std::fs::read_to_string(&pidfile).unwrap();
    assert!(gone(&pid).await, "worker {} outlived the request", pid.trim());
    fx.assert_staging_empty();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn workers_left_by_a_finished_launcher_are_killed() {
    let fx = Fixture::new();
    let pidfile = fx.scripts.path().join("worker");
    let script = fx.script(&format!(
        r#"sleep 30 & echo $! > '{}'; cp "$input" "$out/$stem.$ext""#,
        pidfile.display()
    ));
    let c = fx.converter(&script, 30);

    let outcome = c.convert(&docx(&["x"]), "report.docx", "pdf").await;
    assert!(outcome.is_success(), "{outcome:?}");
    let pid = std::fs::read_to_string(&pidfile).unwrap();
    assert!(gone(&pid).await, "worker {} outlived the request", pid.trim());
}

#[tokio::test]
async fn legacy_doc_is_normalized_before_conversion() {
    let fx = Fixture::new();
    let modern = fx.scripts.path().join("normalized.docx");
    std::fs::write(&modern, docx(&["Agenda", "", "Budget"])).unwrap();
    let script = fx.script(&format!(
        r#"[ "$ext" = "docx" ] || exit 9; cp '{}' "$out/$stem.$ext""#,
        modern.display()
    ));
    let c = fx.converter(&script, 30);

    let outcome = c.convert(&legacy_doc(), "old.doc", "ppt").await;
    let artifact = match outcome {
        ConversionOutcome::Success(artifact) => artifact,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(artifact.filename, "old.pptx");
    assert_eq!(
        read_pptx(&artifact.bytes).unwrap(),
        vec![vec!["Agenda".to_string()], vec!["Budget".to_string()]]
    );
    fx.assert_staging_empty();
}
