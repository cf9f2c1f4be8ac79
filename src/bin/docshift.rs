//! CLI binary for docshift.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConverterConfig` and prints outcomes.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docshift::{ConversionOutcome, Converter, ConverterConfig, RendererPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Image to JPEG in the current directory
  docshift convert photo.png --to jpg

  # Every page of a PDF as PNG (zipped when there is more than one)
  docshift convert report.pdf --to png -o out/

  # Word to PDF, never touching an office suite
  docshift convert --office-pdf structural notes.docx --to pdf

  # List supported conversions
  docshift formats

  # HTTP service (build with --features server)
  docshift serve --addr 127.0.0.1:8080

ENVIRONMENT VARIABLES:
  DOCSHIFT_STAGING_ROOT      Parent directory for per-request workspaces
  DOCSHIFT_OFFICE_PDF        auto | external | structural
  DOCSHIFT_RENDERER          External renderer executable (default: soffice)
  DOCSHIFT_RENDERER_TIMEOUT  Renderer timeout in seconds
  PDFIUM_LIB_PATH            Path to an existing libpdfium
  RUST_LOG                   Overrides --verbose / --quiet
"#;

/// Convert documents between images, PDF, Word and PowerPoint.
#[derive(Parser, Debug)]
#[command(
    name = "docshift",
    version,
    about = "Convert documents between images, PDF, Word and PowerPoint",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSHIFT_QUIET")]
    quiet: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one file and write the artifact to a directory.
    Convert {
        /// Input file (.png .jpg .jpeg .pdf .docx .doc .pptx .ppt).
        input: PathBuf,

        /// Target format: png, jpg, jpeg, pdf, docx, doc, pptx, ppt.
        #[arg(short, long)]
        to: String,

        /// Output directory.
        #[arg(short, long, env = "DOCSHIFT_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,

        /// Disable the spinner.
        #[arg(long, env = "DOCSHIFT_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List every supported (source, target) pair.
    Formats {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Serve the HTTP API.
    #[cfg(feature = "server")]
    Serve {
        /// Listen address.
        #[arg(long, env = "DOCSHIFT_ADDR", default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
    },
}

/// Engine knobs shared by every subcommand.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Parent directory for per-request workspaces.
    #[arg(long, global = true, env = "DOCSHIFT_STAGING_ROOT")]
    staging_root: Option<PathBuf>,

    /// How Word/PowerPoint → PDF is rendered.
    #[arg(
        long,
        global = true,
        env = "DOCSHIFT_OFFICE_PDF",
        value_enum,
        default_value = "auto"
    )]
    office_pdf: PolicyArg,

    /// External renderer executable.
    #[arg(long, global = true, env = "DOCSHIFT_RENDERER", default_value = "soffice")]
    renderer: String,

    /// Extra arguments placed before the renderer's headless argv.
    #[arg(long = "renderer-arg", global = true, allow_hyphen_values = true)]
    renderer_args: Vec<String>,

    /// Renderer timeout in seconds.
    #[arg(long, global = true, env = "DOCSHIFT_RENDERER_TIMEOUT", default_value_t = 120)]
    renderer_timeout: u64,

    /// PDF rasterisation DPI (72–600).
    #[arg(long, global = true, env = "DOCSHIFT_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Cap on either edge of a rendered page, in pixels.
    #[arg(long, global = true, env = "DOCSHIFT_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// JPEG quality (1–100).
    #[arg(long, global = true, env = "DOCSHIFT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Explicit libpdfium location.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Largest input accepted, in bytes.
    #[arg(
        long,
        global = true,
        env = "DOCSHIFT_MAX_UPLOAD",
        default_value_t = docshift::DEFAULT_MAX_UPLOAD_BYTES
    )]
    max_upload: usize,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Auto,
    External,
    Structural,
}

impl From<PolicyArg> for RendererPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::Auto => RendererPolicy::Auto,
            PolicyArg::External => RendererPolicy::External,
            PolicyArg::Structural => RendererPolicy::Structural,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.engine)?;

    match cli.command {
        Command::Convert {
            input,
            to,
            output,
            no_progress,
        } => run_convert(config, input, &to, output, !cli.quiet && !no_progress, cli.quiet).await,
        Command::Formats { json } => print_formats(config, json),
        #[cfg(feature = "server")]
        Command::Serve { addr } => {
            let converter = std::sync::Arc::new(Converter::new(config));
            docshift::server::serve(converter, addr)
                .await
                .with_context(|| format!("HTTP server on {addr} failed"))
        }
    }
}

/// Map CLI args to `ConverterConfig`.
fn build_config(args: &EngineArgs) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .office_pdf(args.office_pdf.into())
        .renderer_program(args.renderer.clone())
        .renderer_args(args.renderer_args.iter().cloned())
        .renderer_timeout_secs(args.renderer_timeout)
        .dpi(args.dpi)
        .max_rendered_pixels(args.max_pixels)
        .jpeg_quality(args.jpeg_quality)
        .max_upload_bytes(args.max_upload);

    if let Some(ref dir) = args.staging_root {
        builder = builder.staging_root(dir);
    }
    if let Some(ref path) = args.pdfium {
        builder = builder.pdfium_library_path(path);
    }

    builder.build().context("Invalid configuration")
}

async fn run_convert(
    config: ConverterConfig,
    input: PathBuf,
    target: &str,
    out_dir: PathBuf,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let size = tokio::fs::metadata(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?
        .len();
    if size > config.max_upload_bytes as u64 {
        anyhow::bail!(
            "{} is {} bytes; the limit is {} bytes",
            input.display(),
            size,
            config.max_upload_bytes
        );
    }

    let converter = Converter::new(config);

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format!("{} → {}", input.display(), target.trim()));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let outcome = converter.convert_file(&input, target, &out_dir).await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    match outcome {
        ConversionOutcome::Success(artifact) => {
            if !quiet {
                eprintln!(
                    "{}  {}  {}  →  {}",
                    green("✔"),
                    dim(&format!("{} bytes", artifact.bytes.len())),
                    dim(&format!("{} file(s)", artifact.entries)),
                    bold(&out_dir.join(&artifact.filename).display().to_string()),
                );
            }
            Ok(())
        }
        other => {
            let kind = other
                .error_kind()
                .map(|k| k.as_str())
                .unwrap_or("Unknown");
            if !quiet {
                eprintln!("{}  {}", red("✘"), bold(kind));
            }
            anyhow::bail!("{kind}: {other}")
        }
    }
}

fn print_formats(config: ConverterConfig, json: bool) -> Result<()> {
    let converter = Converter::new(config);
    let pairs = converter.registry().supported_pairs();

    if json {
        let rows: Vec<serde_json::Value> = pairs
            .iter()
            .map(|k| {
                serde_json::json!({
                    "source": k.source.to_string(),
                    "target": k.target.to_string(),
                    "strategy": converter.registry().resolve(k).map(|s| s.to_string()),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise formats")?
        );
        return Ok(());
    }

    println!("{:<22} {:<7} STRATEGY", "SOURCE", "TARGET");
    for key in pairs {
        let strategy = converter
            .registry()
            .resolve(key)
            .map(|s| s.to_string())
            .unwrap_or_default();
        println!("{:<22} {:<7} {}", key.source.to_string(), key.target.to_string(), strategy);
    }
    Ok(())
}
