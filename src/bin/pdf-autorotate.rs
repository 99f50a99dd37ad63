//! CLI binary for pdf-autorotate.
//!
//! A thin shim over the library crate that merges the config file with CLI
//! flags into a `RotateConfig`, runs the batch and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_autorotate::config::find_default_config;
use pdf_autorotate::{
    run_batch, BatchProgressCallback, BatchStats, ConfigFile, FileReport, FileStatus,
    PageReport, ProgressCallback, RotateConfig, UndeterminedPolicy,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the files of the batch plus a
/// log line per finished file.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Scanning");
        bar.set_message("looking for PDFs…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rotating");
        self.bar.reset_eta();
    }

    fn on_file_start(&self, _index: usize, _total_files: usize, input: &Path) {
        self.bar.set_message(file_name(input));
    }

    fn on_page_detected(&self, _index: usize, page: &PageReport) {
        self.bar.set_message(format!("page {}", page.page_num));
    }

    fn on_file_complete(&self, index: usize, total_files: usize, report: &FileReport) {
        let rotated = report.pages.iter().filter(|p| p.is_rotated()).count();
        let (mark, detail) = match report.status {
            FileStatus::Succeeded => (
                green("✓"),
                dim(&format!("{rotated}/{} pages rotated", report.pages.len())),
            ),
            FileStatus::Partial => {
                let failed = report.pages.iter().filter(|p| p.error.is_some()).count();
                (
                    yellow("⚠"),
                    yellow(&format!(
                        "{rotated}/{} pages rotated, {failed} undetected",
                        report.pages.len()
                    )),
                )
            }
            FileStatus::Failed => (
                red("✗"),
                red(&truncate(report.error.as_deref().unwrap_or("failed"), 80)),
            ),
        };

        self.bar.println(format!(
            "  {} [{:>3}/{:<3}] {}  {}  {}",
            mark,
            index + 1,
            total_files,
            file_name(&report.input),
            detail,
            dim(&format!("{:.1}s", report.duration_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _stats: &BatchStats) {
        self.bar.finish_and_clear();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        first_line.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run with ./config.toml
  pdf-autorotate

  # Explicit folders, credentials from the environment
  export PDF_AUTOROTATE_API_KEY=...  PDF_AUTOROTATE_SECRET_KEY=...
  pdf-autorotate --input-folder scans --output-folder corrected

  # Walk sub-folders, three files at a time
  pdf-autorotate --recursive --concurrency 3

  # Refuse to write files with unreadable pages; JSON report on stdout
  pdf-autorotate --on-undetermined fail-file --json > report.json

CONFIG FILE (config.toml):
  api_key       = "..."
  secret_key    = "..."
  input_folder  = "scans"
  output_folder = "output"      # default: <parent of input_folder>/output
  debug         = false         # verbose logs + page PNGs in debug_dir

  Without --config, ./config.yaml is used when ./config.toml is absent.
  Files ending in .yaml/.yml are read as YAML, .json as JSON, same keys.

PDFIUM:
  Pages are rasterised with pdfium. The system library is used unless
  `pdfium_lib_path` in the config file names the folder that contains it.
"#;

/// Detect and fix the page orientation of every PDF in a folder.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-autorotate",
    version,
    about = "Detect and fix the page orientation of every PDF in a folder",
    long_about = "Rasterises each page of each PDF in the input folder, asks the Baidu OCR \
service which way the page is turned, and writes a copy with corrected page rotation to the \
output folder. Input files are never modified.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Config file (TOML, or YAML/JSON by extension). Default: ./config.toml, then ./config.yaml
    #[arg(short = 'C', long, env = "PDF_AUTOROTATE_CONFIG")]
    config: Option<PathBuf>,

    /// OCR API key.
    #[arg(long, env = "PDF_AUTOROTATE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR secret key.
    #[arg(long, env = "PDF_AUTOROTATE_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Folder containing the PDFs to correct.
    #[arg(short, long, env = "PDF_AUTOROTATE_INPUT_FOLDER")]
    input_folder: Option<PathBuf>,

    /// Folder receiving corrected PDFs.
    #[arg(short, long, env = "PDF_AUTOROTATE_OUTPUT_FOLDER")]
    output_folder: Option<PathBuf>,

    /// DEBUG-level logs and per-page PNG dumps.
    #[arg(short, long, env = "PDF_AUTOROTATE_DEBUG")]
    debug: bool,

    /// Also process PDFs in sub-folders.
    #[arg(short, long, env = "PDF_AUTOROTATE_RECURSIVE")]
    recursive: bool,

    /// Number of files processed at once.
    #[arg(short, long, env = "PDF_AUTOROTATE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Retries per page after a transient OCR failure.
    #[arg(long, env = "PDF_AUTOROTATE_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// What to do with pages whose orientation cannot be determined.
    #[arg(long, env = "PDF_AUTOROTATE_ON_UNDETERMINED", value_enum)]
    on_undetermined: Option<UndeterminedArg>,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "PDF_AUTOROTATE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_AUTOROTATE_NO_PROGRESS")]
    no_progress: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_AUTOROTATE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum UndeterminedArg {
    PassThrough,
    FailFile,
}

impl From<UndeterminedArg> for UndeterminedPolicy {
    fn from(v: UndeterminedArg) -> Self {
        match v {
            UndeterminedArg::PassThrough => UndeterminedPolicy::PassThrough,
            UndeterminedArg::FailFile => UndeterminedPolicy::FailFile,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let mut config = build_config(&cli)?;

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let filter = if config.debug {
        "debug"
    } else if cli.quiet || show_progress {
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

    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        config.progress_callback = Some(cb);
    }

    let report = run_batch(&config).await.context("Batch failed to start")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        let s = &report.stats;
        let mark = if report.is_clean() {
            green("✔")
        } else if s.failed == s.total_files && s.total_files > 0 {
            red("✘")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{}  {} files: {} ok, {} partial, {} failed  {}ms  →  {}",
            mark,
            s.total_files,
            s.succeeded,
            s.partial,
            s.failed,
            s.total_duration_ms,
            bold(&config.output_folder().display().to_string()),
        );
        eprintln!(
            "   {} of {} pages rotated, {} undetermined, {} undetected",
            dim(&s.rotated_pages.to_string()),
            s.total_pages,
            s.undetermined_pages,
            s.failed_pages,
        );
        if !show_progress {
            for file in report.files.iter().filter(|f| f.status == FileStatus::Failed) {
                eprintln!(
                    "  {} {}: {}",
                    red("✗"),
                    file.input.display(),
                    file.error.as_deref().unwrap_or("failed")
                );
            }
        }
    }

    Ok(())
}

/// Merge the config file and CLI flags into a `RotateConfig`.
///
/// A missing default config file is fine as long as flags and environment
/// supply what is needed; a missing explicitly named one is an error.
fn build_config(cli: &Cli) -> Result<RotateConfig> {
    let path = match cli.config {
        Some(ref p) => Some(p.clone()),
        None => find_default_config(Path::new(".")),
    };

    let file = match path {
        Some(path) => ConfigFile::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let mut builder = RotateConfig::builder().apply_file(file);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref key) = cli.secret_key {
        builder = builder.secret_key(key.clone());
    }
    if let Some(ref dir) = cli.input_folder {
        builder = builder.input_folder(dir.clone());
    }
    if let Some(ref dir) = cli.output_folder {
        builder = builder.output_folder(dir.clone());
    }
    if cli.debug {
        builder = builder.debug(true);
    }
    if cli.recursive {
        builder = builder.recursive(true);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(n) = cli.max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(policy) = cli.on_undetermined {
        builder = builder.on_undetermined(policy.into());
    }
    builder.build().context("Invalid configuration")
}
