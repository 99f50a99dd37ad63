//! # pdf-autorotate
//!
//! Batch-correct the page orientation of scanned PDFs.
//!
//! ## Why this crate?
//!
//! Scanners and phone apps routinely produce PDFs with pages upside down or
//! on their side. This crate rasterises every page, asks a cloud OCR service
//! which way the text runs, and writes a copy of each PDF with the page
//! `/Rotate` entries corrected. Only page metadata changes: text layers,
//! vector content and image quality are untouched.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input folder
//!  │
//!  ├─ 1. Discover  list *.pdf files (optionally recursive), check %PDF magic
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    page → base64 JPEG
//!  ├─ 4. Detect    ask the orientation oracle, with timeout and retry
//!  ├─ 5. Write     add corrections to /Rotate, save atomically (lopdf)
//!  └─ 6. Report    per-file status + batch stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_autorotate::{run_batch, Credentials, RotateConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RotateConfig::builder()
//!         .credentials(Credentials::new("api-key", "secret-key"))
//!         .input_folder("scans")
//!         .output_folder("corrected")
//!         .build()?;
//!     let report = run_batch(&config).await?;
//!     eprintln!(
//!         "{} ok, {} partial, {} failed",
//!         report.stats.succeeded, report.stats.partial, report.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-autorotate` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-autorotate = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, run_batch_sync, BatchPipeline};
pub use config::{
    ConfigFile, ConfigFormat, Credentials, RotateConfig, RotateConfigBuilder, UndeterminedPolicy,
};
pub use error::{AutoRotateError, ErrorKind, OracleError, PageError};
pub use oracle::{baidu::BaiduOracle, Orientation, OrientationOracle, Rotation};
pub use pipeline::render::{PageImage, PageRasterizer, PdfiumRasterizer, RenderOptions};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{BatchReport, BatchStats, FileReport, FileStatus, PageReport};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
