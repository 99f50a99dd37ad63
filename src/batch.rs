//! Batch entry points: turn a folder of PDFs into a folder of corrected PDFs.
//!
//! [`BatchPipeline`] owns the two collaborators the run needs, an
//! [`OrientationOracle`] and a [`PageRasterizer`], so tests can inject fakes
//! and production code gets Baidu + pdfium via [`BatchPipeline::from_config`].
//!
//! One bad file never aborts the batch: document errors become a `Failed`
//! [`FileReport`] and processing moves on. Only configuration errors (missing
//! input folder, output == input, missing credentials) return `Err`.

use crate::config::{RotateConfig, UndeterminedPolicy};
use crate::error::{AutoRotateError, ErrorKind};
use crate::oracle::baidu::BaiduOracle;
use crate::oracle::OrientationOracle;
use crate::pipeline::detect::detect_page;
use crate::pipeline::discover::{check_pdf_magic, discover_jobs, Job};
use crate::pipeline::render::{spawn_render, PageImage, PageRasterizer, PdfiumRasterizer, RenderOptions};
use crate::pipeline::{encode, write};
use crate::report::{BatchReport, FileReport, FileStatus, PageReport};
use crate::retry::RetryPolicy;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run a batch with the production oracle and rasteriser.
///
/// # Returns
/// `Ok(BatchReport)` once every file has been attempted, even if some
/// failed (check `report.stats.failed`).
///
/// # Errors
/// Returns `Err(AutoRotateError)` only for configuration errors, before any
/// file is touched.
pub async fn run_batch(config: &RotateConfig) -> Result<BatchReport, AutoRotateError> {
    config.validate()?;
    BatchPipeline::from_config(config.clone())?.run().await
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(config: &RotateConfig) -> Result<BatchReport, AutoRotateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AutoRotateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config))
}

/// The batch driver.
pub struct BatchPipeline {
    config: RotateConfig,
    oracle: Arc<dyn OrientationOracle>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl BatchPipeline {
    pub fn new(
        config: RotateConfig,
        oracle: Arc<dyn OrientationOracle>,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        Self {
            config,
            oracle,
            rasterizer,
        }
    }

    /// Baidu oracle + pdfium rasteriser, both configured from `config`.
    pub fn from_config(config: RotateConfig) -> Result<Self, AutoRotateError> {
        let oracle = Arc::new(BaiduOracle::from_config(&config)?);
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(&config));
        Ok(Self::new(config, oracle, rasterizer))
    }

    /// Process every PDF in the input folder.
    pub async fn run(&self) -> Result<BatchReport, AutoRotateError> {
        let total_start = Instant::now();
        self.config.validate()?;

        let output_folder = self.config.output_folder();
        std::fs::create_dir_all(&output_folder).map_err(|e| {
            AutoRotateError::OutputWriteFailed {
                path: output_folder.clone(),
                source: e,
            }
        })?;

        let jobs = discover_jobs(
            &self.config.input_folder,
            &output_folder,
            self.config.recursive,
        )?;
        let total_files = jobs.len();
        info!(
            "Processing {} PDF(s) from {} into {}",
            total_files,
            self.config.input_folder.display(),
            output_folder.display()
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total_files);
        }

        let mut indexed: Vec<(usize, FileReport)> = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move {
                let report = self.process_file(index, total_files, &job).await;
                (index, report)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        // Files may finish out of order when concurrency > 1.
        indexed.sort_by_key(|(index, _)| *index);
        let files = indexed.into_iter().map(|(_, report)| report).collect();

        let report = BatchReport::new(files, total_start.elapsed().as_millis() as u64);
        let s = &report.stats;
        info!(
            "Batch complete: {} succeeded, {} partial, {} failed; {}/{} pages rotated, {}ms",
            s.succeeded, s.partial, s.failed, s.rotated_pages, s.total_pages, s.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(&report.stats);
        }
        Ok(report)
    }

    async fn process_file(&self, index: usize, total_files: usize, job: &Job) -> FileReport {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_start(index, total_files, &job.input);
        }

        let start = Instant::now();
        let mut pages = Vec::new();
        let report = match self.correct_file(index, job, &mut pages).await {
            Ok(status) => {
                info!("{}: {:?}", job.input.display(), status);
                FileReport {
                    input: job.input.clone(),
                    output: Some(job.output.clone()),
                    status,
                    pages,
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::Document => warn!("{}: {}", job.input.display(), e),
                    _ => error!("{}: {}", job.input.display(), e),
                }
                FileReport::failed(
                    job.input.clone(),
                    e,
                    pages,
                    start.elapsed().as_millis() as u64,
                )
            }
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_complete(index, total_files, &report);
        }
        report
    }

    /// Rasterise, detect, and write one file. Page reports are pushed into
    /// `pages` as they complete so a failed file still shows its progress.
    async fn correct_file(
        &self,
        index: usize,
        job: &Job,
        pages: &mut Vec<PageReport>,
    ) -> Result<FileStatus, AutoRotateError> {
        check_pdf_magic(&job.input)?;

        let policy = RetryPolicy::from_config(&self.config);
        let (mut rx, handle) = spawn_render(
            Arc::clone(&self.rasterizer),
            &job.input,
            RenderOptions::from_config(&self.config),
        );

        while let Some(page) = rx.recv().await {
            if self.config.debug {
                self.dump_page(&page).await;
            }
            let page_report =
                detect_page(&self.oracle, &page, policy, self.config.oracle_timeout_secs()).await;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_page_detected(index, &page_report);
            }
            pages.push(page_report);
        }

        let page_count = handle
            .await
            .map_err(|e| AutoRotateError::Internal(format!("render task panicked: {}", e)))??;
        debug!("{}: {} page(s) rendered", job.input.display(), page_count);

        if self.config.on_undetermined == UndeterminedPolicy::FailFile {
            let undetermined: Vec<usize> = pages
                .iter()
                .filter(|p| p.is_undetermined())
                .map(|p| p.page_num)
                .collect();
            if !undetermined.is_empty() {
                return Err(AutoRotateError::UndeterminedOrientation {
                    path: job.input.clone(),
                    pages: undetermined,
                });
            }
        }

        let corrections: Vec<_> = pages.iter().map(|p| p.applied).collect();
        let input = job.input.clone();
        let output = job.output.clone();
        let summary = tokio::task::spawn_blocking(move || {
            write::write_corrected(&input, &output, &corrections)
        })
        .await
        .map_err(|e| AutoRotateError::Internal(format!("write task panicked: {}", e)))??;
        debug!(
            "{}: {} of {} page(s) rotated",
            job.output.display(),
            summary.rotated,
            summary.pages
        );

        if pages.iter().any(|p| p.error.is_some()) {
            Ok(FileStatus::Partial)
        } else {
            Ok(FileStatus::Succeeded)
        }
    }

    /// Save a rasterised page under `<debug_dir>/<file stem>/page_<N>.png`.
    ///
    /// Failures are logged and otherwise ignored.
    async fn dump_page(&self, page: &PageImage) {
        let path = debug_dump_path(&self.config.debug_dir(), &page.source, page.page_num);
        let png = match encode::encode_png(&page.image) {
            Ok(png) => png,
            Err(e) => {
                warn!("Debug dump of page {} failed: {}", page.page_num, e);
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Cannot create {}: {}", parent.display(), e);
                return;
            }
        }
        match tokio::fs::write(&path, png).await {
            Ok(()) => debug!("Saved {}", path.display()),
            Err(e) => warn!("Cannot write {}: {}", path.display(), e),
        }
    }
}

/// Where debug mode saves a rasterised page.
pub fn debug_dump_path(debug_dir: &Path, source: &Path, page_num: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    debug_dir.join(stem).join(format!("page_{}.png", page_num))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_dump_path_uses_stem_and_page() {
        let p = debug_dump_path(Path::new("/tmp/dbg"), Path::new("/in/scan 01.pdf"), 3);
        assert_eq!(p, PathBuf::from("/tmp/dbg/scan 01/page_3.png"));
    }

    #[tokio::test]
    async fn run_batch_rejects_missing_input_folder() {
        let config = RotateConfig::builder()
            .api_key("ak")
            .secret_key("sk")
            .input_folder("/definitely/not/here")
            .build()
            .unwrap();
        let err = run_batch(&config).await.unwrap_err();
        assert!(matches!(err, AutoRotateError::InputFolderNotFound { .. }));
    }

    #[tokio::test]
    async fn run_batch_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = RotateConfig::builder()
            .input_folder(dir.path().join("in"))
            .build()
            .unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        let err = run_batch(&config).await.unwrap_err();
        assert!(matches!(err, AutoRotateError::MissingSetting { .. }));
    }
}
