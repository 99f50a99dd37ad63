//! Report types for a batch run.
//!
//! Everything here is `Serialize` so the CLI can print the whole
//! [`BatchReport`] with `--json` and library callers can persist it.

use crate::error::PageError;
use crate::oracle::{Orientation, Rotation};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Every page was classified and the output was written.
    Succeeded,
    /// Output was written, but at least one page could not be classified
    /// and was passed through unrotated.
    Partial,
    /// No output was written for this file.
    Failed,
}

/// Result of detecting and correcting a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    /// What the oracle said, or None if every attempt failed.
    pub orientation: Option<Orientation>,
    /// Clockwise correction added to the page.
    pub applied: Rotation,
    /// Oracle calls made for this page.
    pub attempts: u32,
    /// Wall-clock time spent on this page in milliseconds.
    pub duration_ms: u64,
    /// Set when detection failed after retries.
    pub error: Option<PageError>,
}

impl PageReport {
    pub fn is_undetermined(&self) -> bool {
        self.orientation == Some(Orientation::Undetermined)
    }

    pub fn is_rotated(&self) -> bool {
        !self.applied.is_identity()
    }
}

/// Result of processing one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    /// Where the corrected copy was written; None when the file failed.
    pub output: Option<PathBuf>,
    pub status: FileStatus,
    /// One entry per page that reached detection, in page order.
    pub pages: Vec<PageReport>,
    /// Why the file failed.
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl FileReport {
    /// A file that failed before or during processing.
    pub fn failed(input: PathBuf, error: impl ToString, pages: Vec<PageReport>, duration_ms: u64) -> Self {
        Self {
            input,
            output: None,
            status: FileStatus::Failed,
            pages,
            error: Some(error.to_string()),
            duration_ms,
        }
    }
}

/// Aggregate counters for a batch run.
///
/// Page counters cover written files only; pages of a
/// [`FileStatus::Failed`] file appear in its [`FileReport`] but not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub total_pages: usize,
    /// Pages that received a non-zero correction.
    pub rotated_pages: usize,
    /// Pages the oracle answered but could not classify.
    pub undetermined_pages: usize,
    /// Pages whose detection failed after retries.
    pub failed_pages: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    /// Tally the counters over a set of file reports.
    pub fn from_files(files: &[FileReport], total_duration_ms: u64) -> Self {
        let mut stats = Self {
            total_files: files.len(),
            total_duration_ms,
            ..Default::default()
        };
        for file in files {
            match file.status {
                FileStatus::Succeeded => stats.succeeded += 1,
                FileStatus::Partial => stats.partial += 1,
                FileStatus::Failed => {
                    // Nothing was written, so none of its pages were corrected.
                    stats.failed += 1;
                    continue;
                }
            }
            stats.total_pages += file.pages.len();
            for page in &file.pages {
                if page.is_rotated() {
                    stats.rotated_pages += 1;
                }
                if page.is_undetermined() {
                    stats.undetermined_pages += 1;
                }
                if page.error.is_some() {
                    stats.failed_pages += 1;
                }
            }
        }
        stats
    }
}

/// Everything a batch run produced, files in discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn new(files: Vec<FileReport>, total_duration_ms: u64) -> Self {
        let stats = BatchStats::from_files(&files, total_duration_ms);
        Self { files, stats }
    }

    /// True when every file succeeded outright.
    pub fn is_clean(&self) -> bool {
        self.stats.succeeded == self.stats.total_files
    }
}
