//! Progress-callback trait for batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::RotateConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the input folder.
//!
//! Callers can forward events to a channel, a log, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` so it works when files are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use pdf_autorotate::{BatchProgressCallback, FileReport, RotateConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     files_done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total_files: usize, report: &FileReport) {
//!         self.files_done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {:?}", index + 1, total_files, report.status);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { files_done: AtomicUsize::new(0) });
//!
//! let config = RotateConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::report::{BatchStats, FileReport, PageReport};
use std::path::Path;
use std::sync::Arc;

/// Called by the batch pipeline as it processes files and pages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1`, events for different files may arrive
/// concurrently from different tasks. Protect shared mutable state with
/// `Mutex` or atomics.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before any file is processed.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when work on a file begins.
    ///
    /// # Arguments
    /// * `index`      : 0-indexed position in discovery order
    /// * `total_files`: number of files in the batch
    /// * `input`      : path of the file
    fn on_file_start(&self, index: usize, total_files: usize, input: &Path) {
        let _ = (index, total_files, input);
    }

    /// Called after each page's orientation has been decided.
    fn on_page_detected(&self, index: usize, page: &PageReport) {
        let _ = (index, page);
    }

    /// Called when a file has been written or has failed.
    fn on_file_complete(&self, index: usize, total_files: usize, report: &FileReport) {
        let _ = (index, total_files, report);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that want to pass a callback but
/// ignore its events.
///
/// Not needed otherwise: [`crate::config::RotateConfig::progress_callback`]
/// defaults to `None` and the pipeline then emits no events at all.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RotateConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FileStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        batch_total: AtomicUsize,
        file_starts: AtomicUsize,
        pages: AtomicUsize,
        failed_files: AtomicUsize,
        finished_files: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.batch_total.store(total_files, Ordering::SeqCst);
        }

        fn on_file_start(&self, _index: usize, _total_files: usize, _input: &Path) {
            self.file_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_detected(&self, _index: usize, _page: &PageReport) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _index: usize, _total_files: usize, report: &FileReport) {
            if report.status == FileStatus::Failed {
                self.failed_files.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_batch_complete(&self, stats: &BatchStats) {
            self.finished_files.store(stats.total_files, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start(0, 2, Path::new("a.pdf"));
        cb.on_file_complete(0, 2, &FileReport::failed("a.pdf".into(), "x", vec![], 0));
        cb.on_batch_complete(&BatchStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(2);
        tracker.on_file_start(0, 2, Path::new("a.pdf"));
        tracker.on_file_start(1, 2, Path::new("b.pdf"));
        tracker.on_file_complete(1, 2, &FileReport::failed("b.pdf".into(), "not a PDF", vec![], 1));
        tracker.on_batch_complete(&BatchStats {
            total_files: 2,
            ..Default::default()
        });

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.file_starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.failed_files.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.finished_files.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_file_start(0, 10, Path::new("x.pdf"));
    }
}
