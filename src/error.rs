//! Error types for the pdf-autorotate library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`AutoRotateError`]: a run or a single file cannot proceed. Its
//!   [`kind`](AutoRotateError::kind) says which: configuration errors abort the
//!   whole batch before any file is touched, document errors fail one file and
//!   the batch moves on.
//!
//! * [`OracleError`]: one call to the orientation service failed. The
//!   pipeline retries transient ones and, once it gives up, records a
//!   [`PageError`] and passes the page through unrotated.
//!
//! * [`PageError`]: the serialisable record of a page whose detection failed,
//!   stored in [`crate::report::PageReport`].

use std::path::PathBuf;
use thiserror::Error;

/// Broad class of an [`AutoRotateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid credentials, folders, or settings. Fatal.
    Configuration,
    /// One document could not be read, rasterised, or written.
    Document,
    /// Unexpected internal failure.
    Internal,
}

/// Fatal and per-file errors returned by the pdf-autorotate library.
#[derive(Debug, Error)]
pub enum AutoRotateError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The named configuration file does not exist.
    #[error("Config file not found: '{path}'")]
    ConfigNotFound { path: PathBuf },

    /// The configuration file exists but could not be read or parsed.
    #[error("Failed to load config '{path}': {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    /// A required credential is absent.
    #[error("Missing required setting '{field}'\nSet it in the config file, with --{flag}, or via {env}.")]
    MissingSetting {
        field: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    /// The input folder does not exist or is not a directory.
    #[error("Input folder not found: '{path}'")]
    InputFolderNotFound { path: PathBuf },

    /// Builder or file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// The input file could not be opened.
    #[error("Cannot open '{path}': {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PDF structure is corrupt or encrypted and cannot be parsed.
    #[error("PDF '{path}' is corrupt or unreadable: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for '{path}' page {page}: {detail}")]
    RasterisationFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or set `pdfium_lib_path` to the directory that contains it."
    )]
    PdfiumBindingFailed(String),

    /// The writer saw a different number of pages than were detected.
    #[error("Page count mismatch for '{path}': document has {actual} pages, {expected} were processed")]
    PageCountMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// `UndeterminedPolicy::FailFile` is active and some pages had no orientation.
    #[error("Orientation undetermined for '{path}' on page(s) {pages:?}")]
    UndeterminedOrientation { path: PathBuf, pages: Vec<usize> },

    /// Could not create or write the corrected PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutoRotateError {
    /// Classify this error.
    ///
    /// Configuration errors stop a run before any file is touched. Document
    /// errors fail only the file they occurred in and are logged as warnings;
    /// anything else is logged as an error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutoRotateError::ConfigNotFound { .. }
            | AutoRotateError::ConfigParse { .. }
            | AutoRotateError::MissingSetting { .. }
            | AutoRotateError::InputFolderNotFound { .. }
            | AutoRotateError::InvalidConfig(_) => ErrorKind::Configuration,
            AutoRotateError::NotAPdf { .. }
            | AutoRotateError::OpenFailed { .. }
            | AutoRotateError::CorruptPdf { .. }
            | AutoRotateError::RasterisationFailed { .. }
            | AutoRotateError::PdfiumBindingFailed(_)
            | AutoRotateError::PageCountMismatch { .. }
            | AutoRotateError::UndeterminedOrientation { .. }
            | AutoRotateError::OutputWriteFailed { .. } => ErrorKind::Document,
            AutoRotateError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A failed call to the orientation service.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// Connection, DNS, or TLS failure.
    #[error("HTTP request failed: {detail}")]
    Http { detail: String },

    /// The call did not complete in time.
    #[error("Oracle call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Non-success HTTP status.
    #[error("Oracle returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The token endpoint rejected the key pair.
    #[error("Access token request rejected: {detail}\nCheck api_key and secret_key.")]
    TokenRequest { detail: String },

    /// The cached access token was rejected; a fresh one is fetched next call.
    #[error("Access token invalid or expired (code {code})")]
    TokenExpired { code: i64 },

    /// The service throttled the request.
    #[error("Rate limited by oracle: {detail}")]
    RateLimited { detail: String },

    /// Every configured endpoint answered without a direction.
    #[error("No OCR endpoint available after trying {tried}: last error {last_code:?} {last_message}")]
    NoEndpointAvailable {
        tried: usize,
        last_code: Option<i64>,
        last_message: String,
        /// Whether every failure looked server-side (worth retrying later).
        transient: bool,
    },

    /// The response body could not be understood.
    #[error("Malformed oracle response: {detail}")]
    MalformedResponse { detail: String },

    /// The page image could not be encoded for upload.
    #[error("Failed to encode page image: {detail}")]
    Encode { detail: String },
}

impl OracleError {
    /// Whether retrying the same call later can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Http { .. }
            | OracleError::Timeout { .. }
            | OracleError::TokenExpired { .. }
            | OracleError::RateLimited { .. } => true,
            OracleError::Status { status, .. } => *status == 429 || *status >= 500,
            OracleError::NoEndpointAvailable { transient, .. } => *transient,
            OracleError::TokenRequest { .. }
            | OracleError::MalformedResponse { .. }
            | OracleError::Encode { .. } => false,
        }
    }
}

/// A non-fatal error for a single page.
///
/// The page is passed through unrotated and the file is marked partial.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Detection failed after the retry policy gave up.
    #[error("Page {page}: orientation detection failed after {attempts} attempt(s): {detail}")]
    DetectionFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_setting_display_names_all_sources() {
        let e = AutoRotateError::MissingSetting {
            field: "api_key",
            flag: "api-key",
            env: "PDF_AUTOROTATE_API_KEY",
        };
        let msg = e.to_string();
        assert!(msg.contains("api_key"), "got: {msg}");
        assert!(msg.contains("--api-key"), "got: {msg}");
        assert!(msg.contains("PDF_AUTOROTATE_API_KEY"), "got: {msg}");
    }

    #[test]
    fn kinds_split_configuration_from_document() {
        let cfg = AutoRotateError::InputFolderNotFound {
            path: "/nope".into(),
        };
        assert_eq!(cfg.kind(), ErrorKind::Configuration);

        let doc = AutoRotateError::NotAPdf {
            path: "b.pdf".into(),
            magic: b"junk".to_vec(),
        };
        assert_eq!(doc.kind(), ErrorKind::Document);

        let rejected = AutoRotateError::UndeterminedOrientation {
            path: "scan.pdf".into(),
            pages: vec![3],
        };
        assert_eq!(rejected.kind(), ErrorKind::Document);

        assert_eq!(
            AutoRotateError::Internal("x".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn page_count_mismatch_display() {
        let e = AutoRotateError::PageCountMismatch {
            path: "a.pdf".into(),
            expected: 2,
            actual: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("3 pages"), "got: {msg}");
        assert!(msg.contains("2 were processed"), "got: {msg}");
    }

    #[test]
    fn transient_classification() {
        assert!(OracleError::Timeout { secs: 5 }.is_transient());
        assert!(OracleError::RateLimited {
            detail: "qps".into()
        }
        .is_transient());
        assert!(OracleError::Status {
            status: 503,
            detail: String::new()
        }
        .is_transient());
        assert!(!OracleError::Status {
            status: 400,
            detail: String::new()
        }
        .is_transient());
        assert!(!OracleError::TokenRequest {
            detail: "invalid_client".into()
        }
        .is_transient());
        assert!(!OracleError::NoEndpointAvailable {
            tried: 6,
            last_code: Some(6),
            last_message: "no permission".into(),
            transient: false,
        }
        .is_transient());
    }

    #[test]
    fn page_error_display() {
        let e = PageError::DetectionFailed {
            page: 4,
            attempts: 3,
            detail: "timed out".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 4"));
        assert!(msg.contains("3 attempt"));
    }
}
