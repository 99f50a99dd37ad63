//! Configuration types for a batch orientation-correction run.
//!
//! All run behaviour is controlled through [`RotateConfig`], built via its
//! [`RotateConfigBuilder`]. Settings are layered: built-in defaults, then an
//! optional [`ConfigFile`] (TOML, YAML or JSON), then whatever the caller sets on the
//! builder afterwards (the CLI maps its flags there, so flags win over the
//! file).
//!
//! [`RotateConfigBuilder::build`] checks value ranges only.
//! [`RotateConfig::validate`] checks the file system (input folder exists,
//! output folder differs from it) and is called by the pipeline before any
//! file is touched. Credentials are checked by the oracle that needs them, so
//! a pipeline driven by a custom oracle needs none.

use crate::error::AutoRotateError;
use crate::oracle::baidu::{DEFAULT_API_BASE, DEFAULT_ENDPOINTS};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Config files looked up by the CLI when `--config` is not given, in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["config.toml", "config.yaml"];

/// The first of [`DEFAULT_CONFIG_FILES`] that exists in `dir`.
pub fn find_default_config(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Oracle key pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// What to do with a page whose orientation the oracle could not determine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndeterminedPolicy {
    /// Emit the page unrotated and keep going. (default)
    #[default]
    PassThrough,
    /// Fail the whole file; no output is written for it.
    FailFile,
}

/// Configuration for a batch run.
///
/// Built via [`RotateConfig::builder()`].
///
/// # Example
/// ```rust
/// use pdf_autorotate::{Credentials, RotateConfig, UndeterminedPolicy};
///
/// let config = RotateConfig::builder()
///     .credentials(Credentials::new("key", "secret"))
///     .input_folder("scans")
///     .max_retries(2)
///     .on_undetermined(UndeterminedPolicy::FailFile)
///     .build()
///     .unwrap();
/// assert_eq!(config.output_folder(), std::path::PathBuf::from("output"));
/// ```
#[derive(Clone)]
pub struct RotateConfig {
    /// Oracle key pair.
    pub credentials: Credentials,

    /// Folder scanned for `*.pdf` files.
    pub input_folder: PathBuf,

    /// Folder receiving corrected PDFs. If None, `<parent of input>/output`.
    pub output_folder: Option<PathBuf>,

    /// Verbose logging and per-page PNG dumps. Default: false.
    pub debug: bool,

    /// Root of the per-page PNG dumps. If None, `<tmp>/pdf-autorotate`.
    pub debug_dir: Option<PathBuf>,

    /// Walk sub-folders and mirror their layout in the output. Default: false.
    pub recursive: bool,

    /// Files processed at once. Default: 1 (strictly sequential).
    pub concurrency: usize,

    /// Retries per page after a transient oracle failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Upper bound on a single retry delay in milliseconds. Default: 8000.
    pub max_backoff_ms: u64,

    /// Timeout of a single HTTP request to the oracle, in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Timeout of one whole oracle call in seconds, covering the token fetch
    /// and every endpoint tried. If None, `api_timeout_secs × (endpoints + 1)`.
    pub oracle_timeout_secs: Option<u64>,

    /// Longest edge of a rasterised page in pixels. Default: 2000.
    ///
    /// The oracle rejects images whose longest side exceeds 4096 px or whose
    /// base64 payload exceeds 4 MB; 2000 px JPEGs stay well inside both.
    pub max_rendered_pixels: u32,

    /// JPEG quality used for upload (1–100). Default: 95.
    pub jpeg_quality: u8,

    /// OCR endpoints tried in order until one reports a direction.
    pub endpoints: Vec<String>,

    /// Oracle base URL. Default: `https://aip.baidubce.com`.
    pub api_base: String,

    /// Policy for undetermined pages. Default: [`UndeterminedPolicy::PassThrough`].
    pub on_undetermined: UndeterminedPolicy,

    /// Directory holding the pdfium shared library. If None, the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional batch/file/page event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            input_folder: PathBuf::new(),
            output_folder: None,
            debug: false,
            debug_dir: None,
            recursive: false,
            concurrency: 1,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_backoff_ms: 8_000,
            api_timeout_secs: 30,
            oracle_timeout_secs: None,
            max_rendered_pixels: 2000,
            jpeg_quality: 95,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            api_base: DEFAULT_API_BASE.to_string(),
            on_undetermined: UndeterminedPolicy::default(),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotateConfig")
            .field("credentials", &self.credentials)
            .field("input_folder", &self.input_folder)
            .field("output_folder", &self.output_folder)
            .field("debug", &self.debug)
            .field("recursive", &self.recursive)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("oracle_timeout_secs", &self.oracle_timeout_secs)
            .field("endpoints", &self.endpoints)
            .field("on_undetermined", &self.on_undetermined)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl RotateConfig {
    /// Create a new builder for `RotateConfig`.
    pub fn builder() -> RotateConfigBuilder {
        RotateConfigBuilder {
            config: Self::default(),
        }
    }

    /// The effective output folder.
    pub fn output_folder(&self) -> PathBuf {
        match self.output_folder {
            Some(ref p) => p.clone(),
            None => default_output_folder(&self.input_folder),
        }
    }

    /// The effective bound on one oracle call, in seconds.
    ///
    /// Large enough by default for the token request plus one request per
    /// endpoint, each hitting `api_timeout_secs`.
    pub fn oracle_timeout_secs(&self) -> u64 {
        self.oracle_timeout_secs.unwrap_or_else(|| {
            let requests = self.endpoints.len() as u64 + 1;
            self.api_timeout_secs.saturating_mul(requests)
        })
    }

    /// The effective debug dump root.
    pub fn debug_dir(&self) -> PathBuf {
        self.debug_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("pdf-autorotate"))
    }

    /// Check the folders before a run.
    ///
    /// The input folder must be an existing directory and the output folder
    /// must not be the input folder itself, since that would overwrite inputs.
    pub fn validate(&self) -> Result<(), AutoRotateError> {
        if self.input_folder.as_os_str().is_empty() {
            return Err(AutoRotateError::MissingSetting {
                field: "input_folder",
                flag: "input-folder",
                env: "PDF_AUTOROTATE_INPUT_FOLDER",
            });
        }
        if !self.input_folder.is_dir() {
            return Err(AutoRotateError::InputFolderNotFound {
                path: self.input_folder.clone(),
            });
        }

        let output = self.output_folder();
        if same_location(&self.input_folder, &output) {
            return Err(AutoRotateError::InvalidConfig(format!(
                "output folder '{}' is the input folder; inputs must never be overwritten",
                output.display()
            )));
        }
        Ok(())
    }
}

/// `<parent of input>/output`, matching where the corrected files land when
/// no output folder is configured.
pub fn default_output_folder(input_folder: &Path) -> PathBuf {
    input_folder
        .parent()
        .map(|p| p.join("output"))
        .unwrap_or_else(|| PathBuf::from("output"))
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Builder for [`RotateConfig`].
#[derive(Debug)]
pub struct RotateConfigBuilder {
    config: RotateConfig,
}

impl RotateConfigBuilder {
    /// Overlay every value present in a parsed config file.
    pub fn apply_file(mut self, file: ConfigFile) -> Self {
        let c = &mut self.config;
        if let Some(v) = file.api_key {
            c.credentials.api_key = v;
        }
        if let Some(v) = file.secret_key {
            c.credentials.secret_key = v;
        }
        if let Some(v) = file.input_folder {
            c.input_folder = v;
        }
        if let Some(v) = file.output_folder {
            c.output_folder = Some(v);
        }
        if let Some(v) = file.debug {
            c.debug = v;
        }
        if let Some(v) = file.debug_dir {
            c.debug_dir = Some(v);
        }
        if let Some(v) = file.recursive {
            c.recursive = v;
        }
        if let Some(v) = file.concurrency {
            c.concurrency = v;
        }
        if let Some(v) = file.max_retries {
            c.max_retries = v;
        }
        if let Some(v) = file.retry_backoff_ms {
            c.retry_backoff_ms = v;
        }
        if let Some(v) = file.max_backoff_ms {
            c.max_backoff_ms = v;
        }
        if let Some(v) = file.api_timeout_secs {
            c.api_timeout_secs = v;
        }
        if let Some(v) = file.oracle_timeout_secs {
            c.oracle_timeout_secs = Some(v);
        }
        if let Some(v) = file.max_rendered_pixels {
            c.max_rendered_pixels = v;
        }
        if let Some(v) = file.jpeg_quality {
            c.jpeg_quality = v;
        }
        if let Some(v) = file.endpoints {
            c.endpoints = v;
        }
        if let Some(v) = file.api_base {
            c.api_base = v;
        }
        if let Some(v) = file.on_undetermined {
            c.on_undetermined = v;
        }
        if let Some(v) = file.pdfium_lib_path {
            c.pdfium_lib_path = Some(v);
        }
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.credentials.api_key = key.into();
        self
    }

    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.config.credentials.secret_key = key.into();
        self
    }

    pub fn input_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_folder = path.into();
        self
    }

    pub fn output_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_folder = Some(path.into());
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn debug_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.debug_dir = Some(path.into());
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn oracle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.oracle_timeout_secs = Some(secs);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, 4096);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.api_base = url.into();
        self
    }

    pub fn on_undetermined(mut self, policy: UndeterminedPolicy) -> Self {
        self.config.on_undetermined = policy;
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating value constraints.
    pub fn build(self) -> Result<RotateConfig, AutoRotateError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(AutoRotateError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(AutoRotateError::InvalidConfig(format!(
                "jpeg_quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.max_rendered_pixels < 100 || c.max_rendered_pixels > 4096 {
            return Err(AutoRotateError::InvalidConfig(format!(
                "max_rendered_pixels must be 100–4096, got {}",
                c.max_rendered_pixels
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(AutoRotateError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.oracle_timeout_secs == Some(0) {
            return Err(AutoRotateError::InvalidConfig(
                "oracle_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.endpoints.is_empty() {
            return Err(AutoRotateError::InvalidConfig(
                "at least one OCR endpoint is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Config file ──────────────────────────────────────────────────────────

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension: `.json` is JSON, `.yaml` and
    /// `.yml` are YAML, anything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => ConfigFormat::Json,
            Some("yaml" | "yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }
}

/// On-disk settings. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub input_folder: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub debug: Option<bool>,
    pub debug_dir: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub api_timeout_secs: Option<u64>,
    pub oracle_timeout_secs: Option<u64>,
    pub max_rendered_pixels: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub endpoints: Option<Vec<String>>,
    pub api_base: Option<String>,
    pub on_undetermined: Option<UndeterminedPolicy>,
    pub pdfium_lib_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Load a config file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self, AutoRotateError> {
        if !path.exists() {
            return Err(AutoRotateError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| AutoRotateError::ConfigParse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Self::parse(&content, ConfigFormat::from_path(path)).map_err(|detail| {
            AutoRotateError::ConfigParse {
                path: path.to_path_buf(),
                detail,
            }
        })
    }

    /// Parse config content in the given format.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, String> {
        match format {
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| format!("invalid TOML: {e}"))
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {e}"))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))
            }
        }
    }
}
