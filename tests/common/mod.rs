//! Shared fixtures for the integration tests: lopdf-generated PDFs, a
//! rasteriser that needs no pdfium, and a scripted oracle.

#![allow(dead_code)]

use async_trait::async_trait;
use image::DynamicImage;
use lopdf::{dictionary, Document, Object, Stream};
use pdf_autorotate::pipeline::write::effective_rotation;
use pdf_autorotate::{
    AutoRotateError, OracleError, Orientation, OrientationOracle, PageImage, PageRasterizer,
    RenderOptions, Rotation, RotateConfig,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use tracing_subscriber::EnvFilter;

/// Send library logs to the test harness's captured output, once per binary.
///
/// `RUST_LOG` overrides the default `debug` level.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Write a PDF with `pages` blank A4 pages.
pub fn make_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for i in 0..pages {
        let content = format!("BT /F1 12 Tf 72 720 Td (page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    doc.save(path).unwrap();
}

/// Effective `/Rotate` of every page, in order.
pub fn page_rotations(path: &Path) -> Vec<u16> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| effective_rotation(&doc, id).degrees())
        .collect()
}

pub fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

/// Rasteriser that reads the page count with lopdf and emits blank images.
pub struct BlankPageRasterizer;

impl PageRasterizer for BlankPageRasterizer {
    fn render_pages(
        &self,
        pdf_path: &Path,
        _options: &RenderOptions,
        emit: &mut dyn FnMut(PageImage) -> bool,
    ) -> Result<usize, AutoRotateError> {
        let doc = Document::load(pdf_path).map_err(|e| AutoRotateError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let total = doc.get_pages().len();
        for page_num in 1..=total {
            let page = PageImage {
                source: pdf_path.to_path_buf(),
                page_num,
                image: DynamicImage::new_rgb8(32, 32),
            };
            if !emit(page) {
                break;
            }
        }
        Ok(total)
    }
}

#[derive(Clone)]
pub enum Reply {
    Answer(Orientation),
    Fail(OracleError),
}

/// Oracle answering from a script keyed by (file name, page number).
/// Unscripted pages are upright.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<HashMap<(String, usize), Reply>>,
    fail_everything: Option<OracleError>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `err`.
    pub fn always_failing(err: OracleError) -> Self {
        Self {
            fail_everything: Some(err),
            ..Self::default()
        }
    }

    pub fn with(self, file: &str, page: usize, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert((file.to_string(), page), reply);
        self
    }

    pub fn rotate(self, file: &str, page: usize, rotation: Rotation) -> Self {
        self.with(file, page, Reply::Answer(Orientation::Detected(rotation)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrientationOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn detect(&self, page: &PageImage) -> Result<Orientation, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref err) = self.fail_everything {
            return Err(err.clone());
        }
        let file = page
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reply = self
            .script
            .lock()
            .unwrap()
            .get(&(file, page.page_num))
            .cloned();
        match reply {
            Some(Reply::Answer(o)) => Ok(o),
            Some(Reply::Fail(e)) => Err(e),
            None => Ok(Orientation::Detected(Rotation::Deg0)),
        }
    }
}

/// Input and output folders inside a fresh temp dir.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir_all(&input).unwrap();
        Self { dir, input, output }
    }

    /// Fast, deterministic settings: no backoff, short timeout.
    pub fn config(&self) -> pdf_autorotate::RotateConfigBuilder {
        RotateConfig::builder()
            .input_folder(&self.input)
            .output_folder(&self.output)
            .max_retries(2)
            .retry_backoff_ms(0)
            .max_backoff_ms(0)
            .api_timeout_secs(5)
    }
}
