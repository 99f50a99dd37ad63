//! PDF rasterisation: turn each page into a `DynamicImage` for the oracle.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`spawn_render`] runs the rasteriser on tokio's blocking pool and streams
//! pages back over a small bounded channel, so the async side can send page 1
//! to the oracle while page 2 is still rendering, and only a couple of page
//! images are alive at any time.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded and the upload inside
//! the oracle's 4096 px limit. Orientation detection needs far less detail
//! than text extraction.

use crate::config::RotateConfig;
use crate::error::AutoRotateError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Rasterised content of one page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// The PDF the page came from.
    pub source: PathBuf,
    /// 1-indexed page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Rasterisation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Longest edge in pixels.
    pub max_pixels: u32,
}

impl RenderOptions {
    pub fn from_config(config: &RotateConfig) -> Self {
        Self {
            max_pixels: config.max_rendered_pixels,
        }
    }
}

/// Rasterise every page of a PDF, in order.
///
/// `emit` is called once per page; when it returns `false` the consumer has
/// gone away and rendering should stop early. Returns the document's page
/// count.
pub trait PageRasterizer: Send + Sync {
    fn render_pages(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
        emit: &mut dyn FnMut(PageImage) -> bool,
    ) -> Result<usize, AutoRotateError>;
}

/// Start rasterising `pdf_path` on the blocking pool.
///
/// Pages arrive on the returned receiver; the join handle yields the page
/// count (or the error that stopped rendering) once the receiver is drained.
pub fn spawn_render(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf_path: &Path,
    options: RenderOptions,
) -> (
    mpsc::Receiver<PageImage>,
    JoinHandle<Result<usize, AutoRotateError>>,
) {
    let (tx, rx) = mpsc::channel(2);
    let path = pdf_path.to_path_buf();
    let handle = tokio::task::spawn_blocking(move || {
        rasterizer.render_pages(&path, &options, &mut |page| tx.blocking_send(page).is_ok())
    });
    (rx, handle)
}

/// Production rasteriser backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    /// Directory containing the pdfium shared library; None = system library.
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    pub fn from_config(config: &RotateConfig) -> Self {
        Self::new(config.pdfium_lib_path.clone())
    }

    fn bind(&self) -> Result<Pdfium, AutoRotateError> {
        let bindings = match self.library_dir {
            Some(ref dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| AutoRotateError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn render_pages(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
        emit: &mut dyn FnMut(PageImage) -> bool,
    ) -> Result<usize, AutoRotateError> {
        let pdfium = self.bind()?;

        let document =
            pdfium
                .load_pdf_from_file(pdf_path, None)
                .map_err(|e| AutoRotateError::CorruptPdf {
                    path: pdf_path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("{}: {} pages", pdf_path.display(), total_pages);

        let render_config = PdfRenderConfig::new()
            .set_target_width(options.max_pixels as i32)
            .set_maximum_height(options.max_pixels as i32);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                AutoRotateError::RasterisationFailed {
                    path: pdf_path.to_path_buf(),
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            let keep_going = emit(PageImage {
                source: pdf_path.to_path_buf(),
                page_num,
                image,
            });
            if !keep_going {
                debug!("Consumer dropped; stopping after page {}", page_num);
                break;
            }
        }

        Ok(total_pages)
    }
}
