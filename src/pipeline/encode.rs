//! Image encoding: `DynamicImage` → the bytes the oracle and debug dumps want.
//!
//! The OCR service takes a base64 JPEG in a form field. JPEG is chosen over
//! PNG because the upload limit is 4 MB of base64 and orientation detection
//! does not care about compression artefacts. Debug dumps are PNG so what you
//! inspect is exactly what was rasterised.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 JPEG for upload.
///
/// JPEG has no alpha channel, so the image is flattened to RGB8 first.
pub fn encode_jpeg_base64(img: &DynamicImage, quality: u8) -> Result<String, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        rgb.width(),
        rgb.height(),
        b64.len()
    );
    Ok(b64)
}

/// Encode a page as PNG bytes for the debug dump.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
