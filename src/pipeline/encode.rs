//! Image encoding: `PixelBuffer` → PNG bytes, optionally base64-wrapped.
//!
//! Engines receive PNG because it is lossless; JPEG artefacts around thin
//! pen strokes are read as extra ink. Grayscale buffers are written as 8-bit
//! luma PNGs, RGBA buffers as 8-bit RGBA.

use crate::buffer::PixelBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use tracing::debug;

/// Encode a buffer as PNG bytes.
pub fn encode_png(buf: &PixelBuffer) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    buf.to_image()
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} buffer → {} bytes PNG",
        buf.width(),
        buf.height(),
        out.len()
    );
    Ok(out)
}

/// Encode a buffer as a base64 PNG string, the form JSON engines accept.
pub fn encode_png_base64(buf: &PixelBuffer) -> Result<String, image::ImageError> {
    let png = encode_png(buf)?;
    Ok(STANDARD.encode(&png))
}

/// [`encode_png`] on the blocking pool, so adapters do not stall the
/// executor on large pages.
pub async fn encode_png_async(buf: &PixelBuffer) -> Result<Vec<u8>, String> {
    let owned = buf.clone();
    tokio::task::spawn_blocking(move || encode_png(&owned))
        .await
        .map_err(|e| format!("encode task failed: {e}"))?
        .map_err(|e| e.to_string())
}

/// [`encode_png_base64`] on the blocking pool.
pub async fn encode_png_base64_async(buf: &PixelBuffer) -> Result<String, String> {
    let png = encode_png_async(buf).await?;
    Ok(STANDARD.encode(&png))
}
