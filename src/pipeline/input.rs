//! Input resolution: turn a user-supplied path or URL into image bytes, and
//! image bytes into a [`PixelBuffer`].
//!
//! Image dimensions are read from the header before the pixels are decoded,
//! so an oversized upload is rejected with [`OcrError::ImageTooLarge`]
//! without allocating its full raster.

use crate::buffer::PixelBuffer;
use crate::error::OcrError;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read the image bytes behind a local path or an HTTP(S) URL.
pub async fn load_bytes(input: &str, timeout_secs: u64) -> Result<Vec<u8>, OcrError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, OcrError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(OcrError::PermissionDenied { path })
        }
        Err(_) => Err(OcrError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, OcrError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            OcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            OcrError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(OcrError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| OcrError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Decode image bytes, enforcing the pixel cap before the full decode.
pub fn decode(bytes: &[u8], max_pixels: u64) -> Result<PixelBuffer, OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::UnsupportedImage {
            detail: "input is empty".into(),
        });
    }

    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| OcrError::UnsupportedImage {
            detail: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| OcrError::UnsupportedImage {
            detail: e.to_string(),
        })?;
    check_pixel_cap(width, height, max_pixels)?;

    let img = image::load_from_memory(bytes).map_err(|e| OcrError::UnsupportedImage {
        detail: e.to_string(),
    })?;
    let buf = PixelBuffer::from_image(&img);
    if buf.is_empty() {
        return Err(OcrError::UnsupportedImage {
            detail: format!("image has no pixels ({width}x{height})"),
        });
    }
    debug!("Decoded {}x{} image ({:?})", width, height, buf.layout());
    Ok(buf)
}

fn check_pixel_cap(width: u32, height: u32, limit: u64) -> Result<(), OcrError> {
    let pixels = width as u64 * height as u64;
    if pixels > limit {
        return Err(OcrError::ImageTooLarge {
            width,
            height,
            pixels,
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_png;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/chart.png"));
        assert!(is_url("http://example.com/chart.png"));
        assert!(!is_url("/tmp/chart.png"));
        assert!(!is_url("chart.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn decode_png() {
        let src = PixelBuffer::from_fn_gray(12, 5, |x, y| (x * 10 + y) as u8);
        let png = encode_png(&src).unwrap();
        let buf = decode(&png, 1_000).unwrap();
        assert_eq!(buf, src);
    }

    #[test]
    fn decode_rejects_oversized_images() {
        let src = PixelBuffer::from_fn_gray(20, 10, |_, _| 255);
        let png = encode_png(&src).unwrap();
        match decode(&png, 199) {
            Err(OcrError::ImageTooLarge { pixels, limit, .. }) => {
                assert_eq!(pixels, 200);
                assert_eq!(limit, 199);
            }
            other => panic!("expected ImageTooLarge, got {other:?}"),
        }
        assert!(decode(&png, 200).is_ok());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode(b"", 100),
            Err(OcrError::UnsupportedImage { .. })
        ));
        assert!(matches!(
            decode(b"definitely not an image", 100),
            Err(OcrError::UnsupportedImage { .. })
        ));
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = load_bytes("/nonexistent/scan.png", 5).await.unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"bytes").unwrap();
        let bytes = load_bytes(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(bytes, b"bytes");
    }
}
