//! Geometric transforms: rotation onto an enlarged canvas and resampling.

use crate::buffer::PixelBuffer;
use crate::error::PreprocessError;
use image::imageops::FilterType;

/// Background written where the rotated image does not cover the canvas.
const BACKGROUND: u8 = 255;

/// Rotate `buf` by `degrees` about its centre.
///
/// The canvas grows to the rotated bounding box
/// (`w·|cos| + h·|sin|` by `w·|sin| + h·|cos|`, rounded up) so no ink is
/// clipped; uncovered area is white. Sampling is bilinear.
pub fn deskew(buf: &PixelBuffer, degrees: f32) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    if !degrees.is_finite() {
        return Err(PreprocessError::InvalidParameter {
            transform: "deskew",
            detail: format!("angle must be finite, got {degrees}"),
        });
    }
    if degrees == 0.0 {
        return Ok(buf.clone());
    }

    let rad = (degrees as f64).to_radians();
    let (sin, cos) = rad.sin_cos();
    let (w, h) = (buf.width() as f64, buf.height() as f64);
    let new_w = canvas_extent(w * cos.abs() + h * sin.abs());
    let new_h = canvas_extent(w * sin.abs() + h * cos.abs());

    let mut out = PixelBuffer::new(new_w, new_h, buf.layout(), BACKGROUND);
    let (src_cx, src_cy) = (w / 2.0, h / 2.0);
    let (dst_cx, dst_cy) = (new_w as f64 / 2.0, new_h as f64 / 2.0);
    let color = buf.layout().color_channels();

    for y in 0..new_h {
        for x in 0..new_w {
            let dx = x as f64 + 0.5 - dst_cx;
            let dy = y as f64 + 0.5 - dst_cy;
            // Inverse rotation: destination → source.
            let sx = cos * dx + sin * dy + src_cx;
            let sy = -sin * dx + cos * dy + src_cy;
            for c in 0..color {
                out.set(x, y, c, bilinear(buf, sx, sy, c));
            }
        }
    }
    Ok(out)
}

/// Resize by `factor` with Catmull-Rom (bicubic) interpolation.
///
/// A factor of exactly 1.0 returns an unchanged copy.
pub fn scale(buf: &PixelBuffer, factor: f32) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    let (new_w, new_h) = scaled_size(buf.width(), buf.height(), factor)?;
    if factor == 1.0 {
        return Ok(buf.clone());
    }

    let resized = buf
        .to_image()
        .resize_exact(new_w, new_h, FilterType::CatmullRom);
    Ok(PixelBuffer::from_image(&resized))
}

/// Output dimensions of [`scale`] for a `width`x`height` source, computed
/// without touching pixels.
pub fn scaled_size(width: u32, height: u32, factor: f32) -> Result<(u32, u32), PreprocessError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(PreprocessError::InvalidParameter {
            transform: "scale",
            detail: format!("factor must be positive and finite, got {factor}"),
        });
    }
    if factor == 1.0 {
        return Ok((width, height));
    }
    let new_w = (width as f32 * factor).round() as u32;
    let new_h = (height as f32 * factor).round() as u32;
    if new_w == 0 || new_h == 0 {
        return Err(PreprocessError::InvalidParameter {
            transform: "scale",
            detail: format!("factor {factor} collapses {width}x{height} to {new_w}x{new_h}"),
        });
    }
    Ok((new_w, new_h))
}

fn canvas_extent(v: f64) -> u32 {
    // Shave float noise so an exact integer extent is not rounded up.
    ((v - 1e-9).ceil() as u32).max(1)
}

/// Sample channel `c` at continuous coordinate `(u, v)`, where pixel `i`
/// covers `[i, i + 1)`. Outside samples read as background.
fn bilinear(buf: &PixelBuffer, u: f64, v: f64, c: usize) -> u8 {
    let fx = u - 0.5;
    let fy = v - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let ax = fx - x0;
    let ay = fy - y0;

    let fetch = |xi: f64, yi: f64| -> f64 {
        if xi < 0.0 || yi < 0.0 || xi >= buf.width() as f64 || yi >= buf.height() as f64 {
            BACKGROUND as f64
        } else {
            buf.get(xi as u32, yi as u32, c) as f64
        }
    };

    let top = fetch(x0, y0) * (1.0 - ax) + fetch(x0 + 1.0, y0) * ax;
    let bottom = fetch(x0, y0 + 1.0) * (1.0 - ax) + fetch(x0 + 1.0, y0 + 1.0) * ax;
    (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8
}
