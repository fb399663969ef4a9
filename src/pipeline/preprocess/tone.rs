//! Per-pixel tone transforms.

use crate::buffer::{ChannelLayout, PixelBuffer};
use crate::error::PreprocessError;

/// Collapse to a single luma channel.
pub fn grayscale(buf: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    if buf.layout() == ChannelLayout::Gray {
        return Ok(buf.clone());
    }
    let mut out = PixelBuffer::new(buf.width(), buf.height(), ChannelLayout::Gray, 0);
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            out.set(x, y, 0, buf.luma(x, y));
        }
    }
    Ok(out)
}

/// Stretch around mid-gray: `(v − 128)·factor + 128`.
pub fn contrast(buf: &PixelBuffer, factor: f32) -> Result<PixelBuffer, PreprocessError> {
    check_factor("contrast", factor)?;
    buf.ensure_not_empty()?;
    let mut out = buf.clone();
    out.map_color_samples(|v| clamp_u8((v as f32 - 128.0) * factor + 128.0));
    Ok(out)
}

/// Multiplicative brightness: `v·factor`.
pub fn brightness(buf: &PixelBuffer, factor: f32) -> Result<PixelBuffer, PreprocessError> {
    check_factor("brightness", factor)?;
    buf.ensure_not_empty()?;
    let mut out = buf.clone();
    out.map_color_samples(|v| clamp_u8(v as f32 * factor));
    Ok(out)
}

/// Invert colour channels when the image is predominantly dark.
///
/// Light-on-dark scans (carbon copies, photographed screens) are flipped to
/// dark-on-light, which is what every later transform and the engine expect.
pub fn polarity_fix(buf: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    let mean = buf.mean_luma().ok_or(PreprocessError::EmptyBuffer {
        width: buf.width(),
        height: buf.height(),
    })?;
    let mut out = buf.clone();
    if mean < 128.0 {
        out.map_color_samples(|v| 255 - v);
    }
    Ok(out)
}

fn check_factor(transform: &'static str, factor: f32) -> Result<(), PreprocessError> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(())
    } else {
        Err(PreprocessError::InvalidParameter {
            transform,
            detail: format!("factor must be finite and non-negative, got {factor}"),
        })
    }
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_drops_to_one_channel() {
        let mut src = PixelBuffer::new(2, 1, ChannelLayout::Rgba, 0);
        src.set(1, 0, 1, 255);
        let out = grayscale(&src).unwrap();
        assert_eq!(out.layout(), ChannelLayout::Gray);
        assert_eq!(out.as_raw(), &[0, 150]);
    }

    #[test]
    fn contrast_pivots_on_mid_gray() {
        let src = PixelBuffer::from_fn_gray(3, 1, |x, _| [128, 100, 200][x as usize]);
        let out = contrast(&src, 2.0).unwrap();
        assert_eq!(out.as_raw(), &[128, 72, 255]);
    }

    #[test]
    fn brightness_scales_and_clamps() {
        let src = PixelBuffer::from_fn_gray(2, 1, |x, _| [100, 240][x as usize]);
        let out = brightness(&src, 1.1).unwrap();
        assert_eq!(out.as_raw(), &[110, 255]);
    }

    #[test]
    fn polarity_fix_inverts_dark_images_only() {
        let dark = PixelBuffer::from_fn_gray(4, 4, |x, _| if x == 0 { 250 } else { 10 });
        let fixed = polarity_fix(&dark).unwrap();
        assert_eq!(fixed.get(0, 0, 0), 5);
        assert_eq!(fixed.get(1, 0, 0), 245);

        let light = PixelBuffer::from_fn_gray(4, 4, |_, _| 200);
        assert_eq!(polarity_fix(&light).unwrap(), light);
    }

    #[test]
    fn polarity_fix_keeps_alpha() {
        let dark = PixelBuffer::new(2, 2, ChannelLayout::Rgba, 0);
        let fixed = polarity_fix(&dark).unwrap();
        assert_eq!(&fixed.as_raw()[..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn negative_factor_is_rejected() {
        let src = PixelBuffer::from_fn_gray(1, 1, |_, _| 0);
        assert!(contrast(&src, -1.0).is_err());
        assert!(brightness(&src, f32::NAN).is_err());
    }
}
