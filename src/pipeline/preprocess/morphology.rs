//! 3×3 grayscale morphology.
//!
//! Dilation is a neighbourhood maximum and erosion a neighbourhood minimum,
//! so on dark-ink-on-light-paper images *close* fills pin-holes and drops
//! isolated dark specks, while *open* removes hairline bright artefacts.
//! The outermost ring of pixels is copied through unchanged.

use crate::buffer::PixelBuffer;
use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};

/// Morphological operation with a full 3×3 structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphOp {
    Dilate,
    Erode,
    /// Erode then dilate.
    Open,
    /// Dilate then erode.
    Close,
}

pub fn apply(buf: &PixelBuffer, op: MorphOp) -> Result<PixelBuffer, PreprocessError> {
    match op {
        MorphOp::Dilate => dilate(buf),
        MorphOp::Erode => erode(buf),
        MorphOp::Open => erode(buf).and_then(|b| dilate(&b)),
        MorphOp::Close => dilate(buf).and_then(|b| erode(&b)),
    }
}

pub fn dilate(buf: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    neighbourhood(buf, |acc, v| acc.max(v), 0)
}

pub fn erode(buf: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    neighbourhood(buf, |acc, v| acc.min(v), 255)
}

fn neighbourhood(
    buf: &PixelBuffer,
    fold: impl Fn(u8, u8) -> u8,
    init: u8,
) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    let mut out = buf.clone();
    let (w, h) = (buf.width(), buf.height());
    if w < 3 || h < 3 {
        return Ok(out);
    }
    let color = buf.layout().color_channels();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            for c in 0..color {
                let mut acc = init;
                for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        acc = fold(acc, buf.get(nx, ny, c));
                    }
                }
                out.set(x, y, c, acc);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_removes_isolated_dark_speck() {
        let mut buf = PixelBuffer::from_fn_gray(7, 7, |_, _| 255);
        buf.set(3, 3, 0, 0);
        let out = apply(&buf, MorphOp::Close).unwrap();
        assert!(out.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn open_removes_thin_bright_line() {
        let buf = PixelBuffer::from_fn_gray(9, 9, |x, _| if x == 4 { 255 } else { 0 });
        let out = apply(&buf, MorphOp::Open).unwrap();
        for y in 1..8 {
            assert_eq!(out.get(4, y, 0), 0, "row {y}");
        }
    }

    #[test]
    fn open_keeps_thick_block() {
        let buf = PixelBuffer::from_fn_gray(9, 9, |x, y| {
            if (2..=6).contains(&x) && (2..=6).contains(&y) {
                255
            } else {
                0
            }
        });
        let out = apply(&buf, MorphOp::Open).unwrap();
        assert_eq!(out.get(4, 4, 0), 255);
        assert_eq!(out.get(2, 2, 0), 255);
    }

    #[test]
    fn border_ring_is_untouched() {
        let mut buf = PixelBuffer::from_fn_gray(5, 5, |_, _| 255);
        buf.set(0, 0, 0, 0);
        buf.set(1, 1, 0, 0);
        let out = dilate(&buf).unwrap();
        assert_eq!(out.get(0, 0, 0), 0);
        assert_eq!(out.get(1, 1, 0), 255);

        let out = erode(&buf).unwrap();
        assert_eq!(out.get(4, 4, 0), 255);
        assert_eq!(out.get(2, 2, 0), 0);
    }

    #[test]
    fn tiny_buffer_passes_through() {
        let buf = PixelBuffer::from_fn_gray(2, 2, |x, _| (x * 100) as u8);
        assert_eq!(dilate(&buf).unwrap(), buf);
    }
}
