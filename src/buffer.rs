//! Owned 2D sample grid every preprocessing transform operates on.
//!
//! A [`PixelBuffer`] is a flat `Vec<u8>` in row-major order with either one
//! (gray) or four (RGBA) interleaved channels. It deliberately exposes only
//! `get`/`set`-style access plus conversion to and from
//! [`image::DynamicImage`], so the transforms in
//! [`crate::pipeline::preprocess`] stay independent of any imaging backend.

use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage, RgbaImage};

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// One luminance sample per pixel.
    Gray,
    /// Red, green, blue, alpha.
    Rgba,
}

impl ChannelLayout {
    /// Samples per pixel.
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::Gray => 1,
            ChannelLayout::Rgba => 4,
        }
    }

    /// Channels that carry intensity (alpha excluded).
    pub fn color_channels(self) -> usize {
        match self {
            ChannelLayout::Gray => 1,
            ChannelLayout::Rgba => 3,
        }
    }
}

/// Mutable grayscale or RGBA raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A buffer of the given size with every sample set to `fill`.
    ///
    /// For RGBA buffers alpha is always initialised to 255.
    pub fn new(width: u32, height: u32, layout: ChannelLayout, fill: u8) -> Self {
        let len = width as usize * height as usize * layout.channels();
        let mut data = vec![fill; len];
        if layout == ChannelLayout::Rgba {
            for px in data.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Wrap existing samples, validating the length against the geometry.
    pub fn from_raw(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self, PreprocessError> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(PreprocessError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Build a gray buffer from a closure over coordinates. Handy for
    /// synthetic fixtures.
    pub fn from_fn_gray(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Self {
        let mut buf = Self::new(width, height, ChannelLayout::Gray, 0);
        for y in 0..height {
            for x in 0..width {
                buf.set(x, y, 0, f(x, y));
            }
        }
        buf
    }

    /// Convert a decoded image. Gray images stay single-channel, everything
    /// else becomes RGBA8.
    pub fn from_image(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Self {
                width: gray.width(),
                height: gray.height(),
                layout: ChannelLayout::Gray,
                data: gray.as_raw().clone(),
            },
            other => {
                let rgba = other.to_rgba8();
                Self {
                    width: rgba.width(),
                    height: rgba.height(),
                    layout: ChannelLayout::Rgba,
                    data: rgba.into_raw(),
                }
            }
        }
    }

    /// Convert back to an [`image::DynamicImage`] (used for resizing and
    /// engine encoding).
    pub fn to_image(&self) -> DynamicImage {
        let img = match self.layout {
            ChannelLayout::Gray => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            ChannelLayout::Rgba => RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgba8),
        };
        // Length is an invariant of every constructor.
        img.unwrap_or_else(|| DynamicImage::new_luma8(0, 0))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// `true` when the buffer has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw interleaved samples.
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Fail with [`PreprocessError::EmptyBuffer`] on a zero-area buffer.
    pub fn ensure_not_empty(&self) -> Result<(), PreprocessError> {
        if self.is_empty() {
            Err(PreprocessError::EmptyBuffer {
                width: self.width,
                height: self.height,
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn offset(&self, x: u32, y: u32, c: usize) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels() + c
    }

    /// Sample `c` of pixel `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32, c: usize) -> u8 {
        self.data[self.offset(x, y, c)]
    }

    /// Overwrite sample `c` of pixel `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, c: usize, value: u8) {
        let i = self.offset(x, y, c);
        self.data[i] = value;
    }

    /// Write `value` to every colour channel of `(x, y)`, leaving alpha alone.
    #[inline]
    pub fn set_gray(&mut self, x: u32, y: u32, value: u8) {
        for c in 0..self.layout.color_channels() {
            self.set(x, y, c, value);
        }
    }

    /// ITU-R BT.601 luma of `(x, y)`.
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        match self.layout {
            ChannelLayout::Gray => self.get(x, y, 0),
            ChannelLayout::Rgba => {
                let r = self.get(x, y, 0) as f32;
                let g = self.get(x, y, 1) as f32;
                let b = self.get(x, y, 2) as f32;
                (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
            }
        }
    }

    /// Apply `f` to every colour sample in place.
    pub fn map_color_samples(&mut self, f: impl Fn(u8) -> u8) {
        let channels = self.channels();
        let color = self.layout.color_channels();
        for px in self.data.chunks_exact_mut(channels) {
            for s in px.iter_mut().take(color) {
                *s = f(*s);
            }
        }
    }

    /// Mean luma over the whole buffer; `None` for an empty buffer.
    pub fn mean_luma(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let mut sum = 0u64;
        for y in 0..self.height {
            for x in 0..self.width {
                sum += self.luma(x, y) as u64;
            }
        }
        Some(sum as f64 / (self.width as u64 * self.height as u64) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    #[test]
    fn new_rgba_has_opaque_alpha() {
        let buf = PixelBuffer::new(3, 2, ChannelLayout::Rgba, 10);
        assert_eq!(buf.as_raw().len(), 24);
        assert_eq!(buf.get(2, 1, 3), 255);
        assert_eq!(buf.get(2, 1, 0), 10);
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, ChannelLayout::Gray, vec![0; 3]).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::SizeMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn image_conversion_preserves_layout() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 3, Luma([77])));
        let buf = PixelBuffer::from_image(&gray);
        assert_eq!(buf.layout(), ChannelLayout::Gray);
        assert_eq!(buf.get(3, 2, 0), 77);
        assert_eq!(buf.to_image().to_luma8().get_pixel(0, 0).0, [77]);

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        let buf = PixelBuffer::from_image(&rgba);
        assert_eq!(buf.layout(), ChannelLayout::Rgba);
        assert_eq!(buf.luma(0, 0), 76);
    }

    #[test]
    fn set_gray_leaves_alpha() {
        let mut buf = PixelBuffer::new(1, 1, ChannelLayout::Rgba, 0);
        buf.set_gray(0, 0, 200);
        assert_eq!(&buf.as_raw()[..], &[200, 200, 200, 255]);
    }

    #[test]
    fn mean_luma_of_empty_is_none() {
        let buf = PixelBuffer::new(0, 5, ChannelLayout::Gray, 0);
        assert!(buf.is_empty());
        assert!(buf.mean_luma().is_none());
        assert!(buf.ensure_not_empty().is_err());
    }
}
