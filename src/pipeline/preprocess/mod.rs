//! Composable pixel transforms applied before recognition.
//!
//! Every transform is a pure function `&PixelBuffer → PixelBuffer` (plus
//! parameters) and never assumes another transform ran first, so recipes in
//! [`crate::pipeline::strategy`] can chain them in any order.
//!
//! | Transform | Module |
//! |-----------|--------|
//! | Otsu + hysteresis binarisation, fixed threshold | [`threshold`] |
//! | Dilate / erode / open / close | [`morphology`] |
//! | Deskew rotation, scaling | [`geometry`] |
//! | Bilateral filter, CLAHE, sharpen | [`filter`] |
//! | Grayscale, contrast, brightness, polarity fix | [`tone`] |

pub mod filter;
pub mod geometry;
pub mod morphology;
pub mod threshold;
pub mod tone;

use crate::buffer::PixelBuffer;
use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};

pub use morphology::MorphOp;

/// One parameterised preprocessing step.
///
/// Serialised with an `op` tag so custom catalogs can be written as JSON:
/// `{"op": "clahe", "tile_size": 32, "clip_limit": 2.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    Grayscale,
    Contrast { factor: f32 },
    Brightness { factor: f32 },
    /// Fixed-level binarisation.
    Threshold { level: u8 },
    /// Otsu level with hysteresis.
    AdaptiveThreshold,
    Morphology { morph: MorphOp },
    Deskew { degrees: f32 },
    Bilateral {
        radius: u32,
        sigma_spatial: f32,
        sigma_range: f32,
    },
    Clahe { tile_size: u32, clip_limit: f32 },
    Sharpen { sigma: f32, threshold: i32 },
    PolarityFix,
    Scale { factor: f32 },
}

impl Transform {
    /// Short name used in logs and `preprocessing_used`.
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Grayscale => "grayscale",
            Transform::Contrast { .. } => "contrast",
            Transform::Brightness { .. } => "brightness",
            Transform::Threshold { .. } => "threshold",
            Transform::AdaptiveThreshold => "adaptive_threshold",
            Transform::Morphology { .. } => "morphology",
            Transform::Deskew { .. } => "deskew",
            Transform::Bilateral { .. } => "bilateral",
            Transform::Clahe { .. } => "clahe",
            Transform::Sharpen { .. } => "sharpen",
            Transform::PolarityFix => "polarity_fix",
            Transform::Scale { .. } => "scale",
        }
    }

    pub fn apply(&self, buf: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
        match *self {
            Transform::Grayscale => tone::grayscale(buf),
            Transform::Contrast { factor } => tone::contrast(buf, factor),
            Transform::Brightness { factor } => tone::brightness(buf, factor),
            Transform::Threshold { level } => threshold::fixed_threshold(buf, level),
            Transform::AdaptiveThreshold => threshold::adaptive_threshold(buf),
            Transform::Morphology { morph } => morphology::apply(buf, morph),
            Transform::Deskew { degrees } => geometry::deskew(buf, degrees),
            Transform::Bilateral {
                radius,
                sigma_spatial,
                sigma_range,
            } => filter::bilateral(buf, radius, sigma_spatial, sigma_range),
            Transform::Clahe {
                tile_size,
                clip_limit,
            } => filter::clahe(buf, tile_size, clip_limit),
            Transform::Sharpen { sigma, threshold } => filter::sharpen(buf, sigma, threshold),
            Transform::PolarityFix => tone::polarity_fix(buf),
            Transform::Scale { factor } => geometry::scale(buf, factor),
        }
    }
}

/// Run `steps` in order, each consuming the previous output.
pub fn apply_all(buf: PixelBuffer, steps: &[Transform]) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    steps.iter().try_fold(buf, |current, step| step.apply(&current))
}
