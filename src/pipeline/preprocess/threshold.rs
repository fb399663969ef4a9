//! Binarisation: Otsu's global threshold refined by two-sided hysteresis.
//!
//! Plain Otsu picks one cut and loses faint pen strokes that sit just below
//! it. The hysteresis band keeps clearly-dark and clearly-light pixels as
//! they are and lets ambiguous pixels follow their neighbours, so a faint
//! stroke attached to a confident one survives.

use crate::buffer::PixelBuffer;
use crate::error::PreprocessError;

/// Upper hysteresis band, as a multiple of the Otsu level.
pub const HIGH_FACTOR: f32 = 1.3;
/// Lower hysteresis band, as a multiple of the Otsu level.
pub const LOW_FACTOR: f32 = 0.7;

/// Level used when the histogram has a single populated bin.
const FALLBACK_LEVEL: u8 = 127;

const UNDECIDED: u8 = 0;
const BLACK: u8 = 1;
const WHITE: u8 = 2;

/// 256-bin luma histogram.
pub fn luma_histogram(buf: &PixelBuffer) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            hist[buf.luma(x, y) as usize] += 1;
        }
    }
    hist
}

/// Otsu level for a histogram.
///
/// Searches all 256 levels for the cut maximising `wB·wF·(mB−mF)²`, where
/// the background class is every level `<= t`. When a run of levels ties
/// for the maximum (every level between two populated bins of a bimodal
/// image does) the midpoint of the first and last tying level is returned.
pub fn otsu_level(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return FALLBACK_LEVEL;
    }
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(t, &n)| t as f64 * n as f64)
        .sum();

    let mut w_b = 0u64;
    let mut sum_b = 0.0f64;
    let mut best = f64::NEG_INFINITY;
    let mut first: Option<usize> = None;
    let mut last = 0usize;

    for (t, &n) in hist.iter().enumerate() {
        w_b += n;
        if w_b == 0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0 {
            break;
        }
        sum_b += t as f64 * n as f64;
        let m_b = sum_b / w_b as f64;
        let m_f = (sum_all - sum_b) / w_f as f64;
        let between = w_b as f64 * w_f as f64 * (m_b - m_f) * (m_b - m_f);

        let eps = best.abs() * 1e-12;
        if between > best + eps {
            best = between;
            first = Some(t);
            last = t;
        } else if (between - best).abs() <= eps {
            last = t;
        }
    }

    match first {
        Some(f) => ((f + last) / 2) as u8,
        None => FALLBACK_LEVEL,
    }
}

/// Adaptive threshold: Otsu level plus hysteresis, strictly 0/255 output.
///
/// Luma above `1.3·t` becomes white, below `0.7·t` black. Pixels inside the
/// band are resolved in raster order: white when any of their eight
/// neighbours is already white, black otherwise. The result is written to
/// every colour channel; alpha is carried over.
pub fn adaptive_threshold(buf: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    let level = otsu_level(&luma_histogram(buf));
    let high = HIGH_FACTOR * level as f32;
    let low = LOW_FACTOR * level as f32;

    let (w, h) = (buf.width() as usize, buf.height() as usize);
    let mut state = vec![UNDECIDED; w * h];
    for y in 0..h {
        for x in 0..w {
            let v = buf.luma(x as u32, y as u32) as f32;
            state[y * w + x] = if v > high {
                WHITE
            } else if v < low {
                BLACK
            } else {
                UNDECIDED
            };
        }
    }

    for y in 0..h {
        for x in 0..w {
            if state[y * w + x] != UNDECIDED {
                continue;
            }
            let white_neighbour = neighbours(x, y, w, h).any(|(nx, ny)| state[ny * w + nx] == WHITE);
            state[y * w + x] = if white_neighbour { WHITE } else { BLACK };
        }
    }

    let mut out = buf.clone();
    for y in 0..h {
        for x in 0..w {
            let v = if state[y * w + x] == WHITE { 255 } else { 0 };
            out.set_gray(x as u32, y as u32, v);
        }
    }
    Ok(out)
}

/// Fixed-level binarisation: luma `> level` → white.
pub fn fixed_threshold(buf: &PixelBuffer, level: u8) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    let mut out = buf.clone();
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            let v = if buf.luma(x, y) > level { 255 } else { 0 };
            out.set_gray(x, y, v);
        }
    }
    Ok(out)
}

fn neighbours(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    (-1i64..=1)
        .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .filter_map(move |(dx, dy)| {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            (nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < h)
                .then_some((nx as usize, ny as usize))
        })
}
