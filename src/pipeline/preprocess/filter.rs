//! Neighbourhood filters: bilateral denoising, tiled CLAHE, unsharp mask.

use crate::buffer::PixelBuffer;
use crate::error::PreprocessError;

/// Edge-preserving smoothing.
///
/// Every neighbour within `radius` is weighted by a spatial Gaussian on its
/// distance and a range Gaussian on its intensity difference to the centre;
/// the centre becomes the normalised weighted mean. Neighbours outside the
/// buffer are skipped.
pub fn bilateral(
    buf: &PixelBuffer,
    radius: u32,
    sigma_spatial: f32,
    sigma_range: f32,
) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    if radius == 0 {
        return Err(PreprocessError::InvalidParameter {
            transform: "bilateral",
            detail: "radius must be at least 1".into(),
        });
    }
    for (name, sigma) in [("sigma_spatial", sigma_spatial), ("sigma_range", sigma_range)] {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(PreprocessError::InvalidParameter {
                transform: "bilateral",
                detail: format!("{name} must be positive, got {sigma}"),
            });
        }
    }

    let r = radius as i64;
    let side = (2 * r + 1) as usize;
    let two_ss = 2.0 * (sigma_spatial as f64).powi(2);
    let two_sr = 2.0 * (sigma_range as f64).powi(2);

    let mut spatial = vec![0.0f64; side * side];
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = (dx * dx + dy * dy) as f64;
            spatial[((dy + r) as usize) * side + (dx + r) as usize] = (-d2 / two_ss).exp();
        }
    }
    let range: Vec<f64> = (0..256)
        .map(|d| (-((d * d) as f64) / two_sr).exp())
        .collect();

    let (w, h) = (buf.width() as i64, buf.height() as i64);
    let color = buf.layout().color_channels();
    let mut out = buf.clone();

    for y in 0..h {
        for x in 0..w {
            for c in 0..color {
                let centre = buf.get(x as u32, y as u32, c) as i64;
                let mut acc = 0.0f64;
                let mut norm = 0.0f64;
                for dy in -r..=r {
                    let ny = y + dy;
                    if ny < 0 || ny >= h {
                        continue;
                    }
                    for dx in -r..=r {
                        let nx = x + dx;
                        if nx < 0 || nx >= w {
                            continue;
                        }
                        let v = buf.get(nx as u32, ny as u32, c) as i64;
                        let weight = spatial[((dy + r) as usize) * side + (dx + r) as usize]
                            * range[(v - centre).unsigned_abs() as usize];
                        acc += weight * v as f64;
                        norm += weight;
                    }
                }
                // The centre always contributes weight 1, so norm > 0.
                let value = (acc / norm).round().clamp(0.0, 255.0) as u8;
                out.set(x as u32, y as u32, c, value);
            }
        }
    }
    Ok(out)
}

/// Contrast Limited Adaptive Histogram Equalisation on luma.
///
/// The image is cut into `tile_size`×`tile_size` tiles (edge tiles may be
/// smaller). Per tile: histogram, clip every bin at
/// `clip_limit · pixels / 256`, spread the clipped excess evenly across all
/// 256 bins, accumulate, and remap the tile's pixels through the CDF scaled
/// to 0..=255. The equalised luma is written to every colour channel.
pub fn clahe(
    buf: &PixelBuffer,
    tile_size: u32,
    clip_limit: f32,
) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    if tile_size == 0 {
        return Err(PreprocessError::InvalidParameter {
            transform: "clahe",
            detail: "tile_size must be at least 1".into(),
        });
    }
    if !clip_limit.is_finite() || clip_limit <= 0.0 {
        return Err(PreprocessError::InvalidParameter {
            transform: "clahe",
            detail: format!("clip_limit must be positive, got {clip_limit}"),
        });
    }

    let mut out = buf.clone();
    let (w, h) = (buf.width(), buf.height());

    for ty in (0..h).step_by(tile_size as usize) {
        for tx in (0..w).step_by(tile_size as usize) {
            let x_end = (tx + tile_size).min(w);
            let y_end = (ty + tile_size).min(h);

            let mut hist = [0.0f64; 256];
            for y in ty..y_end {
                for x in tx..x_end {
                    hist[buf.luma(x, y) as usize] += 1.0;
                }
            }
            let pixels = ((x_end - tx) * (y_end - ty)) as f64;
            let lut = clipped_cdf_lut(&mut hist, pixels, clip_limit as f64);

            for y in ty..y_end {
                for x in tx..x_end {
                    out.set_gray(x, y, lut[buf.luma(x, y) as usize]);
                }
            }
        }
    }
    Ok(out)
}

fn clipped_cdf_lut(hist: &mut [f64; 256], pixels: f64, clip_limit: f64) -> [u8; 256] {
    let limit = clip_limit * (pixels / 256.0);
    let mut excess = 0.0;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256.0;

    let mut lut = [0u8; 256];
    let mut cdf = 0.0;
    for (v, bin) in hist.iter().enumerate() {
        cdf += bin + share;
        lut[v] = (cdf / pixels * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Unsharp mask: `sigma` is the blur radius, `threshold` the minimum
/// difference that gets sharpened.
pub fn sharpen(buf: &PixelBuffer, sigma: f32, threshold: i32) -> Result<PixelBuffer, PreprocessError> {
    buf.ensure_not_empty()?;
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(PreprocessError::InvalidParameter {
            transform: "sharpen",
            detail: format!("sigma must be positive, got {sigma}"),
        });
    }
    let sharpened = buf.to_image().unsharpen(sigma, threshold);
    Ok(PixelBuffer::from_image(&sharpened))
}
