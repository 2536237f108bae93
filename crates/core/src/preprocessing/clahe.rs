//! Histogram equalization: global and contrast-limited adaptive (CLAHE).
//!
//! RGB frames are equalized on their BT.601 luminance so hue is preserved.

use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;

const BINS: usize = 256;

/// CLAHE parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClaheParams {
    /// Histogram bins are clipped at `clip_limit * tile_area / 256`.
    pub clip_limit: f64,
    /// Tiles per axis.
    pub grid: usize,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            grid: 8,
        }
    }
}

/// Apply CLAHE in place to a gray or RGB frame.
pub fn clahe(frame: &mut Frame, params: ClaheParams) -> Result<(), PreprocessError> {
    if params.grid == 0 || params.clip_limit.is_nan() || params.clip_limit <= 0.0 {
        return Err(PreprocessError::InvalidConfig(format!(
            "invalid CLAHE parameters: clip_limit={}, grid={}",
            params.clip_limit, params.grid
        )));
    }
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    on_luma(frame, |luma| clahe_plane(luma, w, h, params))
}

/// Apply global histogram equalization in place to a gray or RGB frame.
pub fn equalize_histogram(frame: &mut Frame) -> Result<(), PreprocessError> {
    on_luma(frame, |luma| {
        let hist = histogram(luma.iter().copied());
        let lut = equalization_lut(&hist);
        for v in luma.iter_mut() {
            *v = lut[*v as usize];
        }
    })
}

/// BT.601 luminance of an RGB frame as a single-channel frame.
///
/// Gray frames are returned as a copy.
pub fn to_luma(frame: &Frame) -> Result<Frame, PreprocessError> {
    match frame.channels() {
        1 => Ok(frame.clone()),
        3 => {
            let data = frame
                .data()
                .chunks_exact(3)
                .map(|px| luma(px[0], px[1], px[2]).round().clamp(0.0, 255.0) as u8)
                .collect();
            Ok(Frame::new(data, frame.width(), frame.height(), 1))
        }
        other => Err(PreprocessError::ChannelCount {
            expected: 3,
            actual: other,
        }),
    }
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Run `f` on the luminance plane; chroma of RGB frames is carried through.
fn on_luma(frame: &mut Frame, f: impl FnOnce(&mut [u8])) -> Result<(), PreprocessError> {
    match frame.channels() {
        1 => {
            f(frame.data_mut());
            Ok(())
        }
        3 => {
            let pixels = frame.data().len() / 3;
            let mut y_plane = Vec::with_capacity(pixels);
            let mut chroma = Vec::with_capacity(pixels);
            for px in frame.data().chunks_exact(3) {
                let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
                let y = luma(px[0], px[1], px[2]);
                let cb = 128.0 + (b - y) * 0.564;
                let cr = 128.0 + (r - y) * 0.713;
                y_plane.push(y.round().clamp(0.0, 255.0) as u8);
                chroma.push((cb, cr));
            }

            f(&mut y_plane);

            for ((px, &y), &(cb, cr)) in frame
                .data_mut()
                .chunks_exact_mut(3)
                .zip(&y_plane)
                .zip(&chroma)
            {
                let y = y as f32;
                let r = y + 1.403 * (cr - 128.0);
                let g = y - 0.714 * (cr - 128.0) - 0.344 * (cb - 128.0);
                let b = y + 1.773 * (cb - 128.0);
                px[0] = r.round().clamp(0.0, 255.0) as u8;
                px[1] = g.round().clamp(0.0, 255.0) as u8;
                px[2] = b.round().clamp(0.0, 255.0) as u8;
            }
            Ok(())
        }
        other => Err(PreprocessError::ChannelCount {
            expected: 3,
            actual: other,
        }),
    }
}

fn histogram(values: impl Iterator<Item = u8>) -> [u32; BINS] {
    let mut hist = [0u32; BINS];
    for v in values {
        hist[v as usize] += 1;
    }
    hist
}

/// Lookup table mapping each bin to its CDF scaled onto [0, 255].
fn equalization_lut(hist: &[u32; BINS]) -> [u8; BINS] {
    let total: u32 = hist.iter().sum();
    let mut lut = [0u8; BINS];
    if total == 0 {
        return lut;
    }
    let mut cdf = 0u32;
    for (bin, &count) in hist.iter().enumerate() {
        cdf += count;
        lut[bin] = ((cdf as f64 * 255.0 / total as f64).round()) as u8;
    }
    lut
}

/// Clip every bin at `limit` and spread the excess evenly over all bins.
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let bonus = excess / BINS as u32;
    let mut residual = excess % BINS as u32;
    for count in hist.iter_mut() {
        *count += bonus;
    }
    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}

/// Half-open pixel span of tile `index` when `len` pixels are split into `tiles`.
fn tile_span(index: usize, tiles: usize, len: usize) -> (usize, usize) {
    (index * len / tiles, (index + 1) * len / tiles)
}

fn clahe_plane(plane: &mut [u8], width: usize, height: usize, params: ClaheParams) {
    if width == 0 || height == 0 {
        return;
    }
    let gx = params.grid.min(width);
    let gy = params.grid.min(height);

    // Per-tile lookup tables
    let mut luts = Vec::with_capacity(gx * gy);
    for ty in 0..gy {
        let (y0, y1) = tile_span(ty, gy, height);
        for tx in 0..gx {
            let (x0, x1) = tile_span(tx, gx, width);
            let values = (y0..y1).flat_map(|y| plane[y * width + x0..y * width + x1].iter().copied());
            let mut hist = histogram(values);
            let area = ((y1 - y0) * (x1 - x0)) as f64;
            let limit = ((params.clip_limit * area / BINS as f64) as u32).max(1);
            clip_histogram(&mut hist, limit);
            luts.push(equalization_lut(&hist));
        }
    }

    // Bilinear blend between the four nearest tile centers
    let tile_w = width as f32 / gx as f32;
    let tile_h = height as f32 / gy as f32;
    for y in 0..height {
        let (ty0, ty1, ay) = neighbours(y, tile_h, gy);
        for x in 0..width {
            let (tx0, tx1, ax) = neighbours(x, tile_w, gx);
            let v = plane[y * width + x] as usize;
            let top = luts[ty0 * gx + tx0][v] as f32 * (1.0 - ax) + luts[ty0 * gx + tx1][v] as f32 * ax;
            let bottom =
                luts[ty1 * gx + tx0][v] as f32 * (1.0 - ax) + luts[ty1 * gx + tx1][v] as f32 * ax;
            plane[y * width + x] = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Lower/upper tile index around pixel `pos` and the weight of the upper one.
fn neighbours(pos: usize, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile_size - 0.5;
    let lower = (f.floor().max(0.0) as usize).min(tiles - 1);
    let upper = (lower + 1).min(tiles - 1);
    let weight = if upper == lower {
        0.0
    } else {
        (f - lower as f32).clamp(0.0, 1.0)
    };
    (lower, upper, weight)
}
