//! Masked max / mean pooling by an integer factor.
//!
//! The frame is partitioned into non-overlapping `factor x factor` tiles.
//! Rows and columns that do not fill a whole tile are dropped (truncation,
//! never padding), so the output is `floor(H/f) x floor(W/f)`.

use rayon::prelude::*;
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::{DetectorImage, DetectorMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownsampleMode {
    /// Maximum of `img * mask` over the tile; masked pixels count as zero.
    #[default]
    Max,
    /// Mean over the unmasked pixels of the tile; zero when none are unmasked.
    Mean,
}

/// Checks the downsample contract and returns the output `(width, height)`.
pub fn output_dims(
    image: &DetectorImage,
    mask: &DetectorMask,
    factor: usize,
) -> Result<(usize, usize)> {
    if factor == 0 {
        return Err(PipelineError::InvalidParameter(
            "downsample factor must be at least 1".to_string(),
        ));
    }
    image.ensure_shape(mask.dims())?;

    let out_w = image.width / factor;
    let out_h = image.height / factor;
    if out_w == 0 || out_h == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "downsample factor {} exceeds frame {}x{}",
            factor, image.width, image.height
        )));
    }
    Ok((out_w, out_h))
}

/// Host implementation, parallel over output rows.
pub fn downsample_host(
    image: &DetectorImage,
    mask: &DetectorMask,
    factor: usize,
    mode: DownsampleMode,
) -> Result<DetectorImage> {
    let (out_w, out_h) = output_dims(image, mask, factor)?;
    debug!(
        "Downsampling {}x{} by {} ({:?}) -> {}x{}",
        image.width, image.height, factor, mode, out_w, out_h
    );

    let mut out = vec![0.0f32; out_w * out_h];
    out.par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(oy, out_row)| {
            for (ox, out_px) in out_row.iter_mut().enumerate() {
                *out_px = match mode {
                    DownsampleMode::Max => tile_max(image, mask, factor, oy, ox),
                    DownsampleMode::Mean => tile_mean(image, mask, factor, oy, ox),
                };
            }
        });

    DetectorImage::new(out_w, out_h, out)
}

fn tile_max(image: &DetectorImage, mask: &DetectorMask, factor: usize, oy: usize, ox: usize) -> f32 {
    let mut best = f32::NEG_INFINITY;
    for row in oy * factor..(oy + 1) * factor {
        let start = row * image.width + ox * factor;
        let pixels = &image.data[start..start + factor];
        let valid = &mask.data[start..start + factor];
        for (&v, &ok) in pixels.iter().zip(valid) {
            let v = if ok { v } else { 0.0 };
            if v > best {
                best = v;
            }
        }
    }
    // nothing compared above -inf: every value NaN or every valid value -inf
    if best == f32::NEG_INFINITY { 0.0 } else { best }
}

fn tile_mean(image: &DetectorImage, mask: &DetectorMask, factor: usize, oy: usize, ox: usize) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for row in oy * factor..(oy + 1) * factor {
        let start = row * image.width + ox * factor;
        let pixels = &image.data[start..start + factor];
        let valid = &mask.data[start..start + factor];
        for (&v, &ok) in pixels.iter().zip(valid) {
            if ok {
                sum += f64::from(v);
                count += 1;
            }
        }
    }
    if count == 0 { 0.0 } else { (sum / count as f64) as f32 }
}
