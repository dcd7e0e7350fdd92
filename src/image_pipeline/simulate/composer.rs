//! Combines spot, falloff and background layers into a detector image.

use rayon::prelude::*;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::DetectorImage;
use crate::image_pipeline::simulate::noise::NoiseModel;

/// Background multipliers drawn in variable-background mode.
pub const BACKGROUND_SCALES: [f64; 8] = [0.0125, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 1.25];

/// Noise-free image: `mean(spots) * bfac * volume_scale + sum(background) * bg_scale`.
///
/// Every lattice in `spots` carries equal weight. All layers must share the
/// shape of the first spot image.
pub fn compose_deterministic(
    spots: &[DetectorImage],
    bfac: &DetectorImage,
    volume_scale: f64,
    background_layers: &[&DetectorImage],
    bg_scale: f64,
) -> Result<DetectorImage> {
    let first = spots.first().ok_or_else(|| {
        PipelineError::InvalidParameter("at least one lattice of spots is required".to_string())
    })?;
    let dims = first.dims();
    for layer in spots.iter().chain(std::iter::once(bfac)).chain(background_layers.iter().copied()) {
        first.ensure_shape(layer.dims())?;
    }
    for (name, value) in [("volume scale", volume_scale), ("background scale", bg_scale)] {
        if !value.is_finite() {
            return Err(PipelineError::InvalidParameter(format!("{} must be finite, got {}", name, value)));
        }
    }

    let lattice_weight = 1.0 / spots.len() as f64;
    let data = (0..first.data.len())
        .into_par_iter()
        .map(|i| {
            let spot_sum: f64 = spots.iter().map(|s| s.data[i] as f64).sum();
            let background: f64 = background_layers.iter().map(|b| b.data[i] as f64).sum();
            let value = spot_sum * lattice_weight * bfac.data[i] as f64 * volume_scale + background * bg_scale;
            value as f32
        })
        .collect();
    DetectorImage::new(dims.0, dims.1, data)
}

/// [`compose_deterministic`] followed by `noise`.
pub fn compose<N: NoiseModel + ?Sized>(
    spots: &[DetectorImage],
    bfac: &DetectorImage,
    volume_scale: f64,
    background_layers: &[&DetectorImage],
    bg_scale: f64,
    noise: &N,
    seed: u64,
) -> Result<DetectorImage> {
    let clean = compose_deterministic(spots, bfac, volume_scale, background_layers, bg_scale)?;
    noise.apply(&clean, seed)
}
