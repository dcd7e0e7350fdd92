//! Photon-count intensity compression.
//!
//! Steps, each applied to the whole frame before the next:
//! 1. divide by ADU per photon
//! 2. clip below at 0
//! 3. clip above at `i_max`
//! 4. optional square root (variance stabilising for Poisson counts)
//! 5. floor, saturating at 255 for the 8-bit target
//!
//! With the default `i_max = 255^2` the sqrt path maps the full photon range
//! onto 0..=255.

use rayon::prelude::*;
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::DetectorImage;

/// `255^2`, the ceiling that makes `sqrt` land exactly on the 8-bit range.
pub const DEFAULT_I_MAX: f32 = 65025.0;

/// Jungfrau ceiling.
pub const JUNGFRAU_I_MAX: f32 = 16384.0;

/// Integer domain of the quantized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantizeTarget {
    /// Floor then saturate at 255
    #[default]
    EightBit,
    /// Floor only
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionParams {
    pub adu_per_photon: f32,
    pub i_max: f32,
    pub use_sqrt: bool,
    pub target: QuantizeTarget,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            adu_per_photon: 1.0,
            i_max: DEFAULT_I_MAX,
            use_sqrt: true,
            target: QuantizeTarget::EightBit,
        }
    }
}

impl CompressionParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.adu_per_photon.is_finite() && self.adu_per_photon > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "adu_per_photon must be positive and finite, got {}",
                self.adu_per_photon
            )));
        }
        if !(self.i_max.is_finite() && self.i_max >= 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "intensity ceiling must be non-negative and finite, got {}",
                self.i_max
            )));
        }
        Ok(())
    }

    /// Largest value the compressed output can take.
    pub fn output_ceiling(&self) -> f32 {
        let top = if self.use_sqrt { self.i_max.sqrt() } else { self.i_max };
        match self.target {
            QuantizeTarget::EightBit => top.floor().min(255.0),
            QuantizeTarget::Wide => top.floor(),
        }
    }

    #[inline]
    pub fn compress_value(&self, adu: f32) -> f32 {
        let photons = adu / self.adu_per_photon;
        // max() drops NaN in favour of 0
        let clipped = photons.max(0.0).min(self.i_max);
        let scaled = if self.use_sqrt { clipped.sqrt() } else { clipped };
        let floored = scaled.floor();
        match self.target {
            QuantizeTarget::EightBit => floored.min(255.0),
            QuantizeTarget::Wide => floored,
        }
    }
}

/// Host implementation of the compression steps.
pub fn compress_host(image: &DetectorImage, params: &CompressionParams) -> Result<DetectorImage> {
    params.validate()?;
    debug!(
        "Compressing {}x{} (adu/photon={}, i_max={}, sqrt={}, target={:?})",
        image.width, image.height, params.adu_per_photon, params.i_max, params.use_sqrt, params.target
    );

    let data: Vec<f32> = image
        .data
        .par_iter()
        .map(|&v| params.compress_value(v))
        .collect();

    DetectorImage::new(image.width, image.height, data)
}
