//! Photon-counting noise applied to a deterministic detector image.
//!
//! Noise is generated in row chunks on the rayon pool. Each chunk seeds its
//! own `StdRng` from the caller's seed plus the chunk index, so the result
//! only depends on the seed and the image, not on scheduling.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::DetectorImage;

/// Rows handed to one worker.
const CHUNK_ROWS: usize = 64;

/// Above this mean the Poisson draw is replaced by its normal approximation.
pub const DEFAULT_GAUSSIAN_THRESHOLD: f64 = 1000.0;

pub trait NoiseModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a noisy, integer-valued copy of `image`.
    fn apply(&self, image: &DetectorImage, seed: u64) -> Result<DetectorImage>;
}

impl<N: NoiseModel + ?Sized> NoiseModel for Box<N> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn apply(&self, image: &DetectorImage, seed: u64) -> Result<DetectorImage> {
        (**self).apply(image, seed)
    }
}

/// Rounds to whole photons without adding noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl NoiseModel for NoNoise {
    fn name(&self) -> &'static str {
        "none"
    }

    fn apply(&self, image: &DetectorImage, _seed: u64) -> Result<DetectorImage> {
        let data = image.data.par_iter().map(|v| v.max(0.0).round()).collect();
        DetectorImage::new(image.width, image.height, data)
    }
}

/// Photon shot noise with optional Gaussian readout noise.
#[derive(Debug, Clone, Copy)]
pub struct PoissonNoise {
    /// Readout noise sigma in photons, 0 disables it
    pub readout_sigma: f64,
    pub gaussian_threshold: f64,
}

impl Default for PoissonNoise {
    fn default() -> Self {
        Self {
            readout_sigma: 0.0,
            gaussian_threshold: DEFAULT_GAUSSIAN_THRESHOLD,
        }
    }
}

impl PoissonNoise {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readout(readout_sigma: f64) -> Self {
        Self {
            readout_sigma,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.readout_sigma.is_finite() && self.readout_sigma >= 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "readout sigma must be >= 0, got {}",
                self.readout_sigma
            )));
        }
        if !(self.gaussian_threshold > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "gaussian threshold must be > 0, got {}",
                self.gaussian_threshold
            )));
        }
        Ok(())
    }

    fn sample(&self, mean: f64, readout: Option<&Normal<f64>>, rng: &mut StdRng) -> Result<f64> {
        let photons = if !(mean > 0.0) {
            0.0
        } else if mean < self.gaussian_threshold {
            Poisson::new(mean)
                .map_err(|e| PipelineError::InvalidParameter(format!("poisson mean {}: {}", mean, e)))?
                .sample(rng)
        } else {
            let normal = Normal::new(mean, mean.sqrt())
                .map_err(|e| PipelineError::InvalidParameter(format!("normal mean {}: {}", mean, e)))?;
            normal.sample(rng).max(0.0)
        };
        let read = readout.map_or(0.0, |dist| dist.sample(rng));
        Ok((photons + read).round())
    }
}

impl NoiseModel for PoissonNoise {
    fn name(&self) -> &'static str {
        "poisson"
    }

    fn apply(&self, image: &DetectorImage, seed: u64) -> Result<DetectorImage> {
        self.validate()?;
        if image.data.iter().any(|v| v.is_infinite()) {
            return Err(PipelineError::InvalidParameter(
                "cannot sample noise for an infinite mean".to_string(),
            ));
        }
        let readout = if self.readout_sigma > 0.0 {
            Some(Normal::new(0.0, self.readout_sigma).map_err(|e| {
                PipelineError::InvalidParameter(format!("readout sigma {}: {}", self.readout_sigma, e))
            })?)
        } else {
            None
        };

        let mut out = image.data.clone();
        out.par_chunks_mut(image.width.max(1) * CHUNK_ROWS)
            .enumerate()
            .try_for_each(|(chunk_idx, chunk)| -> Result<()> {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(chunk_idx as u64));
                for px in chunk.iter_mut() {
                    *px = self.sample(*px as f64, readout.as_ref(), &mut rng)? as f32;
                }
                Ok(())
            })?;
        DetectorImage::new(image.width, image.height, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mean_and_var(data: &[f32]) -> (f64, f64) {
        let n = data.len() as f64;
        let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        (mean, var)
    }

    #[test]
    fn no_noise_rounds_to_photons() {
        let img = DetectorImage::new(2, 2, vec![0.4, 0.6, 2.5, -3.0]).unwrap();
        let out = NoNoise.apply(&img, 0).unwrap();
        assert_eq!(out.data, vec![0.0, 1.0, 3.0, 0.0]);
    }

    #[test]
    fn poisson_is_reproducible_per_seed() {
        let img = DetectorImage::filled(100, 150, 12.0);
        let noise = PoissonNoise::new();
        let a = noise.apply(&img, 42).unwrap();
        let b = noise.apply(&img, 42).unwrap();
        let c = noise.apply(&img, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn poisson_statistics() {
        let img = DetectorImage::filled(200, 200, 25.0);
        let out = PoissonNoise::new().apply(&img, 7).unwrap();
        assert!(out.data.iter().all(|v| v.fract() == 0.0 && *v >= 0.0));
        let (mean, var) = mean_and_var(&out.data);
        assert_relative_eq!(mean, 25.0, epsilon = 0.25);
        assert_relative_eq!(var, 25.0, epsilon = 1.5);
    }

    #[test]
    fn gaussian_branch_for_bright_pixels() {
        let img = DetectorImage::filled(200, 200, 5000.0);
        let out = PoissonNoise::new().apply(&img, 3).unwrap();
        let (mean, var) = mean_and_var(&out.data);
        assert_relative_eq!(mean, 5000.0, epsilon = 2.0);
        assert_relative_eq!(var.sqrt(), 5000f64.sqrt(), epsilon = 3.0);
    }

    #[test]
    fn dark_pixels_stay_dark_without_readout() {
        let img = DetectorImage::new(3, 1, vec![0.0, -1.0, f32::NAN]).unwrap();
        let out = PoissonNoise::new().apply(&img, 1).unwrap();
        assert_eq!(out.data, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn readout_noise_widens_distribution() {
        let img = DetectorImage::filled(200, 200, 0.0);
        let out = PoissonNoise::with_readout(3.0).apply(&img, 11).unwrap();
        let (mean, var) = mean_and_var(&out.data);
        assert_relative_eq!(mean, 0.0, epsilon = 0.1);
        assert!(var > 7.0 && var < 11.0, "variance {}", var);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let img = DetectorImage::filled(2, 2, 1.0);
        assert!(PoissonNoise::with_readout(-1.0).apply(&img, 0).is_err());
        let inf = DetectorImage::filled(2, 2, f32::INFINITY);
        assert!(PoissonNoise::new().apply(&inf, 0).is_err());
    }
}
