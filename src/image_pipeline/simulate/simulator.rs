//! Randomized shot generation on top of a [`DiffractionEngine`].

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, UnitSphere};
use tracing::{debug, info, instrument};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::{BeamCenter, DetectorImage};
use crate::image_pipeline::simulate::background::{BackgroundCache, FixedLayers};
use crate::image_pipeline::simulate::composer::{BACKGROUND_SCALES, compose};
use crate::image_pipeline::simulate::engine::{DiffractionEngine, LatticePerturbation};
use crate::image_pipeline::simulate::geometry::{DetectorGeometry, ShotRandomization, randomize_geometry};
use crate::image_pipeline::simulate::noise::NoiseModel;

/// Default spot intensity multiplier (illuminated crystal volume).
pub const DEFAULT_VOLUME_SCALE: f64 = 1e-2;

/// Rotation angles of additional lattices, degrees.
const LATTICE_ANGLE_RANGE_DEG: (f64, f64) = (1.0, 180.0);

/// Labels recorded alongside a simulated shot.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedParams {
    /// Resolution label, Å
    pub resolution: f64,
    pub multi_lattice: bool,
    /// Spread of lattice rotation angles (nominal lattice counted as 0°), degrees
    pub ang_sigma: f64,
    pub bg_scale: f64,
    /// Lattices in the shot, including the nominal one
    pub num_lat: usize,
    pub wavelength: f64,
    pub detector_distance: f64,
    pub beam_center: BeamCenter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub multi_lattice_chance: f64,
    /// Upper bound (exclusive) on the lattice count of a multi-lattice shot
    pub max_lat: usize,
    pub vary_background_scale: bool,
    pub randomization: ShotRandomization,
    pub volume_scale: f64,
    pub plastic_candidates: Vec<String>,
    /// Forces one plastic candidate instead of drawing from the pool
    pub plastic_override: Option<String>,
    /// Seed of the simulator's generator; drawn from the OS when unset
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            multi_lattice_chance: 0.0,
            max_lat: 2,
            vary_background_scale: false,
            randomization: ShotRandomization::default(),
            volume_scale: DEFAULT_VOLUME_SCALE,
            plastic_candidates: Vec::new(),
            plastic_override: None,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.multi_lattice_chance) {
            return Err(PipelineError::InvalidParameter(format!(
                "multi-lattice chance must be in [0, 1], got {}",
                self.multi_lattice_chance
            )));
        }
        if self.multi_lattice_chance > 0.0 && self.max_lat < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "max_lat must be at least 2 for multi-lattice shots, got {}",
                self.max_lat
            )));
        }
        if !self.volume_scale.is_finite() {
            return Err(PipelineError::InvalidParameter(format!(
                "volume scale must be finite, got {}",
                self.volume_scale
            )));
        }
        if self.plastic_override.is_none() && self.plastic_candidates.is_empty() {
            return Err(PipelineError::InvalidParameter(
                "plastic background pool is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for SimulationConfig
#[derive(Default)]
pub struct SimulationConfigBuilder {
    multi_lattice_chance: Option<f64>,
    max_lat: Option<usize>,
    vary_background_scale: Option<bool>,
    randomization: Option<ShotRandomization>,
    volume_scale: Option<f64>,
    plastic_candidates: Option<Vec<String>>,
    plastic_override: Option<String>,
    seed: Option<u64>,
}

impl SimulationConfigBuilder {
    pub fn multi_lattice_chance(mut self, chance: f64) -> Self {
        self.multi_lattice_chance = Some(chance);
        self
    }

    pub fn max_lat(mut self, max_lat: usize) -> Self {
        self.max_lat = Some(max_lat);
        self
    }

    pub fn vary_background_scale(mut self, enable: bool) -> Self {
        self.vary_background_scale = Some(enable);
        self
    }

    pub fn randomization(mut self, randomization: ShotRandomization) -> Self {
        self.randomization = Some(randomization);
        self
    }

    pub fn volume_scale(mut self, scale: f64) -> Self {
        self.volume_scale = Some(scale);
        self
    }

    pub fn plastic_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plastic_candidates = Some(candidates.into_iter().map(Into::into).collect());
        self
    }

    pub fn plastic_override(mut self, candidate: impl Into<String>) -> Self {
        self.plastic_override = Some(candidate.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> SimulationConfig {
        let default = SimulationConfig::default();
        SimulationConfig {
            multi_lattice_chance: self.multi_lattice_chance.unwrap_or(default.multi_lattice_chance),
            max_lat: self.max_lat.unwrap_or(default.max_lat),
            vary_background_scale: self.vary_background_scale.unwrap_or(default.vary_background_scale),
            randomization: self.randomization.unwrap_or(default.randomization),
            volume_scale: self.volume_scale.unwrap_or(default.volume_scale),
            plastic_candidates: self.plastic_candidates.unwrap_or(default.plastic_candidates),
            plastic_override: self.plastic_override.or(default.plastic_override),
            seed: self.seed.or(default.seed),
        }
    }
}

/// Population standard deviation.
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Generates labelled, noisy shots from a fixed base geometry.
pub struct ShotSimulator<E: DiffractionEngine, N: NoiseModel> {
    engine: E,
    noise: N,
    geometry: DetectorGeometry,
    config: SimulationConfig,
    cache: BackgroundCache,
    rng: StdRng,
}

impl<E: DiffractionEngine, N: NoiseModel> ShotSimulator<E, N> {
    pub fn new(engine: E, noise: N, geometry: DetectorGeometry, config: SimulationConfig) -> Result<Self> {
        geometry.validate()?;
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            engine,
            noise,
            geometry,
            config,
            cache: BackgroundCache::new(),
            rng,
        })
    }

    pub fn geometry(&self) -> &DetectorGeometry {
        &self.geometry
    }

    /// Replaces the base geometry; cached layers are dropped.
    pub fn set_geometry(&mut self, geometry: DetectorGeometry) -> Result<()> {
        geometry.validate()?;
        self.geometry = geometry;
        self.cache.invalidate();
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn cache(&self) -> &BackgroundCache {
        &self.cache
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn fixed_layers(&mut self, shot: &DetectorGeometry) -> Result<Arc<FixedLayers>> {
        if self.config.randomization.any() {
            Ok(Arc::new(FixedLayers::compute(&self.engine, shot)?))
        } else {
            self.cache.get_or_compute(&self.engine, shot)
        }
    }

    /// Simulates one shot and returns its labels with the noisy image.
    #[instrument(skip(self))]
    pub fn simulate(&mut self) -> Result<(SimulatedParams, DetectorImage)> {
        let shot = randomize_geometry(&self.geometry, &self.config.randomization, &mut self.rng);
        let layers = self.fixed_layers(&shot)?;

        let mut spots = vec![self.engine.spots(&shot, None)?];

        let multi_lattice = self.rng.gen_bool(self.config.multi_lattice_chance);
        let mut ang_sigma = 0.0;
        if multi_lattice {
            let additional = self.rng.gen_range(1..self.config.max_lat);
            let mut angles = Vec::with_capacity(additional + 1);
            for i in 0..additional {
                let axis: [f64; 3] = UnitSphere.sample(&mut self.rng);
                let angle_deg = self.rng.gen_range(LATTICE_ANGLE_RANGE_DEG.0..=LATTICE_ANGLE_RANGE_DEG.1);
                debug!("Additional lattice {}: {:.1} deg about {:?}", i + 1, angle_deg, axis);
                let perturbation = LatticePerturbation { axis, angle_deg };
                spots.push(self.engine.spots(&shot, Some(&perturbation))?);
                angles.push(angle_deg);
            }
            angles.push(0.0);
            ang_sigma = population_std(&angles);
        }

        let plastic_name = match &self.config.plastic_override {
            Some(name) => name.clone(),
            None => self
                .config
                .plastic_candidates
                .choose(&mut self.rng)
                .cloned()
                .ok_or_else(|| PipelineError::InvalidParameter("plastic background pool is empty".to_string()))?,
        };
        let plastic = self.engine.plastic_background(&shot, &plastic_name)?;

        let falloff = self.engine.resolution_falloff(&layers.stol, &mut self.rng)?;

        let bg_scale = if self.config.vary_background_scale {
            BACKGROUND_SCALES.choose(&mut self.rng).copied().unwrap_or(1.0)
        } else {
            1.0
        };

        let noise_seed = self.rng.next_u64();
        let image = compose(
            &spots,
            &falloff.bfactor_image,
            self.config.volume_scale,
            &[&layers.air_and_water, &plastic],
            bg_scale,
            &self.noise,
            noise_seed,
        )?;

        let params = SimulatedParams {
            resolution: falloff.resolution,
            multi_lattice,
            ang_sigma,
            bg_scale,
            num_lat: spots.len(),
            wavelength: shot.wavelength_a,
            detector_distance: shot.distance_mm,
            beam_center: shot.beam_center,
        };
        info!(
            "Simulated shot: {:.2} A, {} lattice(s), bg x{}, plastic {}",
            params.resolution, params.num_lat, params.bg_scale, plastic_name
        );
        Ok((params, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn population_std_counts_every_value() {
        assert_relative_eq!(population_std(&[90.0, 0.0]), 45.0);
        assert_relative_eq!(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_eq!(population_std(&[]), 0.0);
    }

    #[test]
    fn config_validation() {
        let base = || SimulationConfig::builder().plastic_candidates(["a"]);
        assert!(base().build().validate().is_ok());
        assert!(base().multi_lattice_chance(1.5).build().validate().is_err());
        assert!(base().multi_lattice_chance(-0.1).build().validate().is_err());
        assert!(base().multi_lattice_chance(0.5).max_lat(1).build().validate().is_err());
        assert!(base().max_lat(1).build().validate().is_ok());
        assert!(SimulationConfig::builder().build().validate().is_err());
        assert!(SimulationConfig::builder().plastic_override("b").build().validate().is_ok());
    }
}
