//! Detector / beam geometry and the conversions that depend on it.

use rand::Rng;
use rand::rngs::StdRng;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::BeamCenter;

/// Photon energy (eV) times wavelength (Å).
pub const ENERGY_CONV: f64 = 12398.419739640716;

/// Range of randomized detector distances, mm.
pub const DISTANCE_RANGE_MM: (f64, f64) = (200.0, 300.0);

/// Range of randomized photon energies, eV.
pub const ENERGY_RANGE_EV: (f64, f64) = (10000.0, 13000.0);

/// Half-width of the randomized beam center window, mm.
pub const CENTER_WINDOW_MM: f64 = 10.0;

/// Single-panel detector and monochromatic beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorGeometry {
    pub distance_mm: f64,
    /// Square pixels assumed
    pub pixel_size_mm: f64,
    pub wavelength_a: f64,
    pub beam_center: BeamCenter,
    pub width: usize,
    pub height: usize,
}

/// Bitwise identity of a geometry, usable as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey([u64; 5], usize, usize);

impl DetectorGeometry {
    pub fn new(
        distance_mm: f64,
        pixel_size_mm: f64,
        wavelength_a: f64,
        beam_center: BeamCenter,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        let geometry = Self {
            distance_mm,
            pixel_size_mm,
            wavelength_a,
            beam_center,
            width,
            height,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("distance", self.distance_mm),
            ("pixel size", self.pixel_size_mm),
            ("wavelength", self.wavelength_a),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::InvalidParameter(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidParameter("detector has no pixels".to_string()));
        }
        Ok(())
    }

    pub fn key(&self) -> GeometryKey {
        GeometryKey(
            [
                self.distance_mm.to_bits(),
                self.pixel_size_mm.to_bits(),
                self.wavelength_a.to_bits(),
                self.beam_center.x.to_bits(),
                self.beam_center.y.to_bits(),
            ],
            self.width,
            self.height,
        )
    }

    pub fn with_distance(&self, distance_mm: f64) -> Self {
        Self { distance_mm, ..*self }
    }

    pub fn with_wavelength(&self, wavelength_a: f64) -> Self {
        Self { wavelength_a, ..*self }
    }

    pub fn with_energy_ev(&self, energy_ev: f64) -> Self {
        self.with_wavelength(ENERGY_CONV / energy_ev)
    }

    /// Moves the detector origin by `(dx, dy)` pixels along its fast and slow
    /// axes; the beam then hits `(dx, dy)` pixels earlier.
    pub fn with_shifted_center(&self, dx: f64, dy: f64) -> Self {
        Self {
            beam_center: BeamCenter::new(self.beam_center.x - dx, self.beam_center.y - dy),
            ..*self
        }
    }
}

/// Distance from the beam center, in pixels, at which Bragg spacing
/// `resolution_a` diffracts.
pub fn resolution_to_radius(resolution_a: f64, geometry: &DetectorGeometry) -> Result<f64> {
    if !(resolution_a.is_finite() && resolution_a > 0.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "resolution must be positive, got {}",
            resolution_a
        )));
    }
    let sin_theta = geometry.wavelength_a / (2.0 * resolution_a);
    if sin_theta > 1.0 {
        return Err(PipelineError::InvalidParameter(format!(
            "{} Å is beyond the {} Å diffraction limit",
            resolution_a,
            geometry.wavelength_a / 2.0
        )));
    }
    let two_theta = 2.0 * sin_theta.asin();
    Ok(two_theta.tan() * geometry.distance_mm / geometry.pixel_size_mm)
}

/// Inverse of [`resolution_to_radius`].
pub fn radius_to_resolution(radius_px: f64, geometry: &DetectorGeometry) -> Result<f64> {
    if !(radius_px.is_finite() && radius_px > 0.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "radius must be positive, got {}",
            radius_px
        )));
    }
    let two_theta = (radius_px * geometry.pixel_size_mm / geometry.distance_mm).atan();
    Ok(geometry.wavelength_a / (2.0 * (two_theta / 2.0).sin()))
}

/// Which geometry parameters vary shot to shot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotRandomization {
    pub distance: bool,
    pub wavelength: bool,
    pub center: bool,
}

impl ShotRandomization {
    pub fn any(&self) -> bool {
        self.distance || self.wavelength || self.center
    }
}

/// Draws the geometry of one shot from `base`.
pub fn randomize_geometry(
    base: &DetectorGeometry,
    randomization: &ShotRandomization,
    rng: &mut StdRng,
) -> DetectorGeometry {
    let mut shot = *base;
    if randomization.wavelength {
        let energy = rng.gen_range(ENERGY_RANGE_EV.0..ENERGY_RANGE_EV.1);
        shot = shot.with_energy_ev(energy);
    }
    if randomization.distance {
        shot = shot.with_distance(rng.gen_range(DISTANCE_RANGE_MM.0..DISTANCE_RANGE_MM.1));
    }
    if randomization.center {
        let window = (CENTER_WINDOW_MM / shot.pixel_size_mm).trunc();
        if window > 0.0 {
            let dx = rng.gen_range(-window..window);
            let dy = rng.gen_range(-window..window);
            shot = shot.with_shifted_center(dx, dy);
        }
    }
    shot
}
