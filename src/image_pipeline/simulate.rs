//! Synthetic training shots: geometry, background layers, noise and composition.

pub mod background;
pub mod composer;
pub mod engine;
pub mod geometry;
pub mod noise;
pub mod simulator;

#[cfg(test)]
mod tests;

pub use background::{BackgroundCache, FixedLayers};
pub use composer::{BACKGROUND_SCALES, compose, compose_deterministic};
pub use engine::{DiffractionEngine, LatticePerturbation, ResolutionFalloff};
pub use geometry::{
    DetectorGeometry, GeometryKey, ShotRandomization, radius_to_resolution, randomize_geometry,
    resolution_to_radius,
};
pub use noise::{NoNoise, NoiseModel, PoissonNoise};
pub use simulator::{ShotSimulator, SimulatedParams, SimulationConfig, SimulationConfigBuilder};
