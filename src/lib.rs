//! Diffraction image preparation: detector frames to canonical model tensors,
//! and composition of simulated noisy diffraction shots.

pub mod image_pipeline;
pub mod logger;
