//! Frame to tensor orchestration
//!
//! One configurable pipeline covers every detector setup; presets carry the
//! per-detector constants.

mod config;
mod frame_to_tensor;


pub use config::{CANONICAL_SIDE, DetectorPreset, ExtractionOrder, PipelineConfig, PipelineConfigBuilder};
pub use frame_to_tensor::FrameToTensorPipeline;
