//! Diffraction image preparation pipeline
//!
//! Detector frames are downsampled, compressed to photon-count intensities,
//! cut into a rotated beam-center quadrant and handed out as `(1, 1, side, side)`
//! tensors. The `simulate` module produces labelled synthetic frames for the
//! same path.

pub mod common;
pub mod raw;
pub mod tiff;
pub mod downsample;
pub mod compress;
pub mod quadrant;
pub mod tensor;
pub mod backend;
pub mod pipeline;
pub mod simulate;

pub use common::{
    PipelineError,
    PipelineTimings,
    Result,
};

pub use raw::{
    BeamCenter,
    DetectorImage,
    DetectorMask,
    FrameReader,
    TiffFrameReader,
};

pub use tiff::{
    StandardTiffWriter,
    TensorWriter,
    TiffCompression,
    TiffOutputConfig,
};

pub use downsample::{DownsampleMode, downsample_host};
pub use compress::{CompressionParams, QuantizeTarget, compress_host};
pub use quadrant::{Quadrant, extract_quadrant, rotate90};
pub use tensor::{BatchTensor, TensorData, TensorPrecision, to_batch_tensor};

pub use backend::{
    BackendKind,
    ComputeBackend,
    HostBackend,
    create_backend,
};

pub use pipeline::{
    DetectorPreset,
    ExtractionOrder,
    FrameToTensorPipeline,
    PipelineConfig,
    PipelineConfigBuilder,
};

pub use simulate::{
    DetectorGeometry,
    NoiseModel,
    ShotSimulator,
    SimulatedParams,
    SimulationConfig,
};
