//! Compute backends for the array transforms.
//!
//! The host backend runs on the CPU with rayon; the device backend runs the
//! same transforms as CUDA kernels. Which one is used is decided by
//! [`BackendKind`] in the configuration, never by the data passed in. Both
//! produce identical values for identical inputs.

pub mod cpu_backend;
#[cfg(cuda_backend)]
pub mod cuda_backend;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::compress::CompressionParams;
use crate::image_pipeline::downsample::DownsampleMode;
use crate::image_pipeline::raw::types::{DetectorImage, DetectorMask};

pub use cpu_backend::HostBackend;
#[cfg(cuda_backend)]
pub use cuda_backend::DeviceBackend;

pub trait ComputeBackend {
    fn name(&self) -> &'static str;

    fn downsample(
        &self,
        image: &DetectorImage,
        mask: &DetectorMask,
        factor: usize,
        mode: DownsampleMode,
    ) -> Result<DetectorImage>;

    fn compress(&self, image: &DetectorImage, params: &CompressionParams) -> Result<DetectorImage>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn downsample(
        &self,
        image: &DetectorImage,
        mask: &DetectorMask,
        factor: usize,
        mode: DownsampleMode,
    ) -> Result<DetectorImage> {
        (**self).downsample(image, mask, factor, mode)
    }

    fn compress(&self, image: &DetectorImage, params: &CompressionParams) -> Result<DetectorImage> {
        (**self).compress(image, params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Host,
    /// CUDA device by ordinal
    Device(usize),
}

// Placeholder when the crate was built without CUDA
#[cfg(not(cuda_backend))]
pub struct DeviceBackend;

#[cfg(not(cuda_backend))]
impl DeviceBackend {
    pub fn new(_ordinal: usize) -> Result<Self> {
        Err(crate::image_pipeline::common::error::PipelineError::BackendUnavailable(
            "CUDA support was not compiled in (build with DIFFPREP_CUDA=1)",
        ))
    }
}

#[cfg(not(cuda_backend))]
impl ComputeBackend for DeviceBackend {
    fn name(&self) -> &'static str {
        "cuda (unavailable)"
    }

    fn downsample(
        &self,
        _image: &DetectorImage,
        _mask: &DetectorMask,
        _factor: usize,
        _mode: DownsampleMode,
    ) -> Result<DetectorImage> {
        Err(crate::image_pipeline::common::error::PipelineError::BackendUnavailable("cuda"))
    }

    fn compress(&self, _image: &DetectorImage, _params: &CompressionParams) -> Result<DetectorImage> {
        Err(crate::image_pipeline::common::error::PipelineError::BackendUnavailable("cuda"))
    }
}

/// Builds the backend named by `kind`.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn ComputeBackend>> {
    match kind {
        BackendKind::Host => Ok(Box::new(HostBackend::new())),
        BackendKind::Device(ordinal) => Ok(Box::new(DeviceBackend::new(ordinal)?)),
    }
}
