use crate::image_pipeline::backend::ComputeBackend;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::compress::{CompressionParams, compress_host};
use crate::image_pipeline::downsample::{DownsampleMode, downsample_host};
use crate::image_pipeline::raw::types::{DetectorImage, DetectorMask};

/// CPU backend; parallel over rows with rayon.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostBackend;

impl HostBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn downsample(
        &self,
        image: &DetectorImage,
        mask: &DetectorMask,
        factor: usize,
        mode: DownsampleMode,
    ) -> Result<DetectorImage> {
        downsample_host(image, mask, factor, mode)
    }

    fn compress(&self, image: &DetectorImage, params: &CompressionParams) -> Result<DetectorImage> {
        compress_host(image, params)
    }
}
