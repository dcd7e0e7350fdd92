use cudarc::driver::safe::*;
use cudarc::nvrtc::Ptx;
use std::sync::Arc;
use tracing::debug;

use crate::image_pipeline::backend::ComputeBackend;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::compress::{CompressionParams, QuantizeTarget};
use crate::image_pipeline::downsample::{DownsampleMode, output_dims};
use crate::image_pipeline::raw::types::{DetectorImage, DetectorMask};

const BLOCK_2D: u32 = 16;
const BLOCK_1D: u32 = 256;

fn cuda_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::CudaError(e.to_string())
}

/// CUDA pooling + compression kernels on one device stream.
pub struct DeviceBackend {
    stream: Arc<CudaStream>,
    maxpool: CudaFunction,
    meanpool: CudaFunction,
    compress: CudaFunction,
}

impl DeviceBackend {
    /// Initialize the CUDA context on `ordinal` and load the kernels
    pub fn new(ordinal: usize) -> Result<Self> {
        // PTX compiled by build.rs
        let pool_ptx = include_str!(concat!(env!("OUT_DIR"), "/maxpool_downsample.ptx"));
        let compress_ptx = include_str!(concat!(env!("OUT_DIR"), "/photon_compress.ptx"));

        let ctx = CudaContext::new(ordinal).map_err(cuda_err)?;
        let stream = ctx.default_stream();

        let pool_module = ctx.load_module(Ptx::from_src(pool_ptx)).map_err(cuda_err)?;
        let maxpool = pool_module.load_function("maxpool_downsample").map_err(cuda_err)?;
        let meanpool = pool_module.load_function("meanpool_downsample").map_err(cuda_err)?;

        let compress_module = ctx.load_module(Ptx::from_src(compress_ptx)).map_err(cuda_err)?;
        let compress = compress_module.load_function("photon_compress").map_err(cuda_err)?;

        debug!("CUDA backend ready on device {}", ordinal);
        Ok(Self { stream, maxpool, meanpool, compress })
    }
}

impl ComputeBackend for DeviceBackend {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn downsample(
        &self,
        image: &DetectorImage,
        mask: &DetectorMask,
        factor: usize,
        mode: DownsampleMode,
    ) -> Result<DetectorImage> {
        let (out_w, out_h) = output_dims(image, mask, factor)?;

        let mask_bytes: Vec<u8> = mask.data.iter().map(|&ok| ok as u8).collect();
        let mut d_img = self.stream.clone_htod(&image.data).map_err(cuda_err)?;
        let mut d_mask = self.stream.clone_htod(&mask_bytes).map_err(cuda_err)?;
        let mut d_out = self.stream.alloc_zeros::<f32>(out_w * out_h).map_err(cuda_err)?;

        let kernel = match mode {
            DownsampleMode::Max => &self.maxpool,
            DownsampleMode::Mean => &self.meanpool,
        };

        let width = image.width as i32;
        let out_width = out_w as i32;
        let out_height = out_h as i32;
        let factor_i32 = factor as i32;

        let mut launch_args = self.stream.launch_builder(kernel);
        launch_args.arg(&mut d_img);
        launch_args.arg(&mut d_mask);
        launch_args.arg(&mut d_out);
        launch_args.arg(&width);
        launch_args.arg(&out_width);
        launch_args.arg(&out_height);
        launch_args.arg(&factor_i32);

        let cfg = LaunchConfig {
            grid_dim: (
                (out_w as u32).div_ceil(BLOCK_2D),
                (out_h as u32).div_ceil(BLOCK_2D),
                1,
            ),
            block_dim: (BLOCK_2D, BLOCK_2D, 1),
            shared_mem_bytes: 0,
        };

        unsafe { launch_args.launch(cfg) }.map_err(cuda_err)?;

        let data = self.stream.clone_dtoh(&d_out).map_err(cuda_err)?;
        DetectorImage::new(out_w, out_h, data)
    }

    fn compress(&self, image: &DetectorImage, params: &CompressionParams) -> Result<DetectorImage> {
        params.validate()?;

        let n = image.data.len();
        let mut d_img = self.stream.clone_htod(&image.data).map_err(cuda_err)?;
        let mut d_out = self.stream.alloc_zeros::<f32>(n).map_err(cuda_err)?;

        let n_i32 = n as i32;
        let use_sqrt = params.use_sqrt as i32;
        let eight_bit = (params.target == QuantizeTarget::EightBit) as i32;

        let mut launch_args = self.stream.launch_builder(&self.compress);
        launch_args.arg(&mut d_img);
        launch_args.arg(&mut d_out);
        launch_args.arg(&n_i32);
        launch_args.arg(&params.adu_per_photon);
        launch_args.arg(&params.i_max);
        launch_args.arg(&use_sqrt);
        launch_args.arg(&eight_bit);

        let cfg = LaunchConfig {
            grid_dim: ((n as u32).div_ceil(BLOCK_1D), 1, 1),
            block_dim: (BLOCK_1D, 1, 1),
            shared_mem_bytes: 0,
        };

        unsafe { launch_args.launch(cfg) }.map_err(cuda_err)?;

        let data = self.stream.clone_dtoh(&d_out).map_err(cuda_err)?;
        DetectorImage::new(image.width, image.height, data)
    }
}
