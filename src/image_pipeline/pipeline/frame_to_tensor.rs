use tracing::{info, instrument};
use std::io::Write;
use std::path::Path;

use crate::image_pipeline::{
    backend::{ComputeBackend, create_backend},
    common::error::{PipelineError, Result},
    common::timing::PipelineTimings,
    pipeline::config::{ExtractionOrder, PipelineConfig},
    quadrant::{crop_mask_quadrant, crop_quadrant, extract_quadrant, rotate90},
    raw::{BeamCenter, DetectorImage, DetectorMask, FrameReader, TiffFrameReader},
    tensor::{BatchTensor, to_batch_tensor},
    tiff::{StandardTiffWriter, TensorWriter},
};

/// Detector frame to canonical `(1, 1, side, side)` model input.
pub struct FrameToTensorPipeline<R: FrameReader, W: TensorWriter, B: ComputeBackend> {
    reader: R,
    writer: W,
    backend: B,
    config: PipelineConfig,
}

impl FrameToTensorPipeline<TiffFrameReader, StandardTiffWriter, Box<dyn ComputeBackend>> {
    /// TIFF in, TIFF out, on the backend named by `config.backend`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(config.backend)?;
        info!(backend = backend.name(), "Tensor pipeline backend ready");
        Ok(Self {
            reader: TiffFrameReader,
            writer: StandardTiffWriter,
            backend,
            config,
        })
    }
}

impl<R: FrameReader, W: TensorWriter, B: ComputeBackend> FrameToTensorPipeline<R, W, B> {
    pub fn with_custom(reader: R, writer: W, backend: B, config: PipelineConfig) -> Self {
        Self {
            reader,
            writer,
            backend,
            config,
        }
    }

    /// Runs the transform chain on an in-memory frame. `center` overrides the
    /// configured default; it is given in the raw frame's pixel coordinates.
    pub fn process(
        &self,
        image: &DetectorImage,
        mask: &DetectorMask,
        center: Option<BeamCenter>,
    ) -> Result<BatchTensor> {
        self.process_with_timings(image, mask, center).map(|(tensor, _)| tensor)
    }

    #[instrument(skip(self, image, mask), fields(width = image.width, height = image.height))]
    pub fn process_with_timings(
        &self,
        image: &DetectorImage,
        mask: &DetectorMask,
        center: Option<BeamCenter>,
    ) -> Result<(BatchTensor, PipelineTimings)> {
        let cfg = &self.config;
        cfg.validate()?;
        image.ensure_shape(mask.dims())?;

        let mut timings = PipelineTimings::new();
        let params = cfg.compression();
        let factor = cfg.downsample_factor;
        let center = center
            .or(cfg.default_center)
            .unwrap_or_else(|| BeamCenter::of_image(image.width, image.height));

        info!(
            quadrant = %cfg.quadrant,
            factor,
            center_x = center.x,
            center_y = center.y,
            order = ?cfg.order,
            "Converting frame to tensor"
        );

        let quad = match cfg.order {
            ExtractionOrder::DownsampleFirst => {
                let small = {
                    let _span = tracing::info_span!("downsample", factor).entered();
                    timings.time("downsample", || {
                        self.backend.downsample(image, mask, factor, cfg.downsample_mode)
                    })?
                };
                let compressed = {
                    let _span = tracing::info_span!("compress").entered();
                    timings.time("compress", || self.backend.compress(&small, &params))?
                };
                let _span = tracing::info_span!("extract_quadrant").entered();
                let scaled_center = center.scaled(factor).rounded()?;
                timings.time("extract_quadrant", || {
                    extract_quadrant(&compressed, scaled_center, cfg.quadrant, cfg.side)
                })?
            }
            ExtractionOrder::CropFirst => {
                let raw_center = center.rounded()?;
                let raw_side = cfg.side * factor;
                let (sub, submask) = {
                    let _span = tracing::info_span!("crop_quadrant", raw_side).entered();
                    timings.time("crop_quadrant", || -> Result<_> {
                        Ok((
                            crop_quadrant(image, raw_center, cfg.quadrant, raw_side)?,
                            crop_mask_quadrant(mask, raw_center, cfg.quadrant, raw_side)?,
                        ))
                    })?
                };
                let small = {
                    let _span = tracing::info_span!("downsample", factor).entered();
                    timings.time("downsample", || {
                        self.backend.downsample(&sub, &submask, factor, cfg.downsample_mode)
                    })?
                };
                let rotated = timings.time("rotate", || rotate90(&small, cfg.quadrant.rotation()));
                let _span = tracing::info_span!("compress").entered();
                timings.time("compress", || self.backend.compress(&rotated, &params))?
            }
        };

        let tensor = {
            let _span = tracing::info_span!("to_batch_tensor").entered();
            timings.time("to_batch_tensor", || to_batch_tensor(&quad, cfg.precision))?
        };
        tensor.ensure_canonical(cfg.side)?;

        timings.log_summary();

        info!(
            shape = ?tensor.shape(),
            ms = timings.total_duration().as_secs_f64() * 1000.0,
            "Tensor ready"
        );
        Ok((tensor, timings))
    }

    /// Decodes a frame (and optional mask), converts it and writes the tensor.
    /// Without a mask, negative pixels are treated as invalid.
    #[instrument(skip(self, frame_data, mask_data, output), fields(input_size = frame_data.len()))]
    pub fn convert(
        &self,
        frame_data: &[u8],
        mask_data: Option<&[u8]>,
        output: &mut dyn Write,
    ) -> Result<BatchTensor> {
        let image = {
            let _span = tracing::info_span!("decode_frame").entered();
            self.reader.read_frame(frame_data)?
        };

        let mask = match mask_data {
            Some(bytes) => {
                let _span = tracing::info_span!("decode_mask").entered();
                self.reader.read_mask(bytes)?
            }
            None => DetectorMask::from_valid_pixels(&image),
        };

        let tensor = self.process(&image, &mask, None)?;

        {
            let _span = tracing::info_span!("encode_tiff").entered();
            self.writer.write_tensor(&tensor, output, &self.config.output)?;
        }

        Ok(tensor)
    }

    #[instrument(skip(self, input_path, mask_path, output_path))]
    pub fn convert_file<P: AsRef<Path>, M: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        mask_path: Option<M>,
        output_path: Q,
    ) -> Result<BatchTensor> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Converting file"
        );

        let input_data = read_file(input_path)?;
        let mask_data = match mask_path {
            Some(path) => Some(read_file(path.as_ref())?),
            None => None,
        };

        let mut output_file = {
            let _span = tracing::info_span!("create_output_file").entered();
            std::fs::File::create(output_path).map_err(|e| {
                PipelineError::OutputWriteError(format!("{}: {}", output_path.display(), e))
            })?
        };

        self.convert(&input_data, mask_data.as_deref(), &mut output_file)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let _span = tracing::info_span!("read_input_file").entered();
    std::fs::read(path)
        .map_err(|e| PipelineError::InputReadError(format!("{}: {}", path.display(), e)))
}
