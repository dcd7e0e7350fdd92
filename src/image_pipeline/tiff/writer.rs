use std::io::Write;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::tensor::BatchTensor;
use crate::image_pipeline::tiff::types::TiffOutputConfig;

pub trait TensorWriter {
    fn write_tensor(&self, tensor: &BatchTensor, output: &mut dyn Write, config: &TiffOutputConfig) -> Result<()>;
}
