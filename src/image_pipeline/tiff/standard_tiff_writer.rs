use std::io::Write;
use tracing::debug;
use crate::image_pipeline::common::error::{Result, PipelineError};
use crate::image_pipeline::tensor::{BatchTensor, TensorData};
use crate::image_pipeline::tiff::types::{TiffCompression, TiffOutputConfig};
use crate::image_pipeline::tiff::writer::TensorWriter;

/// Writes the tensor plane as a single-page grayscale TIFF.
///
/// `F32` and `F16` tensors become Gray32Float, `U8` tensors Gray8.
pub struct StandardTiffWriter;

impl TensorWriter for StandardTiffWriter {
    fn write_tensor(&self, tensor: &BatchTensor, output: &mut dyn Write, config: &TiffOutputConfig) -> Result<()> {
        let [_, _, height, width] = tensor.shape();
        debug!("Encoding tensor plane as TIFF: {}x{}", width, height);

        let mut buffer = Vec::new();

        let compression = match config.compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Balanced),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Best),
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => tiff::tags::Predictor::Horizontal,
                _ => tiff::tags::Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        match tensor.data() {
            TensorData::U8(bytes) => encoder.write_image::<tiff::encoder::colortype::Gray8>(
                width as u32,
                height as u32,
                bytes,
            ),
            other => encoder.write_image::<tiff::encoder::colortype::Gray32Float>(
                width as u32,
                height as u32,
                &other.to_f32(),
            ),
        }
        .map_err(|e| PipelineError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::raw::{FrameReader, TiffFrameReader};
    use crate::image_pipeline::raw::types::DetectorImage;
    use crate::image_pipeline::tensor::{TensorPrecision, to_batch_tensor};

    fn plane() -> DetectorImage {
        DetectorImage::new(4, 4, (0..16).map(|v| (v * 13 % 256) as f32).collect()).unwrap()
    }

    fn write(tensor: &BatchTensor, config: &TiffOutputConfig) -> Vec<u8> {
        let mut out = Vec::new();
        StandardTiffWriter.write_tensor(tensor, &mut out, config).unwrap();
        out
    }

    #[test]
    fn float_tensor_reads_back() {
        let image = plane();
        let tensor = to_batch_tensor(&image, TensorPrecision::F32).unwrap();
        let bytes = write(&tensor, &TiffOutputConfig::default());
        assert_eq!(TiffFrameReader.read_frame(&bytes).unwrap(), image);
    }

    #[test]
    fn byte_tensor_reads_back() {
        let image = plane();
        let tensor = to_batch_tensor(&image, TensorPrecision::U8).unwrap();
        let bytes = write(&tensor, &TiffOutputConfig::default());
        assert_eq!(TiffFrameReader.read_frame(&bytes).unwrap(), image);
    }

    #[test]
    fn compressed_output_reads_back() {
        let image = plane();
        let tensor = to_batch_tensor(&image, TensorPrecision::U8).unwrap();
        for compression in [TiffCompression::Lzw, TiffCompression::DeflateBest] {
            let config = TiffOutputConfig { compression, predictor: Some(2) };
            let bytes = write(&tensor, &config);
            assert_eq!(TiffFrameReader.read_frame(&bytes).unwrap(), image);
        }
    }
}
