//! Detector frame reader for single-channel TIFF files.
//!
//! Photon-counting detectors (Pilatus, Eiger) write signed 32-bit frames with
//! negative sentinels in module gaps; integrating detectors and converted
//! datasets use 16-bit unsigned or 32-bit float. All are widened to `f32`.

use std::io::Cursor;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::reader::FrameReader;
use crate::image_pipeline::raw::types::DetectorImage;

pub struct TiffFrameReader;

impl FrameReader for TiffFrameReader {
    fn read_frame(&self, data: &[u8]) -> Result<DetectorImage> {
        debug!("Decoding TIFF frame, {} bytes", data.len());

        let mut decoder = Decoder::new(Cursor::new(data))
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        let color = decoder
            .colortype()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;
        if !matches!(color, ColorType::Gray(_)) {
            return Err(PipelineError::UnsupportedFormat(format!(
                "detector frames must be single channel, got {:?}",
                color
            )));
        }

        let decoded = decoder
            .read_image()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        let pixels: Vec<f32> = match decoded {
            DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(|p| p as f32).collect(),
            DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(|p| p as f32).collect(),
            DecodingResult::F32(v) => v,
            DecodingResult::F64(v) => v.into_iter().map(|p| p as f32).collect(),
            _ => {
                return Err(PipelineError::UnsupportedFormat(
                    "unsupported TIFF sample format".to_string(),
                ));
            }
        };

        debug!("Decoded frame: {}x{}", width, height);

        DetectorImage::new(width as usize, height as usize, pixels)
    }
}
