//! Single-channel batch tensors in the `(1, 1, side, side)` layout the model consumes.

use half::f16;
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::DetectorImage;

/// Element type of the adapted tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorPrecision {
    #[default]
    F32,
    /// Each value rounded to the nearest half-precision float
    F16,
    /// Quantized intermediate, valid only for integer values in `0..=255`
    U8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F16(Vec<f16>),
    U8(Vec<u8>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F16(v) => v.len(),
            TensorData::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn precision(&self) -> TensorPrecision {
        match self {
            TensorData::F32(_) => TensorPrecision::F32,
            TensorData::F16(_) => TensorPrecision::F16,
            TensorData::U8(_) => TensorPrecision::U8,
        }
    }

    /// Values widened to `f32`, whatever the stored precision.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            TensorData::F32(v) => v.clone(),
            TensorData::F16(v) => v.iter().map(|h| h.to_f32()).collect(),
            TensorData::U8(v) => v.iter().map(|&b| f32::from(b)).collect(),
        }
    }
}

/// Owned `(batch, channel, height, width)` tensor with batch = channel = 1.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTensor {
    shape: [usize; 4],
    data: TensorData,
}

impl BatchTensor {
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn side(&self) -> usize {
        self.shape[3]
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_data(self) -> TensorData {
        self.data
    }

    /// Fails unless the tensor is exactly `(1, 1, side, side)`.
    pub fn ensure_canonical(&self, side: usize) -> Result<()> {
        let [b, c, h, w] = self.shape;
        if b != 1 || c != 1 || h != side || w != side || self.data.len() != side * side {
            return Err(PipelineError::shape_mismatch((side, side), (w, h)));
        }
        Ok(())
    }

    /// Plane view as a frame, widened to `f32`.
    pub fn to_image(&self) -> DetectorImage {
        DetectorImage {
            width: self.shape[3],
            height: self.shape[2],
            data: self.data.to_f32(),
        }
    }
}

/// Copies a square frame into a fresh `(1, 1, side, side)` tensor.
pub fn to_batch_tensor(image: &DetectorImage, precision: TensorPrecision) -> Result<BatchTensor> {
    if image.width != image.height {
        return Err(PipelineError::shape_mismatch(
            (image.width, image.width),
            image.dims(),
        ));
    }
    let side = image.width;
    debug!("Adapting {}x{} frame to {:?} batch tensor", side, side, precision);

    let data = match precision {
        TensorPrecision::F32 => TensorData::F32(image.data.clone()),
        TensorPrecision::F16 => TensorData::F16(image.data.iter().map(|&v| f16::from_f32(v)).collect()),
        TensorPrecision::U8 => {
            let mut bytes = Vec::with_capacity(image.data.len());
            for &v in &image.data {
                if !(0.0..=255.0).contains(&v) || v.fract() != 0.0 {
                    return Err(PipelineError::InvalidParameter(format!(
                        "value {} is not representable as an 8-bit intensity",
                        v
                    )));
                }
                bytes.push(v as u8);
            }
            TensorData::U8(bytes)
        }
    };

    Ok(BatchTensor {
        shape: [1, 1, side, side],
        data,
    })
}
