//! Detector frame data types

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Single-panel detector frame, row-major.
///
/// Integer detector counts are widened to `f32` on read. Transforms never
/// modify a frame in place; each returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorImage {
    /// Width of the frame in pixels (fast axis)
    pub width: usize,
    /// Height of the frame in pixels (slow axis)
    pub height: usize,
    /// Pixel intensities, `height * width` values
    pub data: Vec<f32>,
}

impl DetectorImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(PipelineError::InvalidParameter(format!(
                "{} values cannot fill a {}x{} frame",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.width + col] = value;
    }

    /// Fails with `ShapeMismatch` unless `other` has exactly this frame's dimensions.
    pub fn ensure_shape(&self, other: (usize, usize)) -> Result<()> {
        if self.dims() != other {
            return Err(PipelineError::shape_mismatch(self.dims(), other));
        }
        Ok(())
    }
}

/// Largest accepted center coordinate; integers up to here are exact in `f64`.
const MAX_CENTER_COORD: f64 = (1u64 << 53) as f64;

/// Valid-pixel mask. `true` marks a pixel that contributes; beamstop shadow,
/// module gaps and hot pixels are `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl DetectorMask {
    pub fn new(width: usize, height: usize, data: Vec<bool>) -> Result<Self> {
        if data.len() != width * height {
            return Err(PipelineError::InvalidParameter(format!(
                "{} mask values cannot fill a {}x{} frame",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn all_valid(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![true; width * height],
        }
    }

    /// Negative counts are gap / bad-pixel sentinels on photon-counting detectors.
    pub fn from_valid_pixels(image: &DetectorImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            data: image.data.iter().map(|&v| v >= 0.0).collect(),
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data[row * self.width + col]
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// Beam center in pixel coordinates of the frame it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamCenter {
    /// Fast-axis coordinate
    pub x: f64,
    /// Slow-axis coordinate
    pub y: f64,
}

impl BeamCenter {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Image center, `(W/2, H/2)` floored.
    pub fn of_image(width: usize, height: usize) -> Self {
        Self {
            x: (width / 2) as f64,
            y: (height / 2) as f64,
        }
    }

    /// Center in the frame of an image downsampled by `factor`.
    pub fn scaled(&self, factor: usize) -> Self {
        Self {
            x: self.x / factor as f64,
            y: self.y / factor as f64,
        }
    }

    /// Integer pixel center, ties rounded to even. Non-finite or
    /// unrepresentable coordinates are rejected.
    pub fn rounded(&self) -> Result<(i64, i64)> {
        let round = |v: f64| -> Result<i64> {
            let r = v.round_ties_even();
            if !r.is_finite() || r.abs() > MAX_CENTER_COORD {
                return Err(PipelineError::InvalidParameter(format!(
                    "beam center ({}, {}) is not a usable pixel position",
                    self.x, self.y
                )));
            }
            Ok(r as i64)
        };
        Ok((round(self.x)?, round(self.y)?))
    }
}
