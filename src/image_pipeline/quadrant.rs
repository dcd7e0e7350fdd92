//! Quadrant crop and rotation.
//!
//! Each quadrant is a `side x side` square touching the beam center. After the
//! crop it is rotated counter-clockwise by a fixed number of quarter turns so
//! that the pixel next to the beam center always ends up at output `(0, 0)`.
//! A single model then sees all four quadrants as the same view.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::{DetectorImage, DetectorMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quadrant {
    /// Up-left of the beam
    #[default]
    A,
    /// Up-right
    B,
    /// Down-left
    C,
    /// Down-right, already canonical
    D,
}

/// Half-open pixel ranges of a crop, in signed coordinates so out-of-range
/// requests can be reported as they were asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub row_start: i64,
    pub row_end: i64,
    pub col_start: i64,
    pub col_end: i64,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::A, Quadrant::B, Quadrant::C, Quadrant::D];

    /// Counter-clockwise quarter turns applied after the crop.
    pub fn rotation(self) -> u8 {
        match self {
            Quadrant::A => 2,
            Quadrant::B => 3,
            Quadrant::C => 1,
            Quadrant::D => 0,
        }
    }

    pub fn window(self, center: (i64, i64), side: usize) -> CropWindow {
        let (x, y) = center;
        let s = i64::try_from(side).unwrap_or(i64::MAX);
        // saturated edges always fail the bounds check
        let (row_start, row_end) = match self {
            Quadrant::A | Quadrant::B => (y.saturating_sub(s), y),
            Quadrant::C | Quadrant::D => (y, y.saturating_add(s)),
        };
        let (col_start, col_end) = match self {
            Quadrant::A | Quadrant::C => (x.saturating_sub(s), x),
            Quadrant::B | Quadrant::D => (x, x.saturating_add(s)),
        };
        CropWindow { row_start, row_end, col_start, col_end }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Quadrant::A => "A",
            Quadrant::B => "B",
            Quadrant::C => "C",
            Quadrant::D => "D",
        };
        f.write_str(label)
    }
}

impl FromStr for Quadrant {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Quadrant::A),
            "B" => Ok(Quadrant::B),
            "C" => Ok(Quadrant::C),
            "D" => Ok(Quadrant::D),
            other => Err(PipelineError::InvalidParameter(format!(
                "unknown quadrant label '{}', expected one of A, B, C, D",
                other
            ))),
        }
    }
}

impl CropWindow {
    fn checked(&self, width: usize, height: usize) -> Result<(usize, usize, usize, usize)> {
        let in_bounds = self.row_start >= 0
            && self.col_start >= 0
            && self.row_end <= height as i64
            && self.col_end <= width as i64;
        if !in_bounds {
            return Err(PipelineError::OutOfBounds {
                row_start: self.row_start,
                row_end: self.row_end,
                col_start: self.col_start,
                col_end: self.col_end,
                width,
                height,
            });
        }
        Ok((
            self.row_start as usize,
            self.row_end as usize,
            self.col_start as usize,
            self.col_end as usize,
        ))
    }
}

fn crop_plane<T: Copy>(data: &[T], width: usize, rows: (usize, usize), cols: (usize, usize)) -> Vec<T> {
    let mut out = Vec::with_capacity((rows.1 - rows.0) * (cols.1 - cols.0));
    for row in rows.0..rows.1 {
        let start = row * width;
        out.extend_from_slice(&data[start + cols.0..start + cols.1]);
    }
    out
}

/// Crops the quadrant window without rotating it.
pub fn crop_quadrant(
    image: &DetectorImage,
    center: (i64, i64),
    quadrant: Quadrant,
    side: usize,
) -> Result<DetectorImage> {
    if side == 0 {
        return Err(PipelineError::InvalidParameter("quadrant side must be positive".to_string()));
    }
    let (r0, r1, c0, c1) = quadrant.window(center, side).checked(image.width, image.height)?;
    DetectorImage::new(side, side, crop_plane(&image.data, image.width, (r0, r1), (c0, c1)))
}

/// Mask counterpart of [`crop_quadrant`].
pub fn crop_mask_quadrant(
    mask: &DetectorMask,
    center: (i64, i64),
    quadrant: Quadrant,
    side: usize,
) -> Result<DetectorMask> {
    if side == 0 {
        return Err(PipelineError::InvalidParameter("quadrant side must be positive".to_string()));
    }
    let (r0, r1, c0, c1) = quadrant.window(center, side).checked(mask.width, mask.height)?;
    DetectorMask::new(side, side, crop_plane(&mask.data, mask.width, (r0, r1), (c0, c1)))
}

/// Rotates counter-clockwise by `k` quarter turns, like `numpy.rot90(m, k)`.
pub fn rotate90(image: &DetectorImage, k: u8) -> DetectorImage {
    let (w, h) = image.dims();
    match k % 4 {
        0 => image.clone(),
        1 => {
            // out[i][j] = in[j][w-1-i], output is h wide and w tall
            let mut out = DetectorImage::zeros(h, w);
            for i in 0..w {
                for j in 0..h {
                    out.set(i, j, image.get(j, w - 1 - i));
                }
            }
            out
        }
        2 => {
            let mut data = image.data.clone();
            data.reverse();
            DetectorImage { width: w, height: h, data }
        }
        _ => {
            // out[i][j] = in[h-1-j][i]
            let mut out = DetectorImage::zeros(h, w);
            for i in 0..w {
                for j in 0..h {
                    out.set(i, j, image.get(h - 1 - j, i));
                }
            }
            out
        }
    }
}

/// Crops `quadrant` around the integer `center` and rotates it to the
/// canonical orientation. `center` must already be in this image's frame.
pub fn extract_quadrant(
    image: &DetectorImage,
    center: (i64, i64),
    quadrant: Quadrant,
    side: usize,
) -> Result<DetectorImage> {
    debug!(
        "Extracting quadrant {} (side {}) around ({}, {}) of {}x{}",
        quadrant, side, center.0, center.1, image.width, image.height
    );
    let crop = crop_quadrant(image, center, quadrant, side)?;
    Ok(rotate90(&crop, quadrant.rotation()))
}
