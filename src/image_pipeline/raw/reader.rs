use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::types::{DetectorImage, DetectorMask};

pub trait FrameReader {
    fn read_frame(&self, data: &[u8]) -> Result<DetectorImage>;

    /// Nonzero pixels are valid.
    fn read_mask(&self, data: &[u8]) -> Result<DetectorMask> {
        let frame = self.read_frame(data)?;
        let valid = frame.data.iter().map(|&v| v != 0.0).collect();
        DetectorMask::new(frame.width, frame.height, valid)
    }
}
