//! Detector frame module
//!
//! Frame, mask and beam center types, plus format readers.

mod reader;
mod tiff_reader;
pub mod types;

pub use reader::FrameReader;
pub use tiff_reader::TiffFrameReader;
pub use types::{BeamCenter, DetectorImage, DetectorMask};
