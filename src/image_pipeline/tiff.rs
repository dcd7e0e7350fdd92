//! TIFF writing module
//!
//! Writes canonical tensors to TIFF for inspection and dataset export.

mod writer;
mod standard_tiff_writer;
pub mod types;

pub use writer::TensorWriter;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{TiffCompression, TiffOutputConfig};
