use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Shape mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Crop rows [{row_start}, {row_end}) cols [{col_start}, {col_end}) exceed image {width}x{height}")]
    OutOfBounds {
        row_start: i64,
        row_end: i64,
        col_start: i64,
        col_end: i64,
        width: usize,
        height: usize,
    },

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode TIFF frame: {0}")]
    DecodeError(String),

    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("CUDA error: {0}")]
    CudaError(String),

    #[error("Compute backend not available on this build: {0}")]
    BackendUnavailable(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn shape_mismatch(expected: (usize, usize), got: (usize, usize)) -> Self {
        PipelineError::ShapeMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            width: got.0,
            height: got.1,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
