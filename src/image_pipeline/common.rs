//! Common utilities module
//!
//! Error types and step timing shared by the transforms, the pipeline and the simulator.

pub mod error;
pub mod timing;

pub use error::{PipelineError, Result};
pub use timing::{PipelineTimings, StepTiming, Timer};
