//! Tensor pipeline configuration

use crate::image_pipeline::backend::BackendKind;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::compress::{CompressionParams, DEFAULT_I_MAX, JUNGFRAU_I_MAX, QuantizeTarget};
use crate::image_pipeline::downsample::DownsampleMode;
use crate::image_pipeline::quadrant::Quadrant;
use crate::image_pipeline::raw::types::BeamCenter;
use crate::image_pipeline::tensor::TensorPrecision;
use crate::image_pipeline::tiff::TiffOutputConfig;

/// Side of the square model input.
pub const CANONICAL_SIDE: usize = 512;

/// When the quadrant is cut relative to downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionOrder {
    /// Downsample the whole frame, compress, then cut the quadrant around the
    /// scaled center.
    #[default]
    DownsampleFirst,
    /// Cut a `side * factor` square around the raw-frame center, then
    /// downsample, rotate and compress only that. Cheaper on large frames.
    CropFirst,
}

/// Known detector setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorPreset {
    /// No fixed center (image center is used), factor 4
    #[default]
    Generic,
    /// Pilatus 6M: factor 2, quadrant B
    Pilatus6M,
    /// SwissFEL Jungfrau 16M: factor 4, 9.481 ADU/photon, ceiling 2^14, quadrant B
    Jungfrau16M,
}

/// Configuration for frame to tensor conversion
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub adu_per_photon: f32,
    /// Photon-count ceiling applied before the square root
    pub i_max: f32,
    pub use_sqrt: bool,
    pub target: QuantizeTarget,
    pub downsample_factor: usize,
    pub downsample_mode: DownsampleMode,
    pub quadrant: Quadrant,
    /// Output side length
    pub side: usize,
    pub precision: TensorPrecision,
    pub order: ExtractionOrder,
    /// Beam center used when a call does not supply one; `None` means image center
    pub default_center: Option<BeamCenter>,
    pub backend: BackendKind,
    pub output: TiffOutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_preset(DetectorPreset::Generic)
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn from_preset(preset: DetectorPreset) -> Self {
        let generic = Self {
            adu_per_photon: 1.0,
            i_max: DEFAULT_I_MAX,
            use_sqrt: true,
            target: QuantizeTarget::EightBit,
            downsample_factor: 4,
            downsample_mode: DownsampleMode::Max,
            quadrant: Quadrant::A,
            side: CANONICAL_SIDE,
            precision: TensorPrecision::F32,
            order: ExtractionOrder::DownsampleFirst,
            default_center: None,
            backend: BackendKind::Host,
            output: TiffOutputConfig::default(),
        };
        match preset {
            DetectorPreset::Generic => generic,
            DetectorPreset::Pilatus6M => Self {
                downsample_factor: 2,
                quadrant: Quadrant::B,
                default_center: Some(BeamCenter::new(1231.5, 1263.5)),
                ..generic
            },
            DetectorPreset::Jungfrau16M => Self {
                adu_per_photon: 9.481,
                i_max: JUNGFRAU_I_MAX,
                downsample_factor: 4,
                quadrant: Quadrant::B,
                default_center: Some(BeamCenter::new(2106.0, 2224.0)),
                ..generic
            },
        }
    }

    pub fn compression(&self) -> CompressionParams {
        CompressionParams {
            adu_per_photon: self.adu_per_photon,
            i_max: self.i_max,
            use_sqrt: self.use_sqrt,
            target: self.target,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.downsample_factor == 0 {
            return Err(PipelineError::InvalidParameter(
                "downsample factor must be at least 1".to_string(),
            ));
        }
        if self.side == 0 {
            return Err(PipelineError::InvalidParameter("quadrant side must be positive".to_string()));
        }
        self.compression().validate()
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    preset: Option<DetectorPreset>,
    adu_per_photon: Option<f32>,
    i_max: Option<f32>,
    use_sqrt: Option<bool>,
    target: Option<QuantizeTarget>,
    downsample_factor: Option<usize>,
    downsample_mode: Option<DownsampleMode>,
    quadrant: Option<Quadrant>,
    side: Option<usize>,
    precision: Option<TensorPrecision>,
    order: Option<ExtractionOrder>,
    default_center: Option<Option<BeamCenter>>,
    backend: Option<BackendKind>,
    output: Option<TiffOutputConfig>,
}

impl PipelineConfigBuilder {
    /// Starting point for every field not set explicitly
    pub fn preset(mut self, preset: DetectorPreset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub fn adu_per_photon(mut self, adu_per_photon: f32) -> Self {
        self.adu_per_photon = Some(adu_per_photon);
        self
    }

    pub fn i_max(mut self, i_max: f32) -> Self {
        self.i_max = Some(i_max);
        self
    }

    pub fn use_sqrt(mut self, enable: bool) -> Self {
        self.use_sqrt = Some(enable);
        self
    }

    pub fn target(mut self, target: QuantizeTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn downsample_factor(mut self, factor: usize) -> Self {
        self.downsample_factor = Some(factor);
        self
    }

    pub fn downsample_mode(mut self, mode: DownsampleMode) -> Self {
        self.downsample_mode = Some(mode);
        self
    }

    pub fn quadrant(mut self, quadrant: Quadrant) -> Self {
        self.quadrant = Some(quadrant);
        self
    }

    pub fn side(mut self, side: usize) -> Self {
        self.side = Some(side);
        self
    }

    pub fn precision(mut self, precision: TensorPrecision) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn order(mut self, order: ExtractionOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn default_center(mut self, center: Option<BeamCenter>) -> Self {
        self.default_center = Some(center);
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn output(mut self, output: TiffOutputConfig) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> PipelineConfig {
        let default = PipelineConfig::from_preset(self.preset.unwrap_or_default());
        PipelineConfig {
            adu_per_photon: self.adu_per_photon.unwrap_or(default.adu_per_photon),
            i_max: self.i_max.unwrap_or(default.i_max),
            use_sqrt: self.use_sqrt.unwrap_or(default.use_sqrt),
            target: self.target.unwrap_or(default.target),
            downsample_factor: self.downsample_factor.unwrap_or(default.downsample_factor),
            downsample_mode: self.downsample_mode.unwrap_or(default.downsample_mode),
            quadrant: self.quadrant.unwrap_or(default.quadrant),
            side: self.side.unwrap_or(default.side),
            precision: self.precision.unwrap_or(default.precision),
            order: self.order.unwrap_or(default.order),
            default_center: self.default_center.unwrap_or(default.default_center),
            backend: self.backend.unwrap_or(default.backend),
            output: self.output.unwrap_or(default.output),
        }
    }
}
