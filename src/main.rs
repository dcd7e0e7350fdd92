use std::path::PathBuf;

use anyhow::{Context, bail};
use diffprep_rs::image_pipeline::{ComputeBackend, DetectorPreset, FrameToTensorPipeline, PipelineConfig};
use diffprep_rs::logger;

use tracing::info;

const USAGE: &str = "usage: diffprep <frame.tiff> [mask.tiff] [out.tiff]";

fn preset_from_env() -> anyhow::Result<DetectorPreset> {
    match std::env::var("DIFFPREP_PRESET") {
        Err(_) => Ok(DetectorPreset::Generic),
        Ok(name) => match name.trim().to_ascii_lowercase().as_str() {
            "" | "generic" => Ok(DetectorPreset::Generic),
            "pilatus" | "pilatus6m" => Ok(DetectorPreset::Pilatus6M),
            "jungfrau" | "jungfrau16m" => Ok(DetectorPreset::Jungfrau16M),
            other => bail!("unknown DIFFPREP_PRESET {:?}", other),
        },
    }
}

fn main() -> anyhow::Result<()> {
    logger::init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let Some(input) = args.next() else {
        bail!(USAGE);
    };
    let mask = args.next();
    let output = args.next().unwrap_or_else(|| input.with_extension("tensor.tiff"));
    if args.next().is_some() {
        bail!(USAGE);
    }

    let preset = preset_from_env()?;
    let config = PipelineConfig::builder().preset(preset).build();
    let pipeline = FrameToTensorPipeline::new(config).context("failed to set up pipeline")?;

    info!("Frame to tensor pipeline initialized");
    info!("Preset: {:?}", preset);
    info!("Backend: {}", pipeline.backend().name());
    info!(
        "Downsample x{} ({:?}), quadrant {}, side {}",
        pipeline.config().downsample_factor,
        pipeline.config().downsample_mode,
        pipeline.config().quadrant,
        pipeline.config().side
    );

    let tensor = pipeline
        .convert_file(&input, mask.as_ref(), &output)
        .with_context(|| format!("failed to convert {}", input.display()))?;

    info!(
        "Wrote {:?} tensor to {}",
        tensor.shape(),
        output.display()
    );
    Ok(())
}
