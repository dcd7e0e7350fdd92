use std::collections::HashMap;

use diffprep_rs::image_pipeline::{FrameReader, TiffFrameReader};

fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "output.tiff".to_string());
    let bytes = std::fs::read(&path)?;
    let image = TiffFrameReader.read_frame(&bytes)?;

    println!("Image: {}x{} pixels", image.width, image.height);

    let mut counts: HashMap<u32, u64> = HashMap::new();
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut non_integer = 0u64;
    for &v in &image.data {
        if v.fract() != 0.0 {
            non_integer += 1;
        }
        *counts.entry(v.to_bits()).or_insert(0) += 1;
        min = min.min(v);
        max = max.max(v);
    }

    let total = image.data.len() as f64;
    println!("  Range: {} - {}", min, max);
    println!("  Unique values: {}", counts.len());
    println!("  Effective bits: {:.2}", (counts.len() as f64).log2());
    println!("  Non-integer pixels: {}", non_integer);

    let zeros = counts.get(&0f32.to_bits()).copied().unwrap_or(0);
    let saturated = counts.get(&max.to_bits()).copied().unwrap_or(0);
    println!("\nZero pixels: {} ({:.2}%)", zeros, zeros as f64 / total * 100.0);
    println!("Pixels at maximum ({}): {} ({:.2}%)", max, saturated, saturated as f64 / total * 100.0);

    Ok(())
}
