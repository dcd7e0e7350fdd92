//! Geometry-keyed cache of the background layers that do not change
//! between shots at a fixed geometry.

use std::sync::Arc;

use tracing::debug;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::types::DetectorImage;
use crate::image_pipeline::simulate::engine::DiffractionEngine;
use crate::image_pipeline::simulate::geometry::{DetectorGeometry, GeometryKey};

#[derive(Debug, Clone)]
pub struct FixedLayers {
    pub air_and_water: DetectorImage,
    pub stol: DetectorImage,
}

impl FixedLayers {
    pub fn compute<E: DiffractionEngine + ?Sized>(engine: &E, geometry: &DetectorGeometry) -> Result<Self> {
        let air_and_water = engine.air_and_water(geometry)?;
        let stol = engine.stol_map(geometry)?;
        air_and_water.ensure_shape((geometry.width, geometry.height))?;
        stol.ensure_shape((geometry.width, geometry.height))?;
        Ok(Self { air_and_water, stol })
    }
}

/// Holds the layers of one geometry; asking for another geometry replaces them.
#[derive(Debug, Default)]
pub struct BackgroundCache {
    entry: Option<(GeometryKey, Arc<FixedLayers>)>,
    computations: usize,
}

impl BackgroundCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute<E: DiffractionEngine + ?Sized>(
        &mut self,
        engine: &E,
        geometry: &DetectorGeometry,
    ) -> Result<Arc<FixedLayers>> {
        let key = geometry.key();
        if let Some((cached, layers)) = &self.entry {
            if *cached == key {
                return Ok(Arc::clone(layers));
            }
        }

        debug!("Computing fixed background layers for {:?}", key);
        let layers = Arc::new(FixedLayers::compute(engine, geometry)?);
        self.computations += 1;
        self.entry = Some((key, Arc::clone(&layers)));
        Ok(layers)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_cached(&self, geometry: &DetectorGeometry) -> bool {
        matches!(&self.entry, Some((key, _)) if *key == geometry.key())
    }

    /// Number of times layers were rendered.
    pub fn computations(&self) -> usize {
        self.computations
    }
}
