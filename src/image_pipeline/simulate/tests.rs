use super::*;
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raw::types::{BeamCenter, DetectorImage};
use rand::Rng;
use rand::rngs::StdRng;
use std::cell::{Cell, RefCell};

struct MockEngine {
    air: f32,
    plastic: f32,
    bfac: f32,
    nominal_spots: f32,
    plastic_shape: Option<(usize, usize)>,
    background_renders: Cell<usize>,
    lattices: RefCell<Vec<Option<LatticePerturbation>>>,
    plastic_requests: RefCell<Vec<String>>,
}

impl MockEngine {
    fn new(air: f32, plastic: f32, bfac: f32, nominal_spots: f32) -> Self {
        Self {
            air,
            plastic,
            bfac,
            nominal_spots,
            plastic_shape: None,
            background_renders: Cell::new(0),
            lattices: RefCell::new(Vec::new()),
            plastic_requests: RefCell::new(Vec::new()),
        }
    }
}

impl DiffractionEngine for MockEngine {
    fn air_and_water(&self, geometry: &DetectorGeometry) -> Result<DetectorImage> {
        self.background_renders.set(self.background_renders.get() + 1);
        Ok(DetectorImage::filled(geometry.width, geometry.height, self.air))
    }

    fn stol_map(&self, geometry: &DetectorGeometry) -> Result<DetectorImage> {
        Ok(DetectorImage::filled(geometry.width, geometry.height, 0.1))
    }

    fn plastic_background(&self, geometry: &DetectorGeometry, candidate: &str) -> Result<DetectorImage> {
        self.plastic_requests.borrow_mut().push(candidate.to_string());
        let (w, h) = self.plastic_shape.unwrap_or((geometry.width, geometry.height));
        Ok(DetectorImage::filled(w, h, self.plastic))
    }

    fn resolution_falloff(&self, stol: &DetectorImage, rng: &mut StdRng) -> Result<ResolutionFalloff> {
        Ok(ResolutionFalloff {
            resolution: rng.gen_range(1.5..4.0),
            bfactor_image: DetectorImage::filled(stol.width, stol.height, self.bfac),
        })
    }

    fn spots(
        &mut self,
        geometry: &DetectorGeometry,
        perturbation: Option<&LatticePerturbation>,
    ) -> Result<DetectorImage> {
        self.lattices.borrow_mut().push(perturbation.copied());
        let value = if perturbation.is_some() { 0.0 } else { self.nominal_spots };
        Ok(DetectorImage::filled(geometry.width, geometry.height, value))
    }
}

fn geometry() -> DetectorGeometry {
    DetectorGeometry::new(250.0, 0.172, 1.0, BeamCenter::new(4.0, 3.0), 8, 6).unwrap()
}

fn config() -> SimulationConfigBuilder {
    SimulationConfig::builder()
        .plastic_candidates(["plastic_a", "plastic_b"])
        .volume_scale(1.0)
        .seed(17)
}

#[test]
fn test_single_lattice_shot() {
    let engine = MockEngine::new(3.0, 2.0, 0.5, 4.0);
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), config().build()).unwrap();

    let (params, image) = sim.simulate().unwrap();

    // 4 * 0.5 + (3 + 2) * 1
    assert!(image.data.iter().all(|&v| v == 7.0));
    assert_eq!(image.dims(), (8, 6));
    assert!(!params.multi_lattice);
    assert_eq!(params.num_lat, 1);
    assert_eq!(params.ang_sigma, 0.0);
    assert_eq!(params.bg_scale, 1.0);
    assert!((1.5..4.0).contains(&params.resolution));
    assert_eq!(params.wavelength, 1.0);
    assert_eq!(params.detector_distance, 250.0);
    assert_eq!(params.beam_center, BeamCenter::new(4.0, 3.0));
}

#[test]
fn test_background_layers_cached_for_fixed_geometry() {
    let engine = MockEngine::new(1.0, 0.0, 1.0, 0.0);
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), config().build()).unwrap();

    for _ in 0..3 {
        sim.simulate().unwrap();
    }
    assert_eq!(sim.cache().computations(), 1);
    assert_eq!(sim.engine().background_renders.get(), 1);
    assert!(sim.cache().is_cached(&geometry()));

    let moved = geometry().with_distance(300.0);
    sim.set_geometry(moved).unwrap();
    assert!(!sim.cache().is_cached(&moved));
    let (params, _) = sim.simulate().unwrap();
    assert_eq!(params.detector_distance, 300.0);
    assert_eq!(sim.cache().computations(), 2);
}

#[test]
fn test_randomized_shots_render_fresh_layers() {
    let engine = MockEngine::new(1.0, 0.0, 1.0, 0.0);
    let randomization = ShotRandomization { distance: true, wavelength: true, center: false };
    let cfg = config().randomization(randomization).build();
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), cfg).unwrap();

    for _ in 0..4 {
        let (params, _) = sim.simulate().unwrap();
        assert!((200.0..300.0).contains(&params.detector_distance));
        let energy = super::geometry::ENERGY_CONV / params.wavelength;
        assert!(energy > 9999.0 && energy < 13001.0);
    }
    assert_eq!(sim.engine().background_renders.get(), 4);
    assert_eq!(sim.cache().computations(), 0);
}

#[test]
fn test_multi_lattice_shots_average_spots() {
    let engine = MockEngine::new(0.0, 0.0, 1.0, 6.0);
    let cfg = config().multi_lattice_chance(1.0).max_lat(4).build();
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), cfg).unwrap();

    for _ in 0..10 {
        sim.engine().lattices.borrow_mut().clear();
        let (params, image) = sim.simulate().unwrap();

        assert!(params.multi_lattice);
        assert!((2..=4).contains(&params.num_lat));
        assert!(params.ang_sigma > 0.0);

        let lattices = sim.engine().lattices.borrow().clone();
        assert_eq!(lattices.len(), params.num_lat);
        assert!(lattices[0].is_none());
        for p in lattices[1..].iter().map(|p| p.unwrap()) {
            assert!((1.0..=180.0).contains(&p.angle_deg));
            let norm: f64 = p.axis.iter().map(|a| a * a).sum();
            assert!((norm - 1.0).abs() < 1e-9);
        }

        let expected = (6.0 / params.num_lat as f64).round() as f32;
        assert!(image.data.iter().all(|&v| v == expected));
    }
}

#[test]
fn test_same_seed_reproduces_shot() {
    let run = || {
        let engine = MockEngine::new(20.0, 5.0, 0.8, 50.0);
        let randomization = ShotRandomization { distance: true, wavelength: true, center: true };
        let cfg = config()
            .randomization(randomization)
            .multi_lattice_chance(0.5)
            .max_lat(3)
            .vary_background_scale(true)
            .build();
        let mut sim = ShotSimulator::new(engine, PoissonNoise::new(), geometry(), cfg).unwrap();
        (sim.simulate().unwrap(), sim.simulate().unwrap())
    };
    let (first_a, second_a) = run();
    let (first_b, second_b) = run();
    assert_eq!(first_a, first_b);
    assert_eq!(second_a, second_b);
}

#[test]
fn test_variable_background_scale() {
    let engine = MockEngine::new(8.0, 0.0, 1.0, 0.0);
    let cfg = config().vary_background_scale(true).build();
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), cfg).unwrap();

    for _ in 0..20 {
        let (params, image) = sim.simulate().unwrap();
        assert!(BACKGROUND_SCALES.contains(&params.bg_scale));
        let expected = (8.0 * params.bg_scale).round() as f32;
        assert!(image.data.iter().all(|&v| v == expected));
    }
}

#[test]
fn test_plastic_selection() {
    let engine = MockEngine::new(0.0, 1.0, 1.0, 0.0);
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), config().build()).unwrap();
    for _ in 0..5 {
        sim.simulate().unwrap();
    }
    let requests = sim.engine().plastic_requests.borrow().clone();
    assert_eq!(requests.len(), 5);
    assert!(requests.iter().all(|r| r == "plastic_a" || r == "plastic_b"));

    let engine = MockEngine::new(0.0, 1.0, 1.0, 0.0);
    let cfg = config().plastic_override("kapton").build();
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), cfg).unwrap();
    sim.simulate().unwrap();
    assert_eq!(sim.engine().plastic_requests.borrow().as_slice(), ["kapton".to_string()]);
}

#[test]
fn test_engine_shape_mismatch_fails() {
    let mut engine = MockEngine::new(0.0, 1.0, 1.0, 0.0);
    engine.plastic_shape = Some((8, 5));
    let mut sim = ShotSimulator::new(engine, NoNoise, geometry(), config().build()).unwrap();
    assert!(matches!(sim.simulate(), Err(PipelineError::ShapeMismatch { .. })));
}

#[test]
fn test_invalid_config_rejected_up_front() {
    let engine = MockEngine::new(0.0, 0.0, 1.0, 0.0);
    let cfg = SimulationConfig::builder().build();
    assert!(matches!(
        ShotSimulator::new(engine, NoNoise, geometry(), cfg),
        Err(PipelineError::InvalidParameter(_))
    ));
}
