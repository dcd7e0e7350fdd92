//! Boundary to the physics engine that renders diffraction and scattering.

use rand::rngs::StdRng;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::types::DetectorImage;
use crate::image_pipeline::simulate::geometry::DetectorGeometry;

/// Rotation of an extra lattice relative to the nominal crystal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticePerturbation {
    /// Unit vector
    pub axis: [f64; 3],
    pub angle_deg: f64,
}

impl LatticePerturbation {
    /// Rodrigues rotation matrix, row-major.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        let [x, y, z] = self.axis;
        let (s, c) = self.angle_deg.to_radians().sin_cos();
        let t = 1.0 - c;
        [
            [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
            [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
            [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
        ]
    }
}

/// B-factor falloff image and the resolution label it corresponds to.
#[derive(Debug, Clone)]
pub struct ResolutionFalloff {
    pub resolution: f64,
    pub bfactor_image: DetectorImage,
}

/// Renders the layers a simulated shot is composed from. Every image must
/// match the geometry's `width x height`.
pub trait DiffractionEngine {
    fn air_and_water(&self, geometry: &DetectorGeometry) -> Result<DetectorImage>;

    /// sin(θ)/λ at every pixel.
    fn stol_map(&self, geometry: &DetectorGeometry) -> Result<DetectorImage>;

    fn plastic_background(&self, geometry: &DetectorGeometry, candidate: &str) -> Result<DetectorImage>;

    /// Draws a B-factor for this shot and renders its falloff over `stol`.
    fn resolution_falloff(&self, stol: &DetectorImage, rng: &mut StdRng) -> Result<ResolutionFalloff>;

    /// Bragg spots of the crystal, optionally for a rotated copy of the lattice.
    fn spots(
        &mut self,
        geometry: &DetectorGeometry,
        perturbation: Option<&LatticePerturbation>,
    ) -> Result<DetectorImage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn apply(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, row) in m.iter().enumerate() {
            out[i] = row.iter().zip(v).map(|(a, b)| a * b).sum();
        }
        out
    }

    #[test]
    fn quarter_turn_about_z() {
        let rot = LatticePerturbation { axis: [0.0, 0.0, 1.0], angle_deg: 90.0 }.matrix();
        let v = apply(&rot, [1.0, 0.0, 0.0]);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn axis_is_fixed_and_matrix_is_orthonormal() {
        let n = 3f64.sqrt().recip();
        let pert = LatticePerturbation { axis: [n, n, n], angle_deg: 137.0 };
        let rot = pert.matrix();
        let on_axis = apply(&rot, pert.axis);
        for i in 0..3 {
            assert_relative_eq!(on_axis[i], n, epsilon = 1e-12);
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| rot[k][i] * rot[k][j]).sum();
                assert_relative_eq!(dot, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-12);
            }
        }
    }
}
