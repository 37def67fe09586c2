//! Gibson–Lanni scalar model.
//!
//! $$
//! A(r, z) = \int_0^{\alpha} J_0(k n_i r \sin\theta)\,
//!   e^{i k\,\mathrm{OPD}(\theta, z)} \sin\theta\,d\theta,
//! \qquad I = |A|^2
//! $$

use num_complex::Complex64;

use super::{Pupil, RadialIntegrator};
use crate::bessel::j0;

/// Scalar integrator with the $w \sin\theta$ factor of each node precomputed.
#[derive(Debug, Clone)]
pub struct ScalarIntegrator {
    apodization: Vec<f64>,
}

impl ScalarIntegrator {
    pub fn new(pupil: &Pupil) -> Self {
        let apodization = pupil
            .nodes()
            .iter()
            .map(|node| node.weight * node.sin_theta)
            .collect();
        Self { apodization }
    }

    /// Complex amplitude at one radius.
    pub fn amplitude(&self, pupil: &Pupil, phases: &[Complex64], radius: f64) -> Complex64 {
        let x = pupil.lateral_scale() * radius;
        pupil
            .nodes()
            .iter()
            .zip(&self.apodization)
            .zip(phases)
            .map(|((node, &a), &phase)| phase * (a * j0(x * node.sin_theta)))
            .sum()
    }
}

impl RadialIntegrator for ScalarIntegrator {
    fn intensities(&self, pupil: &Pupil, phases: &[Complex64], radii: &[f64]) -> Vec<f64> {
        radii
            .iter()
            .map(|&r| self.amplitude(pupil, phases, r).norm_sqr())
            .collect()
    }

    fn name(&self) -> &str {
        "scalar"
    }
}
