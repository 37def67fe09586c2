//! Vectorial model of an isotropic (randomly oriented) dipole emitter.
//!
//! Three channels are integrated over the aperture, each with its own Bessel
//! order and Fresnel weighting:
//!
//! $$
//! \begin{aligned}
//! I_0 &= \int c\,J_0(k n_i r \sin\theta)\,(\tau_s + \tau_p \tilde n_s / n_s)\,e^{ik\mathrm{OPD}} \\
//! I_1 &= \int c\,J_1(k n_i r \sin\theta)\,\tau_p\,(n_i \sin\theta / n_s)\,e^{ik\mathrm{OPD}} \\
//! I_2 &= \int c\,J_2(k n_i r \sin\theta)\,(\tau_s - \tau_p \tilde n_s / n_s)\,e^{ik\mathrm{OPD}}
//! \end{aligned}
//! $$
//!
//! with $c = \sin\theta\sqrt{\cos\theta}$, and the intensity is the
//! incoherent sum $\tfrac{8\pi}{3}\left(|I_0|^2 + 2|I_1|^2 + |I_2|^2\right)$.
//!
//! The transmission coefficients $\tau_s$, $\tau_p$ are products of the
//! specimen→coverslip and coverslip→immersion interface transmissions,
//! evaluated with complex axial indices so that supercritical angles stay
//! finite.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::{Pupil, RadialIntegrator};
use crate::bessel::{j0, j1, j2};

/// Per-node, $z$-independent weights of the three channels (quadrature
/// weight, apodization and Fresnel factors folded together).
#[derive(Debug, Clone)]
pub struct ChannelWeights {
    pub zeroth: Vec<Complex64>,
    pub first: Vec<Complex64>,
    pub second: Vec<Complex64>,
}

#[derive(Debug, Clone)]
pub struct VectorialIntegrator {
    weights: ChannelWeights,
}

/// $s$- and $p$-polarised transmission through the coverslip for one node.
fn transmission(
    immersion_cos: f64,
    specimen_axial: Complex64,
    coverslip_axial: Complex64,
    ni: f64,
    ns: f64,
    ng: f64,
) -> (Complex64, Complex64) {
    let numerator = 4.0 * immersion_cos * coverslip_axial;
    let tau_s = numerator / ((immersion_cos + coverslip_axial) * (coverslip_axial + specimen_axial));
    let tau_p = numerator
        / ((ng * immersion_cos / ni + ni * coverslip_axial / ng)
            * (ns * coverslip_axial / ng + ng * specimen_axial / ns));
    (tau_s, tau_p)
}

impl VectorialIntegrator {
    pub fn new(pupil: &Pupil) -> Self {
        let ni = pupil.immersion_ri();
        let ns = pupil.specimen_ri();
        let ng = pupil.coverslip_ri();
        let path = pupil.path();

        let n = pupil.nodes().len();
        let mut weights = ChannelWeights {
            zeroth: Vec::with_capacity(n),
            first: Vec::with_capacity(n),
            second: Vec::with_capacity(n),
        };

        for ((node, &specimen), &coverslip) in pupil
            .nodes()
            .iter()
            .zip(path.specimen_axial())
            .zip(path.coverslip_axial())
        {
            let (tau_s, tau_p) =
                transmission(ni * node.cos_theta, specimen, coverslip, ni, ns, ng);
            let c = node.weight * node.sin_theta * node.cos_theta.sqrt();
            let p_axial = tau_p * specimen / ns;

            weights.zeroth.push(c * (tau_s + p_axial));
            weights.first.push(c * tau_p * (ni * node.sin_theta / ns));
            weights.second.push(c * (tau_s - p_axial));
        }

        Self { weights }
    }

    pub fn weights(&self) -> &ChannelWeights {
        &self.weights
    }

    /// $J_0$ channel at one radius.
    pub fn zeroth_order(&self, pupil: &Pupil, phases: &[Complex64], radius: f64) -> Complex64 {
        channel(pupil, &self.weights.zeroth, phases, radius, j0)
    }

    /// $J_1$ channel at one radius. Vanishes on axis.
    pub fn first_order(&self, pupil: &Pupil, phases: &[Complex64], radius: f64) -> Complex64 {
        channel(pupil, &self.weights.first, phases, radius, j1)
    }

    /// $J_2$ channel at one radius. Vanishes on axis.
    pub fn second_order(&self, pupil: &Pupil, phases: &[Complex64], radius: f64) -> Complex64 {
        channel(pupil, &self.weights.second, phases, radius, j2)
    }

    /// Incoherent sum of the three channel amplitudes.
    pub fn combine(i0: Complex64, i1: Complex64, i2: Complex64) -> f64 {
        8.0 * PI / 3.0 * (i0.norm_sqr() + 2.0 * i1.norm_sqr() + i2.norm_sqr())
    }
}

fn channel(
    pupil: &Pupil,
    weights: &[Complex64],
    phases: &[Complex64],
    radius: f64,
    bessel: fn(f64) -> f64,
) -> Complex64 {
    let x = pupil.lateral_scale() * radius;
    pupil
        .nodes()
        .iter()
        .zip(weights)
        .zip(phases)
        .map(|((node, &w), &phase)| w * phase * bessel(x * node.sin_theta))
        .sum()
}

impl RadialIntegrator for VectorialIntegrator {
    fn intensities(&self, pupil: &Pupil, phases: &[Complex64], radii: &[f64]) -> Vec<f64> {
        radii
            .iter()
            .map(|&r| {
                Self::combine(
                    self.zeroth_order(pupil, phases, r),
                    self.first_order(pupil, phases, r),
                    self.second_order(pupil, phases, r),
                )
            })
            .collect()
    }

    fn name(&self) -> &str {
        "vectorial"
    }
}
