//! Optical path difference through a specimen / coverslip / immersion stack.
//!
//! A ray leaving the emitter at immersion angle $\theta$ keeps the Snell
//! invariant $n_i \sin\theta$ through every layer, so in a layer of index $n$
//! the axial optical path per unit thickness is
//! $\tilde n = n\cos\theta_n = \sqrt{n^2 - n_i^2\sin^2\theta}$.
//! The OPD sums, over layers, the actual path minus the design path:
//!
//! $$
//! \mathrm{OPD}(\theta, z) = \sum_{\text{layers}}
//!   t\,\tilde n(n) - t^{*}\,\tilde n(n^{*})
//! $$
//!
//! The actual immersion thickness is $c_i - z$, where $c_i$ places the
//! paraxial focus on the particle when $z = z_p$.
//!
//! Square roots are complex: beyond a layer's critical angle the wave is
//! evanescent and $\tilde n$ is imaginary. Each layer's contribution takes
//! the sign that decays through the layer, so $|e^{ik\,\mathrm{OPD}}| \le 1$
//! for every thickness, negative particle depths included.

use num_complex::Complex64;

use crate::params::OpticalParameters;
use crate::quadrature::QuadratureNodes;

/// One layer of the stack in its actual and design states.
#[derive(Debug, Clone, Copy)]
struct Layer {
    thickness: f64,
    ri: f64,
    design_thickness: f64,
    design_ri: f64,
}

impl Layer {
    /// Actual minus design optical path for the given $n_i^2 \sin^2\theta$.
    fn path_difference(&self, invariant_sq: f64) -> Complex64 {
        let actual = axial_index(self.ri, invariant_sq) * self.thickness;
        let design = axial_index(self.design_ri, invariant_sq) * self.design_thickness;
        decaying(actual) - decaying(design).conj()
    }

    /// Immersion angles at which an index of this layer turns evanescent.
    fn critical_sines(&self, immersion_ri: f64) -> impl Iterator<Item = f64> {
        [(self.thickness, self.ri), (self.design_thickness, self.design_ri)]
            .into_iter()
            .filter(|&(t, _)| t != 0.0)
            .map(move |(_, ri)| ri / immersion_ri)
            .filter(|&sine| sine < 1.0)
    }
}

/// Optical path with a non-negative imaginary part.
fn decaying(path: Complex64) -> Complex64 {
    Complex64::new(path.re, path.im.abs())
}

/// $\sqrt{n^2 - n_i^2\sin^2\theta}$ on the principal branch.
pub fn axial_index(ri: f64, invariant_sq: f64) -> Complex64 {
    Complex64::new(ri * ri - invariant_sq, 0.0).sqrt()
}

/// Per-node optical path data for one request.
///
/// Holds the $z$-independent part of the OPD for every quadrature node; the
/// $z$-dependent immersion term is added in [`OpticalPathModel::opd`]. Every
/// integrator channel reads the same phases from here.
#[derive(Debug, Clone)]
pub struct OpticalPathModel {
    wavenumber: f64,
    focus_thickness: f64,
    immersion_cos: Vec<f64>,
    fixed_opd: Vec<Complex64>,
    specimen_axial: Vec<Complex64>,
    coverslip_axial: Vec<Complex64>,
}

/// Specimen, coverslip and immersion layers in their actual and design states.
///
/// The immersion layer only carries its design thickness here; its actual
/// thickness depends on $z$ and is added per plane.
fn layers(params: &OpticalParameters) -> [Layer; 3] {
    [
        Layer {
            thickness: params.particle_depth_um(),
            ri: params.specimen_ri(),
            design_thickness: params.specimen_thickness_design_um(),
            design_ri: params.specimen_ri_design(),
        },
        Layer {
            thickness: params.coverslip_thickness_um(),
            ri: params.coverslip_ri(),
            design_thickness: params.coverslip_thickness_design_um(),
            design_ri: params.coverslip_ri_design(),
        },
        Layer {
            thickness: 0.0,
            ri: params.immersion_ri(),
            design_thickness: params.working_distance_um(),
            design_ri: params.immersion_ri_design(),
        },
    ]
}

impl OpticalPathModel {
    pub fn new(params: &OpticalParameters, nodes: &QuadratureNodes) -> Self {
        let ni = params.immersion_ri();
        let ni0 = params.immersion_ri_design();
        let ns = params.specimen_ri();
        let ns0 = params.specimen_ri_design();
        let ng = params.coverslip_ri();
        let ng0 = params.coverslip_ri_design();
        let zp = params.particle_depth_um();
        let tg = params.coverslip_thickness_um();
        let tg0 = params.coverslip_thickness_design_um();
        let ti0 = params.working_distance_um();
        let ts0 = params.specimen_thickness_design_um();

        // Immersion thickness that keeps the paraxial focus at z = zp.
        let focus_thickness =
            zp * (1.0 - ni / ns) + ni * (tg0 / ng0 + ti0 / ni0 + ts0 / ns0 - tg / ng);

        let layers = layers(params);

        let n = nodes.len();
        let mut immersion_cos = Vec::with_capacity(n);
        let mut fixed_opd = Vec::with_capacity(n);
        let mut specimen_axial = Vec::with_capacity(n);
        let mut coverslip_axial = Vec::with_capacity(n);

        for node in nodes.iter() {
            let invariant_sq = (ni * node.sin_theta).powi(2);
            immersion_cos.push(ni * node.cos_theta);
            fixed_opd.push(
                layers
                    .iter()
                    .map(|layer| layer.path_difference(invariant_sq))
                    .sum::<Complex64>(),
            );
            specimen_axial.push(axial_index(ns, invariant_sq));
            coverslip_axial.push(axial_index(ng, invariant_sq));
        }

        Self {
            wavenumber: params.wavenumber(),
            focus_thickness,
            immersion_cos,
            fixed_opd,
            specimen_axial,
            coverslip_axial,
        }
    }

    /// Aperture angles inside $(0, \alpha)$ where a layer of nonzero
    /// thickness turns evanescent, ascending. The OPD has a square-root kink
    /// at each, so quadrature panels should break there.
    pub fn critical_angles(params: &OpticalParameters) -> Vec<f64> {
        let ni = params.immersion_ri();
        let edge = params.numerical_aperture() / ni;
        let mut angles: Vec<f64> = layers(params)
            .iter()
            .flat_map(|layer| layer.critical_sines(ni))
            .filter(|&sine| sine < edge)
            .map(f64::asin)
            .collect();
        angles.sort_by(f64::total_cmp);
        angles.dedup();
        angles
    }

    /// Largest spread of $k\,\mathrm{Re\,OPD}$ across the nodes (radians)
    /// over the focal positions in `z_planes`.
    ///
    /// The OPD is linear in $z$, so only the extreme planes are inspected.
    pub fn phase_span(&self, z_planes: &[f64]) -> f64 {
        let finite = z_planes.iter().copied().filter(|z| z.is_finite());
        let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), z| {
            (lo.min(z), hi.max(z))
        });
        if lo > hi || self.is_empty() {
            return 0.0;
        }

        [lo, hi]
            .into_iter()
            .map(|z| {
                let (min, max) = (0..self.len())
                    .map(|j| self.opd(j, z).re)
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
                        (min.min(v), max.max(v))
                    });
                max - min
            })
            .fold(0.0, f64::max)
            * self.wavenumber
    }

    pub fn len(&self) -> usize {
        self.fixed_opd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_opd.is_empty()
    }

    /// Actual immersion thickness at $z = 0$ (µm).
    pub fn focus_thickness(&self) -> f64 {
        self.focus_thickness
    }

    /// OPD (µm) of node `node` with the focal plane at `z_um`.
    pub fn opd(&self, node: usize, z_um: f64) -> Complex64 {
        self.fixed_opd[node] + self.immersion_cos[node] * (self.focus_thickness - z_um)
    }

    /// $e^{i k\,\mathrm{OPD}}$ for every node at focal position `z_um`.
    pub fn phase_factors(&self, z_um: f64) -> Vec<Complex64> {
        let ik = Complex64::new(0.0, self.wavenumber);
        (0..self.len())
            .map(|j| (ik * self.opd(j, z_um)).exp())
            .collect()
    }

    /// $\tilde n_s$ per node, shared with the vectorial Fresnel factors.
    pub fn specimen_axial(&self) -> &[Complex64] {
        &self.specimen_axial
    }

    /// $\tilde n_g$ per node, shared with the vectorial Fresnel factors.
    pub fn coverslip_axial(&self) -> &[Complex64] {
        &self.coverslip_axial
    }
}
