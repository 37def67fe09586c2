//! Diffraction integrators.
//!
//! Both models evaluate integrals over the aperture of the form
//!
//! $$
//! I_n(r, z) = \int_0^{\alpha} g_n(\theta)\,J_n(k n_i r \sin\theta)\,
//!   e^{i k\,\mathrm{OPD}(\theta, z)}\,d\theta
//! $$
//!
//! and differ only in the Bessel orders used and the angular weighting
//! $g_n$. The [`RadialIntegrator`] trait is the single capability a model
//! provides: intensity at a set of radii, given the shared [`Pupil`] and the
//! phase factors of one focal plane.

pub mod scalar;
pub mod vectorial;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::opd::OpticalPathModel;
use crate::params::OpticalParameters;
use crate::quadrature::{QuadratureNodes, QuadratureRule};

pub use scalar::ScalarIntegrator;
pub use vectorial::VectorialIntegrator;

/// Diffraction model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Gibson–Lanni scalar model: one $J_0$ integral, polarisation ignored.
    Scalar,
    /// Vectorial model: $J_0$, $J_1$, $J_2$ channels combined incoherently.
    #[default]
    Vectorial,
}

impl Model {
    /// Build the integrator for this model, precomputing its per-node weights.
    pub fn integrator(&self, pupil: &Pupil) -> Box<dyn RadialIntegrator> {
        match self {
            Model::Scalar => Box::new(ScalarIntegrator::new(pupil)),
            Model::Vectorial => Box::new(VectorialIntegrator::new(pupil)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Model::Scalar => "scalar",
            Model::Vectorial => "vectorial",
        }
    }
}

/// Quadrature nodes and optical path model shared by every plane of a request.
#[derive(Debug, Clone)]
pub struct Pupil {
    nodes: QuadratureNodes,
    path: OpticalPathModel,
    lateral_scale: f64,
    immersion_ri: f64,
    specimen_ri: f64,
    coverslip_ri: f64,
}

impl Pupil {
    /// Nodes break at every critical angle inside the aperture; see
    /// [`OpticalPathModel::critical_angles`].
    pub fn new(params: &OpticalParameters, rule: QuadratureRule, n_samples: usize) -> Self {
        let nodes = QuadratureNodes::with_breakpoints(
            rule,
            params.half_angle(),
            n_samples,
            &OpticalPathModel::critical_angles(params),
        );
        let path = OpticalPathModel::new(params, &nodes);
        Self {
            nodes,
            path,
            lateral_scale: params.wavenumber() * params.immersion_ri(),
            immersion_ri: params.immersion_ri(),
            specimen_ri: params.specimen_ri(),
            coverslip_ri: params.coverslip_ri(),
        }
    }

    pub fn nodes(&self) -> &QuadratureNodes {
        &self.nodes
    }

    pub fn path(&self) -> &OpticalPathModel {
        &self.path
    }

    /// $k n_i$: multiplied by $r \sin\theta$ it gives the Bessel argument.
    pub fn lateral_scale(&self) -> f64 {
        self.lateral_scale
    }

    pub fn immersion_ri(&self) -> f64 {
        self.immersion_ri
    }

    pub fn specimen_ri(&self) -> f64 {
        self.specimen_ri
    }

    pub fn coverslip_ri(&self) -> f64 {
        self.coverslip_ri
    }
}

/// A diffraction model evaluated on a radial grid.
pub trait RadialIntegrator: Send + Sync {
    /// Intensity at each of `radii` (µm) for the plane whose per-node phase
    /// factors are `phases` (see [`OpticalPathModel::phase_factors`]).
    fn intensities(&self, pupil: &Pupil, phases: &[Complex64], radii: &[f64]) -> Vec<f64>;

    /// Human-readable name of the model.
    fn name(&self) -> &str;
}
