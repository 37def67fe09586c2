//! Request driver: builds the shared per-request state once and evaluates
//! planes through a compute backend.

use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array2, Array3};
use psfmodels_compute::{ComputeBackend, ComputeError};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::PsfError;
use crate::integrator::{Model, Pupil, RadialIntegrator};
use crate::opd::OpticalPathModel;
use crate::params::OpticalParameters;
use crate::profile::{RadialGrid, RadialProfile, RadialProfileCache};
use crate::quadrature::{adaptive_sample_count, QuadratureNodes, QuadratureRule};
use crate::volume::{VolumeAssembler, ZOrder};

/// Model and output choices that do not change the optics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PsfOptions {
    pub model: Model,
    pub rule: QuadratureRule,
    /// Divide the volume by its maximum so the peak is 1.
    pub normalize: bool,
    pub z_order: ZOrder,
}

/// State shared by every plane of one request.
///
/// Quadrature nodes, optical path model and integrator weights are computed
/// once in [`PsfSession::new`] and only read afterwards, so planes can be
/// evaluated in any order on any thread.
pub struct PsfSession {
    params: OpticalParameters,
    options: PsfOptions,
    grid: RadialGrid,
    pupil: Pupil,
    integrator: Box<dyn RadialIntegrator>,
    backend: Arc<dyn ComputeBackend>,
    cancel: CancellationToken,
}

/// Nodes used to measure the pupil phase before the sample count is known.
const PHASE_SURVEY_NODES: usize = 256;

impl PsfSession {
    /// Session for the stack centred on the particle depth.
    ///
    /// When `params` leaves the sample count open it is sized for
    /// [`OpticalParameters::centered_z_planes`]; use
    /// [`PsfSession::for_planes`] to evaluate other focal positions.
    pub fn new(params: OpticalParameters, options: PsfOptions) -> Self {
        let z_planes = params.centered_z_planes();
        Self::for_planes(params, options, &z_planes)
    }

    /// Session whose adaptive sample count covers the focal positions in
    /// `z_planes` (µm).
    pub fn for_planes(params: OpticalParameters, options: PsfOptions, z_planes: &[f64]) -> Self {
        let grid = RadialGrid::for_params(&params);
        let n_samples = params
            .n_samples()
            .unwrap_or_else(|| adaptive_samples(&params, grid, z_planes));
        let pupil = Pupil::new(&params, options.rule, n_samples);
        let integrator = options.model.integrator(&pupil);

        log::debug!(
            "PSF session: {} model, {:?} rule with {} nodes, {} radial samples at {:.4} um",
            integrator.name(),
            options.rule,
            pupil.nodes().len(),
            grid.len(),
            grid.step_um()
        );

        Self {
            params,
            options,
            grid,
            pupil,
            integrator,
            backend: psfmodels_compute::default_backend(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ComputeBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn params(&self) -> &OpticalParameters {
        &self.params
    }

    pub fn options(&self) -> &PsfOptions {
        &self.options
    }

    pub fn nodes(&self) -> &QuadratureNodes {
        self.pupil.nodes()
    }

    pub fn radial_grid(&self) -> RadialGrid {
        self.grid
    }

    /// Radial profile of every plane in `z_planes` (µm), in request order.
    pub fn radial_profiles(&self, z_planes: &[f64]) -> Result<RadialProfileCache, PsfError> {
        if z_planes.is_empty() {
            return Err(PsfError::ConfigurationMismatch(
                "at least one focal plane is required".into(),
            ));
        }
        if z_planes.iter().any(|z| !z.is_finite()) {
            return Err(PsfError::invalid("z_planes", "focal positions must be finite"));
        }

        let radii = self.grid.radii();
        let start = Instant::now();

        let plane_fn = |plane: usize| -> Result<Vec<f64>, ComputeError> {
            if self.cancel.is_cancelled() {
                return Err(ComputeError::Cancelled { plane });
            }
            let phases = self.pupil.path().phase_factors(z_planes[plane]);
            Ok(self.integrator.intensities(&self.pupil, &phases, &radii))
        };

        let planes = match self.backend.map_planes(z_planes.len(), &plane_fn) {
            Ok(planes) => planes,
            Err(ComputeError::Cancelled { plane }) => {
                log::warn!("PSF computation cancelled at plane {plane}");
                return Err(PsfError::Cancelled);
            }
            Err(e) => return Err(e.into()),
        };

        let mut profiles = Vec::with_capacity(planes.len());
        for (plane, (intensity, &z)) in planes.into_iter().zip(z_planes).enumerate() {
            if intensity.iter().any(|v| !v.is_finite()) {
                return Err(PsfError::NumericalInstability { plane, z_um: z });
            }
            profiles.push(RadialProfile::new(z, self.grid, intensity));
        }

        log::debug!(
            "{} radial profiles on {} in {:.2?}",
            profiles.len(),
            self.backend.device_info().name,
            start.elapsed()
        );
        Ok(RadialProfileCache::new(profiles))
    }

    /// The `(nz, M)` radial-z table for `z_planes`.
    pub fn rz(&self, z_planes: &[f64]) -> Result<Array2<f64>, PsfError> {
        let cache = self.radial_profiles(z_planes)?;
        self.assembler().rz(&cache)
    }

    /// Volume over the stack centred on the particle depth.
    pub fn volume(&self) -> Result<Array3<f64>, PsfError> {
        self.volume_at(&self.params.centered_z_planes())
    }

    /// Volume of shape `(z_planes.len(), ny, nx)` at explicit focal positions.
    pub fn volume_at(&self, z_planes: &[f64]) -> Result<Array3<f64>, PsfError> {
        let start = Instant::now();
        let mut cache = self.radial_profiles(z_planes)?;
        let volume = self.assembler().assemble(&mut cache)?;
        log::info!(
            "Computed {:?} {} PSF in {:.2?}",
            volume.dim(),
            self.integrator.name(),
            start.elapsed()
        );
        Ok(volume)
    }

    fn assembler(&self) -> VolumeAssembler {
        VolumeAssembler::new(&self.params)
            .with_z_order(self.options.z_order)
            .with_normalize(self.options.normalize)
    }
}

/// Sample count resolving both the Bessel kernels out to the grid edge and
/// the pupil phase at the outermost requested plane.
fn adaptive_samples(params: &OpticalParameters, grid: RadialGrid, z_planes: &[f64]) -> usize {
    let survey = QuadratureNodes::with_breakpoints(
        QuadratureRule::GaussLegendre,
        params.half_angle(),
        PHASE_SURVEY_NODES,
        &OpticalPathModel::critical_angles(params),
    );
    let phase_span = OpticalPathModel::new(params, &survey).phase_span(z_planes);
    let max_arg = params.wavenumber() * params.immersion_ri() * grid.max_radius_um();
    let n_samples = adaptive_sample_count(params.half_angle(), max_arg, phase_span);
    log::debug!("adaptive quadrature: phase span {phase_span:.1} rad -> {n_samples} nodes");
    n_samples
}

/// PSF volume of `params.shape()` centred on the particle depth.
pub fn compute_psf(params: &OpticalParameters, options: &PsfOptions) -> Result<Array3<f64>, PsfError> {
    PsfSession::new(params.clone(), *options).volume()
}

/// PSF volume at explicit focal positions (µm).
pub fn compute_psf_at(
    params: &OpticalParameters,
    options: &PsfOptions,
    z_planes: &[f64],
) -> Result<Array3<f64>, PsfError> {
    PsfSession::for_planes(params.clone(), *options, z_planes).volume_at(z_planes)
}
