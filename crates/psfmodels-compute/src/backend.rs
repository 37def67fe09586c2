//! Compute backend trait and device description.
//!
//! The [`ComputeBackend`] trait abstracts over how the per-plane work of a
//! PSF request is executed, so the physics in `psfmodels-core` stays
//! scheduler-agnostic.

use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Computation cancelled before plane {plane}")]
    Cancelled { plane: usize },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Cpu,
    Serial,
}

/// Per-plane work item: maps a plane index to that plane's samples.
pub type PlaneFn<'a> = dyn Fn(usize) -> Result<Vec<f64>, ComputeError> + Send + Sync + 'a;

/// Abstraction over compute backends.
///
/// Planes handed to a backend are independent: the closure reads shared,
/// immutable state only. Implementations may evaluate planes in any order
/// but must return results indexed by plane, and must stop at the first
/// error.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Evaluate `plane_fn` for every index in `0..n_planes`.
    ///
    /// Element `i` of the returned vector is the output of `plane_fn(i)`.
    fn map_planes(
        &self,
        n_planes: usize,
        plane_fn: &PlaneFn<'_>,
    ) -> Result<Vec<Vec<f64>>, ComputeError>;
}
