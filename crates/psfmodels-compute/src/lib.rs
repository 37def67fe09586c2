//! # psfmodels-compute
//!
//! Compute backend abstraction for the PSF engine. This crate provides a
//! [`ComputeBackend`](backend::ComputeBackend) trait that isolates the
//! diffraction code from how independent z-planes are scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Scheduling |
//! |---------|-------------|------------|
//! | CPU (Rayon) | `cpu` (default) | Work-stealing across planes |
//! | Serial | always | One plane after another, in index order |

pub mod backend;
pub mod serial;

#[cfg(feature = "cpu")]
pub mod cpu;

use std::sync::Arc;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, PlaneFn};
pub use serial::SerialBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

/// The backend used when the caller does not pick one.
///
/// Rayon when the `cpu` feature is enabled, otherwise the serial backend.
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "cpu")]
    {
        Arc::new(CpuBackend::new())
    }
    #[cfg(not(feature = "cpu"))]
    {
        Arc::new(SerialBackend)
    }
}
