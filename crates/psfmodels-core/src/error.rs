//! Error type shared by every stage of a PSF request.

use psfmodels_compute::ComputeError;
use thiserror::Error;

/// Errors that can occur while building parameters or computing a PSF.
///
/// Every variant aborts the whole request; no partial volume is returned.
#[derive(Debug, Error)]
pub enum PsfError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("Non-finite intensity in plane {plane} (z = {z_um:.4} um)")]
    NumericalInstability { plane: usize, z_um: f64 },

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Radial profile for plane {0} was already consumed")]
    ProfileConsumed(usize),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),
}

impl PsfError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
