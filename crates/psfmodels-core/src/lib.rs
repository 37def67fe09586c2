//! # psfmodels-core
//!
//! Widefield microscope point-spread functions. This crate evaluates the
//! Gibson–Lanni scalar and the vectorial diffraction integrals on a radial
//! grid and assembles the results into (z, y, x) intensity volumes.
//!
//! ## Architecture
//!
//! A request is driven by [`session::PsfSession`]: it builds the quadrature
//! nodes and the optical path model once, hands one closure per focal plane
//! to a [`psfmodels_compute::ComputeBackend`], and interpolates the returned
//! radial profiles onto the output pixel grid.
//!
//! ## Modules
//!
//! - [`params`]: Validated optical and sampling parameters.
//! - [`quadrature`]: Gauss–Legendre and Simpson nodes over the aperture.
//! - [`opd`]: Optical path difference through the specimen / coverslip / immersion stack.
//! - [`integrator`]: Scalar and vectorial radial integrators.
//! - [`profile`]: Radial grid, profiles and the consume-once profile cache.
//! - [`volume`]: Radial-to-pixel interpolation, z ordering and normalisation.
//! - [`session`]: Request driver and the [`compute_psf`] entry points.
//! - [`cancel`]: Cooperative cancellation.
//! - [`bessel`]: Bessel functions of the first kind.

pub mod bessel;
pub mod cancel;
pub mod error;
pub mod integrator;
pub mod opd;
pub mod params;
pub mod profile;
pub mod quadrature;
pub mod session;
pub mod volume;

pub use cancel::CancellationToken;
pub use error::PsfError;
pub use integrator::Model;
pub use params::{OpticalParameters, OpticalParametersBuilder, VolumeShape};
pub use quadrature::QuadratureRule;
pub use session::{compute_psf, compute_psf_at, PsfOptions, PsfSession};
pub use volume::ZOrder;
