//! Single-threaded backend.
//!
//! Evaluates planes strictly in index order on the calling thread. Useful as
//! a reference for the parallel backend and inside hosts that own their own
//! threading.

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, PlaneFn};

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial (calling thread)".into(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn map_planes(
        &self,
        n_planes: usize,
        plane_fn: &PlaneFn<'_>,
    ) -> Result<Vec<Vec<f64>>, ComputeError> {
        (0..n_planes).map(plane_fn).collect()
    }
}
