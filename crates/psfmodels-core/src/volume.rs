//! Assembly of radial profiles into (z, y, x) volumes.
//!
//! Each output pixel's distance from the optical axis is computed once; every
//! plane then linearly interpolates its radial profile at those distances.

use ndarray::{Array, Array2, Array3, Axis, Dimension, Zip};
use serde::{Deserialize, Serialize};

use crate::error::PsfError;
use crate::params::OpticalParameters;
use crate::profile::RadialProfileCache;

/// Order of planes along the first axis of the output.
///
/// `Ascending` keeps the requested focal positions in order (increasing z for
/// the centred stack); `Descending` reverses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZOrder {
    #[default]
    Ascending,
    Descending,
}

impl ZOrder {
    /// Index into the requested planes that feeds output plane `plane`.
    pub fn source_plane(&self, plane: usize, n_planes: usize) -> usize {
        match self {
            ZOrder::Ascending => plane,
            ZOrder::Descending => n_planes - 1 - plane,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeAssembler {
    ny: usize,
    nx: usize,
    dxy_um: f64,
    offset_um: [f64; 2],
    z_order: ZOrder,
    normalize: bool,
}

impl VolumeAssembler {
    pub fn new(params: &OpticalParameters) -> Self {
        let shape = params.shape();
        Self {
            ny: shape.ny,
            nx: shape.nx,
            dxy_um: params.dxy_um(),
            offset_um: params.lateral_offset_um(),
            z_order: ZOrder::default(),
            normalize: false,
        }
    }

    pub fn with_z_order(mut self, z_order: ZOrder) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Distance (µm) of every (y, x) pixel from the emitter's lateral position.
    pub fn radius_map(&self) -> Array2<f64> {
        let cy = (self.ny as f64 - 1.0) / 2.0;
        let cx = (self.nx as f64 - 1.0) / 2.0;
        let [ox, oy] = self.offset_um;
        Array2::from_shape_fn((self.ny, self.nx), |(y, x)| {
            let dy = (y as f64 - cy) * self.dxy_um - oy;
            let dx = (x as f64 - cx) * self.dxy_um - ox;
            dy.hypot(dx)
        })
    }

    /// Consume every profile in `cache` into a volume of shape
    /// `(cache.len(), ny, nx)`.
    pub fn assemble(&self, cache: &mut RadialProfileCache) -> Result<Array3<f64>, PsfError> {
        let nz = cache.len();
        if nz == 0 {
            return Err(PsfError::ConfigurationMismatch(
                "no focal planes to assemble".into(),
            ));
        }

        let radius = self.radius_map();
        let mut volume = Array3::<f64>::zeros((nz, self.ny, self.nx));

        for (plane, mut slice) in volume.axis_iter_mut(Axis(0)).enumerate() {
            let profile = cache.take(self.z_order.source_plane(plane, nz))?;
            Zip::from(&mut slice)
                .and(&radius)
                .for_each(|v, &r| *v = profile.interpolate(r));
        }

        if self.normalize {
            normalize_peak(&mut volume);
        }
        Ok(volume)
    }

    /// The `(nz, M)` table of radial profiles the volume is interpolated from,
    /// in output plane order.
    pub fn rz(&self, cache: &RadialProfileCache) -> Result<Array2<f64>, PsfError> {
        let nz = cache.len();
        let first = cache.get(0).ok_or(PsfError::ProfileConsumed(0))?;
        let mut table = Array2::<f64>::zeros((nz, first.len()));

        for (plane, mut row) in table.axis_iter_mut(Axis(0)).enumerate() {
            let source = self.z_order.source_plane(plane, nz);
            let profile = cache.get(source).ok_or(PsfError::ProfileConsumed(source))?;
            row.assign(&ndarray::ArrayView1::from(profile.intensity()));
        }

        if self.normalize {
            normalize_peak(&mut table);
        }
        Ok(table)
    }
}

/// Scale so the largest value is 1. Arrays whose maximum is zero are left
/// untouched.
pub fn normalize_peak<D: Dimension>(array: &mut Array<f64, D>) {
    let peak = array.iter().copied().fold(0.0_f64, f64::max);
    if peak > 0.0 {
        array.mapv_inplace(|v| v / peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{RadialGrid, RadialProfile};

    fn params(ny: usize, nx: usize) -> OpticalParameters {
        OpticalParameters::builder()
            .shape(2, ny, nx)
            .dxy_um(0.1)
            .oversampling(1)
            .build()
            .unwrap()
    }

    fn cache(planes: &[Vec<f64>]) -> RadialProfileCache {
        RadialProfileCache::new(
            planes
                .iter()
                .enumerate()
                .map(|(i, v)| RadialProfile::new(i as f64, RadialGrid::new(0.1, v.len()), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_radius_map_is_centred() {
        let map = VolumeAssembler::new(&params(3, 5)).radius_map();
        assert_eq!(map[[1, 2]], 0.0);
        assert!((map[[0, 0]] - 0.1_f64.hypot(0.2)).abs() < 1e-15);
        assert_eq!(map[[0, 1]], map[[2, 3]]);
    }

    #[test]
    fn test_radius_map_follows_lateral_offset() {
        let p = OpticalParameters::builder()
            .shape(1, 5, 5)
            .dxy_um(0.1)
            .lateral_offset_um(0.1, -0.2)
            .build()
            .unwrap();
        let map = VolumeAssembler::new(&p).radius_map();
        // x = 2 + 1, y = 2 - 2
        assert!(map[[0, 3]] < 1e-15);
    }

    #[test]
    fn test_descending_order_reverses_planes() {
        let planes = vec![vec![1.0; 4], vec![2.0; 4]];
        let up = VolumeAssembler::new(&params(3, 3))
            .assemble(&mut cache(&planes))
            .unwrap();
        let down = VolumeAssembler::new(&params(3, 3))
            .with_z_order(ZOrder::Descending)
            .assemble(&mut cache(&planes))
            .unwrap();
        assert_eq!(up[[0, 1, 1]], 1.0);
        assert_eq!(down[[0, 1, 1]], 2.0);
        assert_eq!(up.index_axis(Axis(0), 1), down.index_axis(Axis(0), 0));
    }

    #[test]
    fn test_pixels_past_profile_clamp_to_last_sample() {
        // Two samples reach 0.1 um; the 5x5 corners sit at 0.28 um.
        let planes = vec![vec![3.0, 1.0], vec![3.0, 1.0]];
        let volume = VolumeAssembler::new(&params(5, 5))
            .assemble(&mut cache(&planes))
            .unwrap();
        assert_eq!(volume[[0, 0, 0]], 1.0);
        assert_eq!(volume[[1, 4, 4]], 1.0);
        assert_eq!(volume[[0, 2, 2]], 3.0);
    }

    #[test]
    fn test_normalization_sets_peak_to_one() {
        let planes = vec![vec![4.0, 2.0, 0.0], vec![8.0, 1.0, 0.0]];
        let volume = VolumeAssembler::new(&params(3, 3))
            .with_normalize(true)
            .assemble(&mut cache(&planes))
            .unwrap();
        assert_eq!(volume.iter().copied().fold(f64::MIN, f64::max), 1.0);
        assert_eq!(volume[[0, 1, 1]], 0.5);
    }

    #[test]
    fn test_normalizing_zeros_leaves_zeros() {
        let mut zeros = Array2::<f64>::zeros((2, 2));
        normalize_peak(&mut zeros);
        assert!(zeros.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_assembly_consumes_profiles() {
        let mut c = cache(&[vec![1.0, 0.5], vec![1.0, 0.5]]);
        let assembler = VolumeAssembler::new(&params(3, 3));
        assert_eq!(assembler.rz(&c).unwrap().dim(), (2, 2));
        assembler.assemble(&mut c).unwrap();
        assert!(matches!(assembler.assemble(&mut c), Err(PsfError::ProfileConsumed(0))));
        assert!(matches!(assembler.rz(&c), Err(PsfError::ProfileConsumed(0))));
    }
}
