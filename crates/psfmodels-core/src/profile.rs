//! Radial intensity profiles and the per-request cache that hands them to
//! the volume assembler.

use crate::error::PsfError;
use crate::params::OpticalParameters;

/// Equally spaced radii $r_j = j\,\Delta r$, $j = 0 \dots M-1$, in µm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialGrid {
    step_um: f64,
    len: usize,
}

impl RadialGrid {
    pub fn new(step_um: f64, len: usize) -> Self {
        Self { step_um, len }
    }

    /// Grid at `dxy / oversampling` long enough to reach every pixel of the
    /// output plane, corners and lateral particle offset included.
    pub fn for_params(params: &OpticalParameters) -> Self {
        let shape = params.shape();
        let s = params.oversampling() as f64;
        let step = params.dxy_um() / s;
        let [ox, oy] = params.lateral_offset_um();

        let half_extent = (shape.nx.max(shape.ny) as f64 * s - 1.0) / 2.0;
        let corner = (std::f64::consts::SQRT_2 * half_extent).ceil().max(0.0) as usize;
        let shift = (ox.hypot(oy) / step).ceil() as usize;

        Self::new(step, corner.saturating_add(shift).saturating_add(2))
    }

    pub fn step_um(&self) -> f64 {
        self.step_um
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest sampled radius.
    pub fn max_radius_um(&self) -> f64 {
        self.len.saturating_sub(1) as f64 * self.step_um
    }

    pub fn radii(&self) -> Vec<f64> {
        (0..self.len).map(|j| j as f64 * self.step_um).collect()
    }
}

/// Intensity on a [`RadialGrid`] for one focal plane.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProfile {
    z_um: f64,
    step_um: f64,
    intensity: Vec<f64>,
}

impl RadialProfile {
    pub fn new(z_um: f64, grid: RadialGrid, intensity: Vec<f64>) -> Self {
        debug_assert_eq!(grid.len(), intensity.len());
        Self {
            z_um,
            step_um: grid.step_um(),
            intensity,
        }
    }

    pub fn z_um(&self) -> f64 {
        self.z_um
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// `(radius, intensity)` pairs in increasing radius.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.intensity
            .iter()
            .enumerate()
            .map(move |(j, &v)| (j as f64 * self.step_um, v))
    }

    /// Linear interpolation at `radius_um`. Radii past the last sample take
    /// the last sample's value.
    pub fn interpolate(&self, radius_um: f64) -> f64 {
        let Some(&last) = self.intensity.last() else {
            return 0.0;
        };
        let t = radius_um / self.step_um;
        let j = t.floor() as usize;
        if j + 1 >= self.intensity.len() {
            return last;
        }
        let frac = t - j as f64;
        self.intensity[j] * (1.0 - frac) + self.intensity[j + 1] * frac
    }
}

/// One slot per requested plane. Each profile can be taken exactly once.
#[derive(Debug)]
pub struct RadialProfileCache {
    slots: Vec<Option<RadialProfile>>,
}

impl RadialProfileCache {
    pub fn new(profiles: Vec<RadialProfile>) -> Self {
        Self {
            slots: profiles.into_iter().map(Some).collect(),
        }
    }

    /// Number of planes, taken or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow a profile that has not been taken yet.
    pub fn get(&self, plane: usize) -> Option<&RadialProfile> {
        self.slots.get(plane).and_then(Option::as_ref)
    }

    /// Move the profile for `plane` out of the cache.
    pub fn take(&mut self, plane: usize) -> Result<RadialProfile, PsfError> {
        let n = self.slots.len();
        let slot = self.slots.get_mut(plane).ok_or_else(|| {
            PsfError::ConfigurationMismatch(format!(
                "plane {plane} requested from a cache of {n} planes"
            ))
        })?;
        slot.take().ok_or(PsfError::ProfileConsumed(plane))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn profile(values: &[f64]) -> RadialProfile {
        RadialProfile::new(0.0, RadialGrid::new(0.1, values.len()), values.to_vec())
    }

    #[test]
    fn test_grid_covers_every_pixel() {
        let params = OpticalParameters::builder()
            .shape(1, 31, 21)
            .dxy_um(0.05)
            .oversampling(3)
            .build()
            .unwrap();
        let grid = RadialGrid::for_params(&params);
        let corner = (15.0_f64).hypot(10.0) * 0.05;
        assert!(grid.max_radius_um() >= corner);
        assert_abs_diff_eq!(grid.step_um(), 0.05 / 3.0, epsilon = 1e-15);
    }

    #[test]
    fn test_grid_grows_with_lateral_offset() {
        let base = OpticalParameters::builder().build().unwrap();
        let shifted = OpticalParameters::builder()
            .lateral_offset_um(0.3, -0.4)
            .build()
            .unwrap();
        let extra = RadialGrid::for_params(&shifted).len() - RadialGrid::for_params(&base).len();
        // 0.5 um at 0.05/3 um per sample
        assert_eq!(extra, 30);
    }

    #[test]
    fn test_interpolation_is_linear_between_samples() {
        let p = profile(&[4.0, 2.0, 1.0]);
        assert_abs_diff_eq!(p.interpolate(0.0), 4.0);
        assert_abs_diff_eq!(p.interpolate(0.05), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.interpolate(0.175), 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_radii_past_last_sample_clamp() {
        let p = profile(&[4.0, 2.0, 1.0]);
        assert_eq!(p.interpolate(0.2), 1.0);
        assert_eq!(p.interpolate(7.5), 1.0);
    }

    #[test]
    fn test_samples_pair_radius_with_intensity() {
        let p = profile(&[4.0, 2.0]);
        let samples: Vec<_> = p.samples().collect();
        assert_eq!(samples, vec![(0.0, 4.0), (0.1, 2.0)]);
    }

    #[test]
    fn test_profiles_are_taken_once() {
        let mut cache = RadialProfileCache::new(vec![profile(&[1.0]), profile(&[2.0])]);
        assert_eq!(cache.take(1).unwrap().intensity(), &[2.0]);
        assert!(cache.get(1).is_none());
        assert!(cache.get(0).is_some());
        assert!(matches!(cache.take(1), Err(PsfError::ProfileConsumed(1))));
        assert!(matches!(cache.take(5), Err(PsfError::ConfigurationMismatch(_))));
        assert_eq!(cache.len(), 2);
    }
}
