//! Optical and sampling parameters for a PSF request.
//!
//! [`OpticalParameters`] is immutable once built. Changing any field means
//! building a new value, since every derived quantity (quadrature nodes,
//! optical path model, radial grid) depends on it.
//!
//! Units: wavelength in nanometres, every length in micrometres.

use serde::Serialize;

use crate::error::PsfError;

/// Output volume shape, ordered (z, y, x) like the returned array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolumeShape {
    pub nz: usize,
    pub ny: usize,
    pub nx: usize,
}

impl VolumeShape {
    pub fn new(nz: usize, ny: usize, nx: usize) -> Self {
        Self { nz, ny, nx }
    }

    /// The shape as an `ndarray` dimension tuple.
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.nz, self.ny, self.nx)
    }
}

/// Validated optical configuration.
///
/// The stack modelled, from emitter to objective, is specimen → coverslip →
/// immersion medium. Each layer has an actual and a design state; the
/// mismatch between the two drives the aberration terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpticalParameters {
    wavelength_nm: f64,
    numerical_aperture: f64,
    immersion_ri: f64,
    immersion_ri_design: f64,
    specimen_ri: f64,
    specimen_ri_design: f64,
    coverslip_ri: f64,
    coverslip_ri_design: f64,
    working_distance_um: f64,
    coverslip_thickness_um: f64,
    coverslip_thickness_design_um: f64,
    specimen_thickness_design_um: f64,
    particle_depth_um: f64,
    lateral_offset_um: [f64; 2],
    dxy_um: f64,
    dz_um: f64,
    shape: VolumeShape,
    n_samples: Option<usize>,
    oversampling: usize,
}

impl OpticalParameters {
    pub fn builder() -> OpticalParametersBuilder {
        OpticalParametersBuilder::default()
    }

    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength_nm
    }

    /// Vacuum wavelength in micrometres.
    pub fn wavelength_um(&self) -> f64 {
        self.wavelength_nm * 1e-3
    }

    /// Vacuum wavenumber $k = 2\pi / \lambda$ (µm⁻¹).
    pub fn wavenumber(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength_um()
    }

    pub fn numerical_aperture(&self) -> f64 {
        self.numerical_aperture
    }

    pub fn immersion_ri(&self) -> f64 {
        self.immersion_ri
    }

    pub fn immersion_ri_design(&self) -> f64 {
        self.immersion_ri_design
    }

    pub fn specimen_ri(&self) -> f64 {
        self.specimen_ri
    }

    pub fn specimen_ri_design(&self) -> f64 {
        self.specimen_ri_design
    }

    pub fn coverslip_ri(&self) -> f64 {
        self.coverslip_ri
    }

    pub fn coverslip_ri_design(&self) -> f64 {
        self.coverslip_ri_design
    }

    /// Design thickness of the immersion layer (µm).
    pub fn working_distance_um(&self) -> f64 {
        self.working_distance_um
    }

    pub fn coverslip_thickness_um(&self) -> f64 {
        self.coverslip_thickness_um
    }

    pub fn coverslip_thickness_design_um(&self) -> f64 {
        self.coverslip_thickness_design_um
    }

    /// Thickness of specimen the objective was designed to image through.
    /// Zero for the usual "emitter on the coverslip" design.
    pub fn specimen_thickness_design_um(&self) -> f64 {
        self.specimen_thickness_design_um
    }

    /// Depth of the emitter below the coverslip (µm).
    pub fn particle_depth_um(&self) -> f64 {
        self.particle_depth_um
    }

    /// Lateral (x, y) position of the emitter relative to the volume centre (µm).
    pub fn lateral_offset_um(&self) -> [f64; 2] {
        self.lateral_offset_um
    }

    pub fn dxy_um(&self) -> f64 {
        self.dxy_um
    }

    pub fn dz_um(&self) -> f64 {
        self.dz_um
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// Requested quadrature order; `None` selects an adaptive order.
    pub fn n_samples(&self) -> Option<usize> {
        self.n_samples
    }

    /// Radial samples per lateral pixel.
    pub fn oversampling(&self) -> usize {
        self.oversampling
    }

    /// Maximum aperture half-angle in the immersion medium, $\arcsin(NA / n_i)$.
    pub fn half_angle(&self) -> f64 {
        (self.numerical_aperture / self.immersion_ri).asin()
    }

    /// Focal positions of a stack of `nz` planes spaced by `dz`, centred on
    /// the particle depth.
    pub fn centered_z_planes(&self) -> Vec<f64> {
        let nz = self.shape.nz;
        let mid = (nz as f64 - 1.0) / 2.0;
        (0..nz)
            .map(|i| self.particle_depth_um + (i as f64 - mid) * self.dz_um)
            .collect()
    }
}

/// Builder for [`OpticalParameters`], pre-filled with an oil-immersion
/// 1.4 NA objective imaging into an aqueous-glycerol specimen.
#[derive(Debug, Clone)]
pub struct OpticalParametersBuilder {
    pub wavelength_nm: f64,
    pub numerical_aperture: f64,
    pub immersion_ri: f64,
    pub immersion_ri_design: f64,
    pub specimen_ri: f64,
    pub specimen_ri_design: f64,
    pub coverslip_ri: f64,
    pub coverslip_ri_design: f64,
    pub working_distance_um: f64,
    pub coverslip_thickness_um: f64,
    pub coverslip_thickness_design_um: f64,
    pub specimen_thickness_design_um: f64,
    pub particle_depth_um: f64,
    pub lateral_offset_um: [f64; 2],
    pub dxy_um: f64,
    pub dz_um: f64,
    pub shape: VolumeShape,
    pub n_samples: Option<usize>,
    pub oversampling: usize,
}

impl Default for OpticalParametersBuilder {
    fn default() -> Self {
        Self {
            wavelength_nm: 600.0,
            numerical_aperture: 1.4,
            immersion_ri: 1.515,
            immersion_ri_design: 1.515,
            specimen_ri: 1.47,
            specimen_ri_design: 1.47,
            coverslip_ri: 1.515,
            coverslip_ri_design: 1.515,
            working_distance_um: 150.0,
            coverslip_thickness_um: 170.0,
            coverslip_thickness_design_um: 170.0,
            specimen_thickness_design_um: 0.0,
            particle_depth_um: 0.0,
            lateral_offset_um: [0.0, 0.0],
            dxy_um: 0.05,
            dz_um: 0.05,
            shape: VolumeShape::new(31, 31, 31),
            n_samples: None,
            oversampling: 3,
        }
    }
}

impl OpticalParametersBuilder {
    pub fn wavelength_nm(mut self, value: f64) -> Self {
        self.wavelength_nm = value;
        self
    }

    pub fn numerical_aperture(mut self, value: f64) -> Self {
        self.numerical_aperture = value;
        self
    }

    /// Set the immersion index, actual and design alike.
    pub fn immersion_ri(mut self, value: f64) -> Self {
        self.immersion_ri = value;
        self.immersion_ri_design = value;
        self
    }

    pub fn immersion_ri_design(mut self, value: f64) -> Self {
        self.immersion_ri_design = value;
        self
    }

    /// Set the specimen index, actual and design alike.
    pub fn specimen_ri(mut self, value: f64) -> Self {
        self.specimen_ri = value;
        self.specimen_ri_design = value;
        self
    }

    pub fn specimen_ri_design(mut self, value: f64) -> Self {
        self.specimen_ri_design = value;
        self
    }

    /// Set the coverslip index, actual and design alike.
    pub fn coverslip_ri(mut self, value: f64) -> Self {
        self.coverslip_ri = value;
        self.coverslip_ri_design = value;
        self
    }

    pub fn coverslip_ri_design(mut self, value: f64) -> Self {
        self.coverslip_ri_design = value;
        self
    }

    pub fn working_distance_um(mut self, value: f64) -> Self {
        self.working_distance_um = value;
        self
    }

    /// Set the coverslip thickness, actual and design alike.
    pub fn coverslip_thickness_um(mut self, value: f64) -> Self {
        self.coverslip_thickness_um = value;
        self.coverslip_thickness_design_um = value;
        self
    }

    pub fn coverslip_thickness_design_um(mut self, value: f64) -> Self {
        self.coverslip_thickness_design_um = value;
        self
    }

    pub fn specimen_thickness_design_um(mut self, value: f64) -> Self {
        self.specimen_thickness_design_um = value;
        self
    }

    pub fn particle_depth_um(mut self, value: f64) -> Self {
        self.particle_depth_um = value;
        self
    }

    pub fn lateral_offset_um(mut self, x: f64, y: f64) -> Self {
        self.lateral_offset_um = [x, y];
        self
    }

    pub fn dxy_um(mut self, value: f64) -> Self {
        self.dxy_um = value;
        self
    }

    pub fn dz_um(mut self, value: f64) -> Self {
        self.dz_um = value;
        self
    }

    pub fn shape(mut self, nz: usize, ny: usize, nx: usize) -> Self {
        self.shape = VolumeShape::new(nz, ny, nx);
        self
    }

    pub fn n_samples(mut self, value: usize) -> Self {
        self.n_samples = Some(value);
        self
    }

    pub fn oversampling(mut self, value: usize) -> Self {
        self.oversampling = value;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<OpticalParameters, PsfError> {
        positive("wavelength_nm", self.wavelength_nm)?;
        positive("immersion_ri", self.immersion_ri)?;
        positive("immersion_ri_design", self.immersion_ri_design)?;
        positive("specimen_ri", self.specimen_ri)?;
        positive("specimen_ri_design", self.specimen_ri_design)?;
        positive("coverslip_ri", self.coverslip_ri)?;
        positive("coverslip_ri_design", self.coverslip_ri_design)?;
        positive("numerical_aperture", self.numerical_aperture)?;

        // The aperture angle lives in the immersion medium; specimen and
        // coverslip may sit below NA (supercritical angles go evanescent).
        for (name, ri) in [
            ("immersion_ri", self.immersion_ri),
            ("immersion_ri_design", self.immersion_ri_design),
        ] {
            if self.numerical_aperture >= ri {
                return Err(PsfError::invalid(
                    "numerical_aperture",
                    format!(
                        "NA {} must be below {} ({})",
                        self.numerical_aperture, name, ri
                    ),
                ));
            }
        }

        positive("working_distance_um", self.working_distance_um)?;
        positive("coverslip_thickness_um", self.coverslip_thickness_um)?;
        positive(
            "coverslip_thickness_design_um",
            self.coverslip_thickness_design_um,
        )?;
        if self.specimen_thickness_design_um < 0.0
            || !self.specimen_thickness_design_um.is_finite()
        {
            return Err(PsfError::invalid(
                "specimen_thickness_design_um",
                format!("must be >= 0, got {}", self.specimen_thickness_design_um),
            ));
        }
        finite("particle_depth_um", self.particle_depth_um)?;
        finite("lateral_offset_um", self.lateral_offset_um[0])?;
        finite("lateral_offset_um", self.lateral_offset_um[1])?;
        positive("dxy_um", self.dxy_um)?;
        positive("dz_um", self.dz_um)?;

        if let Some(n) = self.n_samples {
            if n < 4 {
                return Err(PsfError::invalid(
                    "n_samples",
                    format!("at least 4 quadrature samples are required, got {n}"),
                ));
            }
        }
        if self.oversampling == 0 {
            return Err(PsfError::invalid("oversampling", "must be at least 1"));
        }

        // The radial grid extends past the offset at dxy / oversampling.
        let offset = self.lateral_offset_um[0].hypot(self.lateral_offset_um[1]);
        let offset_samples = offset * self.oversampling as f64 / self.dxy_um;
        if offset_samples > MAX_OFFSET_SAMPLES {
            return Err(PsfError::invalid(
                "lateral_offset_um",
                format!("offset of {offset} um spans more than {MAX_OFFSET_SAMPLES:e} radial samples"),
            ));
        }

        let VolumeShape { nz, ny, nx } = self.shape;
        if nz == 0 || ny == 0 || nx == 0 {
            return Err(PsfError::ConfigurationMismatch(format!(
                "output shape ({nz}, {ny}, {nx}) has a zero-sized dimension"
            )));
        }

        Ok(OpticalParameters {
            wavelength_nm: self.wavelength_nm,
            numerical_aperture: self.numerical_aperture,
            immersion_ri: self.immersion_ri,
            immersion_ri_design: self.immersion_ri_design,
            specimen_ri: self.specimen_ri,
            specimen_ri_design: self.specimen_ri_design,
            coverslip_ri: self.coverslip_ri,
            coverslip_ri_design: self.coverslip_ri_design,
            working_distance_um: self.working_distance_um,
            coverslip_thickness_um: self.coverslip_thickness_um,
            coverslip_thickness_design_um: self.coverslip_thickness_design_um,
            specimen_thickness_design_um: self.specimen_thickness_design_um,
            particle_depth_um: self.particle_depth_um,
            lateral_offset_um: self.lateral_offset_um,
            dxy_um: self.dxy_um,
            dz_um: self.dz_um,
            shape: self.shape,
            n_samples: self.n_samples,
            oversampling: self.oversampling,
        })
    }
}

/// Largest lateral offset, in radial samples, a request may carry.
const MAX_OFFSET_SAMPLES: f64 = 1e6;

fn positive(name: &'static str, value: f64) -> Result<(), PsfError> {
    // NaN fails the comparison as well
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PsfError::invalid(name, format!("must be positive and finite, got {value}")))
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), PsfError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PsfError::invalid(name, format!("must be finite, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn expect_invalid(builder: OpticalParametersBuilder, field: &str) {
        match builder.build() {
            Err(PsfError::InvalidParameter { name, .. }) => assert_eq!(name, field),
            other => panic!("expected InvalidParameter({field}), got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let p = OpticalParameters::builder().build().unwrap();
        assert_eq!(p.shape(), VolumeShape::new(31, 31, 31));
        assert_abs_diff_eq!(p.wavelength_um(), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(p.half_angle(), (1.4_f64 / 1.515).asin(), epsilon = 1e-12);
    }

    #[test]
    fn test_na_at_or_above_immersion_index_is_rejected() {
        expect_invalid(
            OpticalParameters::builder().numerical_aperture(1.515),
            "numerical_aperture",
        );
        expect_invalid(
            OpticalParameters::builder()
                .numerical_aperture(1.45)
                .immersion_ri_design(1.40),
            "numerical_aperture",
        );
    }

    #[test]
    fn test_na_above_specimen_index_is_allowed() {
        let p = OpticalParameters::builder()
            .numerical_aperture(1.4)
            .specimen_ri(1.33)
            .build();
        assert!(p.is_ok());
    }

    #[test]
    fn test_non_positive_lengths_and_indices_are_rejected() {
        expect_invalid(OpticalParameters::builder().wavelength_nm(0.0), "wavelength_nm");
        expect_invalid(OpticalParameters::builder().coverslip_ri(-1.5), "coverslip_ri");
        expect_invalid(OpticalParameters::builder().dxy_um(0.0), "dxy_um");
        expect_invalid(OpticalParameters::builder().dz_um(f64::NAN), "dz_um");
        expect_invalid(
            OpticalParameters::builder().working_distance_um(-3.0),
            "working_distance_um",
        );
        expect_invalid(OpticalParameters::builder().n_samples(3), "n_samples");
        expect_invalid(OpticalParameters::builder().oversampling(0), "oversampling");
    }

    #[test]
    fn test_negative_particle_depth_is_allowed() {
        assert!(OpticalParameters::builder()
            .particle_depth_um(-2.0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_huge_lateral_offset_is_rejected() {
        expect_invalid(
            OpticalParameters::builder().lateral_offset_um(1e300, 0.0),
            "lateral_offset_um",
        );
        expect_invalid(
            OpticalParameters::builder().lateral_offset_um(1e308, -1e308),
            "lateral_offset_um",
        );
        // 1e5 um at 0.05 / 3 um per sample is 6e6 samples.
        expect_invalid(
            OpticalParameters::builder().lateral_offset_um(0.0, 1e5),
            "lateral_offset_um",
        );
        let far = OpticalParameters::builder()
            .lateral_offset_um(1000.0, -1000.0)
            .shape(1, 8, 8)
            .build()
            .unwrap();
        let grid = crate::profile::RadialGrid::for_params(&far);
        assert!(grid.max_radius_um() > 1000.0 * std::f64::consts::SQRT_2);
    }

    #[test]
    fn test_zero_sized_shape_is_a_configuration_mismatch() {
        let err = OpticalParameters::builder().shape(0, 31, 31).build().unwrap_err();
        assert!(matches!(err, PsfError::ConfigurationMismatch(_)));
    }

    #[test]
    fn test_centered_planes_straddle_particle_depth() {
        let p = OpticalParameters::builder()
            .particle_depth_um(2.0)
            .dz_um(0.1)
            .shape(5, 8, 8)
            .build()
            .unwrap();
        let z = p.centered_z_planes();
        assert_eq!(z.len(), 5);
        assert_abs_diff_eq!(z[0], 1.8, epsilon = 1e-12);
        assert_abs_diff_eq!(z[2], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[4], 2.2, epsilon = 1e-12);
    }

    #[test]
    fn test_parameters_serialize_with_units_in_names() {
        let p = OpticalParameters::builder().n_samples(80).build().unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["wavelength_nm"], 600.0);
        assert_eq!(json["shape"]["nz"], 31);
        assert_eq!(json["n_samples"], 80);
    }
}
