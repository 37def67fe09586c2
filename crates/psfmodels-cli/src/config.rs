//! TOML configuration deserialisation for PSF jobs.

use psfmodels_core::{
    Model, OpticalParameters, PsfError, PsfOptions, QuadratureRule, ZOrder,
};
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub optics: OpticsConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Objective, coverslip and specimen description.
///
/// Design values default to the actual ones when omitted.
#[derive(Debug, Deserialize)]
pub struct OpticsConfig {
    /// Emission wavelength in nm.
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,
    #[serde(default = "default_na")]
    pub numerical_aperture: f64,
    #[serde(default = "default_oil_ri")]
    pub immersion_ri: f64,
    pub immersion_ri_design: Option<f64>,
    #[serde(default = "default_specimen_ri")]
    pub specimen_ri: f64,
    pub specimen_ri_design: Option<f64>,
    #[serde(default = "default_oil_ri")]
    pub coverslip_ri: f64,
    pub coverslip_ri_design: Option<f64>,
    /// Design immersion thickness in µm.
    #[serde(default = "default_working_distance")]
    pub working_distance: f64,
    #[serde(default = "default_coverslip_thickness")]
    pub coverslip_thickness: f64,
    pub coverslip_thickness_design: Option<f64>,
    #[serde(default)]
    pub specimen_thickness_design: f64,
    /// Emitter depth below the coverslip in µm.
    #[serde(default)]
    pub particle_depth: f64,
    /// Emitter (x, y) position relative to the volume centre in µm.
    #[serde(default)]
    pub lateral_offset: [f64; 2],
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self {
            wavelength: default_wavelength(),
            numerical_aperture: default_na(),
            immersion_ri: default_oil_ri(),
            immersion_ri_design: None,
            specimen_ri: default_specimen_ri(),
            specimen_ri_design: None,
            coverslip_ri: default_oil_ri(),
            coverslip_ri_design: None,
            working_distance: default_working_distance(),
            coverslip_thickness: default_coverslip_thickness(),
            coverslip_thickness_design: None,
            specimen_thickness_design: 0.0,
            particle_depth: 0.0,
            lateral_offset: [0.0, 0.0],
        }
    }
}

fn default_wavelength() -> f64 {
    600.0
}
fn default_na() -> f64 {
    1.4
}
fn default_oil_ri() -> f64 {
    1.515
}
fn default_specimen_ri() -> f64 {
    1.47
}
fn default_working_distance() -> f64 {
    150.0
}
fn default_coverslip_thickness() -> f64 {
    170.0
}

/// Output grid and integration sampling.
#[derive(Debug, Deserialize)]
pub struct SamplingConfig {
    /// Lateral pixel size in µm.
    #[serde(default = "default_step")]
    pub dxy: f64,
    /// Axial plane spacing in µm.
    #[serde(default = "default_step")]
    pub dz: f64,
    /// Volume shape as [nz, ny, nx].
    #[serde(default = "default_shape")]
    pub shape: [usize; 3],
    /// Quadrature samples; adaptive when omitted.
    #[serde(default, alias = "num_basis")]
    pub n_samples: Option<usize>,
    #[serde(default = "default_oversampling")]
    pub oversampling: usize,
    /// Explicit focal positions in µm, replacing the stack centred on the
    /// particle.
    #[serde(default)]
    pub z_planes: Option<Vec<f64>>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            dxy: default_step(),
            dz: default_step(),
            shape: default_shape(),
            n_samples: None,
            oversampling: default_oversampling(),
            z_planes: None,
        }
    }
}

fn default_step() -> f64 {
    0.05
}
fn default_shape() -> [usize; 3] {
    [31, 31, 31]
}
fn default_oversampling() -> usize {
    3
}

/// Diffraction model and execution settings.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// "scalar" or "vectorial". Default: "vectorial".
    #[serde(default, rename = "type")]
    pub kind: Model,
    /// "gauss_legendre" or "simpson". Default: "gauss_legendre".
    #[serde(default)]
    pub quadrature: QuadratureRule,
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// "ascending" or "descending". Default: "ascending".
    #[serde(default)]
    pub z_order: ZOrder,
    /// Compute backend: "cpu" or "serial". Default: "cpu".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Worker threads for the CPU backend; Rayon's global pool when omitted.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: Model::default(),
            quadrature: QuadratureRule::default(),
            normalize: true,
            z_order: ZOrder::default(),
            backend: default_backend(),
            threads: None,
        }
    }
}

fn default_backend() -> String {
    "cpu".into()
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the volume as JSON (default: true).
    #[serde(default = "default_true")]
    pub save_json: bool,
    /// Whether to save the axial profile and focal plane as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_json: true,
            save_csv: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    /// Validated optical parameters for this job.
    pub fn parameters(&self) -> Result<OpticalParameters, PsfError> {
        let o = &self.optics;
        let s = &self.sampling;

        let mut builder = OpticalParameters::builder()
            .wavelength_nm(o.wavelength)
            .numerical_aperture(o.numerical_aperture)
            .immersion_ri(o.immersion_ri)
            .specimen_ri(o.specimen_ri)
            .coverslip_ri(o.coverslip_ri)
            .working_distance_um(o.working_distance)
            .coverslip_thickness_um(o.coverslip_thickness)
            .specimen_thickness_design_um(o.specimen_thickness_design)
            .particle_depth_um(o.particle_depth)
            .lateral_offset_um(o.lateral_offset[0], o.lateral_offset[1])
            .dxy_um(s.dxy)
            .dz_um(s.dz)
            .shape(s.shape[0], s.shape[1], s.shape[2])
            .oversampling(s.oversampling);

        if let Some(v) = o.immersion_ri_design {
            builder = builder.immersion_ri_design(v);
        }
        if let Some(v) = o.specimen_ri_design {
            builder = builder.specimen_ri_design(v);
        }
        if let Some(v) = o.coverslip_ri_design {
            builder = builder.coverslip_ri_design(v);
        }
        if let Some(v) = o.coverslip_thickness_design {
            builder = builder.coverslip_thickness_design_um(v);
        }
        if let Some(n) = s.n_samples {
            builder = builder.n_samples(n);
        }

        builder.build()
    }

    pub fn options(&self) -> PsfOptions {
        PsfOptions {
            model: self.model.kind,
            rule: self.model.quadrature,
            normalize: self.model.normalize,
            z_order: self.model.z_order,
        }
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: JobConfig = toml::from_str(&content)?;
    Ok(config)
}
