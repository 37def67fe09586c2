//! Job runner: builds the session, computes the volume and writes results.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ndarray::{Array3, Axis};
use serde::Serialize;

use psfmodels_compute::{ComputeBackend, SerialBackend};
use psfmodels_core::{OpticalParameters, PsfOptions, PsfSession, ZOrder};

use crate::config::JobConfig;

/// A computed volume with the metadata needed to write it out.
pub struct PsfOutput {
    pub volume: Array3<f64>,
    /// Focal position of each output plane, in output order.
    pub z_planes: Vec<f64>,
    pub params: OpticalParameters,
    pub options: PsfOptions,
}

impl PsfOutput {
    /// Index of the plane closest to the particle depth.
    pub fn focal_plane(&self) -> usize {
        let zp = self.params.particle_depth_um();
        self.z_planes
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - zp).abs().total_cmp(&(b.1 - zp).abs()))
            .map_or(0, |(i, _)| i)
    }
}

/// Run a full PSF computation from a parsed job configuration.
pub fn run_job(job: &JobConfig) -> Result<PsfOutput> {
    let params = job.parameters().context("Invalid optical parameters")?;
    let options = job.options();

    let requested = match &job.sampling.z_planes {
        Some(z) => z.clone(),
        None => params.centered_z_planes(),
    };

    println!(
        "  Model: {}, quadrature: {:?}, planes: {}, pixels: {} x {} at {} um",
        options.model.name(),
        options.rule,
        requested.len(),
        params.shape().ny,
        params.shape().nx,
        params.dxy_um()
    );

    let backend = create_backend(&job.model.backend, job.model.threads)?;
    let session =
        PsfSession::for_planes(params.clone(), options, &requested).with_backend(backend);
    println!("  Quadrature nodes: {}", session.nodes().len());

    let volume = session
        .volume_at(&requested)
        .context("PSF computation failed")?;

    let mut z_planes = requested;
    if options.z_order == ZOrder::Descending {
        z_planes.reverse();
    }

    Ok(PsfOutput {
        volume,
        z_planes,
        params,
        options,
    })
}

fn create_backend(preference: &str, threads: Option<usize>) -> Result<Arc<dyn ComputeBackend>> {
    let backend: Arc<dyn ComputeBackend> = match preference {
        "serial" => Arc::new(SerialBackend),
        "cpu" => cpu_backend(threads)?,
        other => anyhow::bail!("Unknown backend '{other}' (expected \"cpu\" or \"serial\")"),
    };
    let info = backend.device_info();
    match info.compute_units {
        Some(units) => println!("Backend: {} ({units} threads)", info.name),
        None => println!("Backend: {}", info.name),
    }
    Ok(backend)
}

#[cfg(feature = "cpu")]
fn cpu_backend(threads: Option<usize>) -> Result<Arc<dyn ComputeBackend>> {
    let backend = match threads {
        Some(n) => psfmodels_compute::CpuBackend::with_threads(n)?,
        None => psfmodels_compute::CpuBackend::new(),
    };
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "cpu"))]
fn cpu_backend(_threads: Option<usize>) -> Result<Arc<dyn ComputeBackend>> {
    log::warn!("Binary built without the `cpu` feature; falling back to the serial backend");
    Ok(Arc::new(SerialBackend))
}

#[derive(Serialize)]
struct VolumeRecord<'a> {
    shape: [usize; 3],
    z_planes_um: &'a [f64],
    dxy_um: f64,
    parameters: &'a OpticalParameters,
    options: &'a PsfOptions,
    /// Row-major (z, y, x) intensities.
    data: Vec<f64>,
}

/// Write the volume, its focal positions and the parameters to JSON.
pub fn write_volume_json(output: &PsfOutput, path: &Path) -> Result<()> {
    let (nz, ny, nx) = output.volume.dim();
    let record = VolumeRecord {
        shape: [nz, ny, nx],
        z_planes_um: &output.z_planes,
        dxy_um: output.params.dxy_um(),
        parameters: &output.params,
        options: &output.options,
        data: output.volume.iter().copied().collect(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&record)?;
    std::fs::write(path, json)?;

    println!("Volume written to: {}", path.display());
    Ok(())
}

fn write_header(file: &mut impl std::io::Write, title: &str, output: &PsfOutput) -> Result<()> {
    let p = &output.params;
    writeln!(file, "# psfmodels: {title}")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# model: {}, wavelength_nm: {}, NA: {}",
        output.options.model.name(),
        p.wavelength_nm(),
        p.numerical_aperture()
    )?;
    writeln!(
        file,
        "# ni: {}, ns: {}, ng: {}, particle_depth_um: {}",
        p.immersion_ri(),
        p.specimen_ri(),
        p.coverslip_ri(),
        p.particle_depth_um()
    )?;
    writeln!(file, "#")?;
    Ok(())
}

/// Write the intensity of the central pixel of each plane.
pub fn write_axial_profile_csv(output: &PsfOutput, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    write_header(&mut file, "axial profile", output)?;

    let (_, ny, nx) = output.volume.dim();
    let (cy, cx) = (ny / 2, nx / 2);
    writeln!(file, "z_um,intensity")?;
    for (plane, &z) in output.volume.axis_iter(Axis(0)).zip(&output.z_planes) {
        writeln!(file, "{:.4},{:.6e}", z, plane[[cy, cx]])?;
    }

    println!("Axial profile written to: {}", path.display());
    Ok(())
}

/// Write the plane closest to the particle depth as (y, x) rows.
pub fn write_central_plane_csv(output: &PsfOutput, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    write_header(&mut file, "focal plane", output)?;

    let index = output.focal_plane();
    writeln!(file, "# z_um: {:.4}", output.z_planes[index])?;
    let plane = output.volume.index_axis(Axis(0), index);
    for row in plane.rows() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.6e}")).collect();
        writeln!(file, "{}", line.join(","))?;
    }

    println!("Focal plane written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_job(extra: &str) -> JobConfig {
        toml::from_str(&format!(
            "[sampling]\nshape = [5, 9, 9]\nn_samples = 32\n\n[model]\nbackend = \"serial\"\n{extra}"
        ))
        .unwrap()
    }

    #[test]
    fn test_run_job_produces_normalized_volume() {
        let output = run_job(&small_job("")).unwrap();
        assert_eq!(output.volume.dim(), (5, 9, 9));
        assert_eq!(output.volume.iter().copied().fold(0.0, f64::max), 1.0);
        assert_eq!(output.focal_plane(), 2);
    }

    #[test]
    fn test_descending_job_reverses_plane_positions() {
        let output = run_job(&small_job("z_order = \"descending\"\n")).unwrap();
        assert!(output.z_planes[0] > output.z_planes[4]);
        assert_eq!(output.focal_plane(), 2);
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        let mut job = small_job("");
        job.model.backend = "gpu".into();
        assert!(run_job(&job).is_err());
    }

    #[test]
    fn test_outputs_are_written() {
        let output = run_job(&small_job("")).unwrap();
        let dir = std::env::temp_dir().join(format!("psfmodels-cli-test-{}", std::process::id()));

        write_volume_json(&output, &dir.join("psf.json")).unwrap();
        write_axial_profile_csv(&output, &dir.join("axial_profile.csv")).unwrap();
        write_central_plane_csv(&output, &dir.join("central_plane.csv")).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("psf.json")).unwrap()).unwrap();
        assert_eq!(json["shape"], serde_json::json!([5, 9, 9]));
        assert_eq!(json["data"].as_array().unwrap().len(), 5 * 9 * 9);

        let axial = std::fs::read_to_string(dir.join("axial_profile.csv")).unwrap();
        assert_eq!(axial.lines().filter(|l| !l.starts_with('#')).count(), 1 + 5);

        let plane = std::fs::read_to_string(dir.join("central_plane.csv")).unwrap();
        let rows: Vec<&str> = plane.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0].split(',').count(), 9);

        std::fs::remove_dir_all(&dir).ok();
    }
}
