//! psfmodels command-line interface.
//!
//! Compute PSF volumes from TOML job files:
//! ```sh
//! psfmodels run job.toml
//! psfmodels validate job.toml
//! psfmodels models
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "psfmodels")]
#[command(about = "Scalar and vectorial widefield microscope PSF volumes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a PSF volume from a TOML job file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a job file without computing anything.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the available diffraction models and quadrature rules.
    Models,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("psfmodels PSF engine");
            println!("====================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_json {
                runner::write_volume_json(&result, &out_dir.join("psf.json"))?;
            }
            if job.output.save_csv {
                runner::write_axial_profile_csv(&result, &out_dir.join("axial_profile.csv"))?;
                runner::write_central_plane_csv(&result, &out_dir.join("central_plane.csv"))?;
            }

            println!("PSF complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let params = job.parameters()?;
            let (nz, ny, nx) = params.shape().dim();
            let nz = job.sampling.z_planes.as_ref().map_or(nz, Vec::len);
            if nz == 0 {
                anyhow::bail!("`sampling.z_planes` is empty");
            }
            println!("Configuration is valid: {}", config.display());
            println!("  Output volume: {nz} x {ny} x {nx}");
            Ok(())
        }
        Commands::Models => {
            println!("Diffraction models ([model] type):");
            println!();
            println!("  scalar     - Gibson-Lanni scalar integral, J0 kernel");
            println!("  vectorial  - isotropic dipole, J0/J1/J2 channels (default)");
            println!();
            println!("Quadrature rules ([model] quadrature):");
            println!();
            println!("  gauss_legendre - Gauss-Legendre over the aperture (default)");
            println!("  simpson        - composite Simpson, equally spaced angles");
            Ok(())
        }
    }
}
