//! Mosaic optimizer CLI
//!
//! `build` turns a scene catalog and an AOI into a candidate-set artifact,
//! `select` runs the selection model on an artifact, and `run` does both and
//! validates the result against the exact union.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use mosaic_backend::io::candidates::{load_candidates, save_candidates, save_selection, SelectionOutput};
use mosaic_backend::io::catalog::{load_aoi, load_catalog};
use mosaic_backend::{ConfigError, MosaicOptimizer, OptimizationError, OptimizerConfig};

#[derive(Parser)]
#[command(name = "mosaic-optimizer")]
#[command(about = "Select satellite scene mosaics covering an area of interest", long_about = None)]
struct Args {
    /// Optimizer configuration (TOML); defaults to mosaic.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the maximum number of selected mosaics
    #[arg(long, global = true)]
    max_mosaics: Option<usize>,

    /// Override the solver time limit in seconds
    #[arg(long, global = true)]
    time_limit: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build candidate mosaics from a scene catalog
    Build {
        /// Scene catalog JSON
        #[arg(long)]
        catalog: PathBuf,
        /// AOI JSON
        #[arg(long)]
        aoi: PathBuf,
        /// Candidate-set output path
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Select mosaics from a candidate-set artifact
    Select {
        /// Candidate-set JSON written by `build`
        #[arg(long)]
        candidates: PathBuf,
        /// Selection output path
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Build, select and validate in one go
    Run {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        aoi: PathBuf,
        /// Selection output path
        #[arg(long, short)]
        output: PathBuf,
        /// Also write the candidate-set artifact here
        #[arg(long)]
        candidates_out: Option<PathBuf>,
    },
}

fn load_config(args: &Args) -> Result<OptimizerConfig> {
    let mut config = match &args.config {
        Some(path) => OptimizerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => match OptimizerConfig::from_default_location() {
            Ok(config) => config,
            Err(ConfigError::NotFound) => OptimizerConfig::default(),
            Err(e) => return Err(e).context("Failed to load mosaic.toml"),
        },
    };

    if let Some(max) = args.max_mosaics {
        config.selection.max_mosaics = max;
    }
    if let Some(limit) = args.time_limit {
        config.solver.time_limit_secs = Some(limit);
    }
    Ok(config)
}

async fn execute(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let optimizer = MosaicOptimizer::with_config(config)?;

    match args.command {
        Command::Build {
            catalog,
            aoi,
            output,
        } => {
            let scenes = load_catalog(&catalog)?;
            let aoi = load_aoi(&aoi)?;
            let build = optimizer.build_candidates(scenes, &aoi)?;
            save_candidates(&output, &build.candidates)?;
            info!(
                "Wrote {} candidate mosaics to {}",
                build.candidates.mosaics.len(),
                output.display()
            );
        }
        Command::Select { candidates, output } => {
            let candidates = load_candidates(&candidates)?;
            let result = optimizer.select(&candidates).await?;
            save_selection(&output, &SelectionOutput::new(&candidates, &result, None))?;
            info!("Wrote selection to {}", output.display());
        }
        Command::Run {
            catalog,
            aoi,
            output,
            candidates_out,
        } => {
            let scenes = load_catalog(&catalog)?;
            let aoi = load_aoi(&aoi)?;

            let build = optimizer.build_candidates(scenes, &aoi)?;
            if let Some(path) = &candidates_out {
                save_candidates(path, &build.candidates)?;
            }
            let run = optimizer.select_and_validate(build, &aoi).await?;

            if let Some(report) = &run.report {
                info!(
                    "True coverage {:.2}%, estimated {:.2}% ({:+.2} pp)",
                    report.true_coverage * 100.0,
                    report.estimated_coverage * 100.0,
                    report.difference_pp
                );
            }
            let selection = SelectionOutput::new(&run.build.candidates, &run.selection, run.report);
            save_selection(&output, &selection)?;
            info!("Wrote selection to {}", output.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = execute(args).await {
        eprintln!("Error: {:#}", e);
        let selection_failure = e
            .downcast_ref::<OptimizationError>()
            .map(OptimizationError::is_selection_failure)
            .unwrap_or(false);
        process::exit(if selection_failure { 2 } else { 1 });
    }
}
