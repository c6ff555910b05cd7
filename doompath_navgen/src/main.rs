// CLI entry point for the navigation mesh generator.
//
// Reads a JSON level description, builds the walkability grid and the
// navigation mesh with `doompath_nav::build_navigation`, and writes the mesh
// (and optionally the grid) as JSON next to the input. Level problems that
// do not stop the build are logged as warnings and counted in the summary.
//
// Usage:
//   navgen <LEVEL.json> [OPTIONS]
//     --config <FILE>              Tuning file holding named datasets
//     --dataset <NAME>             Dataset or preset name (default: doom)
//     --resolution <N>             Lattice cells per player radius (1, 2 or 4)
//     --max-area-size <N>          Largest packed square side, map units
//     --max-area-size-merged <N>   Largest merged area side, map units
//     --write-grid                 Also write <level>.grid.json
//     --output <FILE>              Mesh output path (default: <level>.mesh.json)
//
// Logging goes through `tracing`; set RUST_LOG to change the level.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use doompath_nav::config::NavConfig;
use doompath_nav::level_map::LevelMap;
use doompath_nav::mesh::build_navigation;
use tracing::info;

/// Build a navigation mesh for a Doom-format level.
#[derive(Parser, Debug)]
#[command(name = "navgen", version, about, long_about = None)]
struct Args {
    /// JSON level description
    level: PathBuf,

    /// Tuning file holding named datasets
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset in the tuning file, or a built-in preset without one
    #[arg(long, default_value = "doom")]
    dataset: String,

    /// Lattice cells per player radius
    #[arg(long)]
    resolution: Option<u32>,

    /// Largest packed square side, in map units
    #[arg(long)]
    max_area_size: Option<u32>,

    /// Largest merged area side, in map units
    #[arg(long)]
    max_area_size_merged: Option<u32>,

    /// Also write the element grid
    #[arg(long)]
    write_grid: bool,

    /// Mesh output path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let json = fs::read_to_string(&args.level)
        .with_context(|| format!("reading level {}", args.level.display()))?;
    let level = LevelMap::from_json(&json)
        .with_context(|| format!("parsing level {}", args.level.display()))?;

    let build = build_navigation(&level, &config)
        .with_context(|| format!("building navigation for {}", args.level.display()))?;

    let mesh_path = args
        .output
        .clone()
        .unwrap_or_else(|| sibling(&args.level, "mesh.json"));
    write(&mesh_path, &build.mesh.to_json()?)?;

    if args.write_grid {
        write(&sibling(&args.level, "grid.json"), &build.grid.to_json()?)?;
    }

    info!(
        areas = build.mesh.areas().len(),
        connections = build.mesh.connections().len(),
        diagnostics = build.diagnostics.len(),
        output = %mesh_path.display(),
        "done"
    );
    Ok(())
}

/// The dataset from `--config`, or the named preset, with command-line
/// overrides applied and validated.
fn load_config(args: &Args) -> Result<NavConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            NavConfig::from_dataset_json(&json, &args.dataset)
                .with_context(|| format!("loading dataset {:?} from {}", args.dataset, path.display()))?
        }
        None => NavConfig::preset(&args.dataset)?,
    };

    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if let Some(size) = args.max_area_size {
        config.max_area_size = size;
    }
    if let Some(size) = args.max_area_size_merged {
        config.max_area_size_merged = size;
    }
    config.validate().context("invalid navigation config")?;
    Ok(config)
}

/// `<dir>/<stem>.<suffix>` for the level file `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "level".to_string());
    path.with_file_name(format!("{stem}.{suffix}"))
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = contents.len(), "wrote");
    Ok(())
}
