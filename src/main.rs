use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tectonic_heightmap::export;
use tectonic_heightmap::{generate_heightmap, TerrainConfig, TerrainError};

#[derive(Parser, Debug)]
#[command(name = "tectonic_heightmap")]
#[command(about = "Generate wrapping heightmaps from Voronoi tectonic plates")]
struct Args {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Side length of the square image and working area in pixels
    #[arg(long, default_value = "1024")]
    size: usize,

    /// Number of Voronoi sites (config value if not specified)
    #[arg(short = 'n', long)]
    points: Option<usize>,

    /// Number of plates including the two poles (config value if not specified)
    #[arg(short = 'p', long)]
    plates: Option<usize>,

    /// JSON file with generation parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grayscale heightmap output path
    #[arg(short, long, default_value = "heightmap.png")]
    output: PathBuf,

    /// Also write a spectral-coloured preview to this path
    #[arg(long)]
    spectral: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<TerrainConfig, TerrainError> {
    let mut config = match &args.config {
        Some(path) => TerrainConfig::from_file(path)?,
        None => TerrainConfig::default(),
    };
    config.working_width = args.size;
    config.working_height = args.size;
    if let Some(points) = args.points {
        config.point_count = points;
    }
    if let Some(plates) = args.plates {
        config.plate_count = plates;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    println!("Generating heightmap with seed: {}", seed);
    println!(
        "Map size: {}x{}, {} points, {} plates",
        args.size, args.size, config.point_count, config.plate_count
    );

    let pixels = vec![0.0; args.size * args.size];
    let heightmap = match generate_heightmap(pixels, args.size, args.size, seed, &config) {
        Ok(buffer) => buffer,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("Exporting heightmap to {}...", args.output.display());
    if let Err(err) = export::export_heightmap(&heightmap, &args.output) {
        eprintln!("error: failed to write {}: {err}", args.output.display());
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.spectral {
        println!("Exporting spectral preview to {}...", path.display());
        if let Err(err) = export::export_spectral(&heightmap, path) {
            eprintln!("error: failed to write {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    }

    println!("Done.");
    ExitCode::SUCCESS
}
