use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use heightfield_erosion::erosion::{
    CapacityErosionSettings, ErosionModel, HeatMaps, SimpleErosionSettings,
};
use heightfield_erosion::export;
use heightfield_erosion::heightmap::{generate_seed_field, HeightField, NoiseParams};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModelKind {
    Droplet,
    Capacity,
}

#[derive(Parser, Debug)]
#[command(name = "heightfield_erosion")]
#[command(about = "Erode a procedural height field with droplet or particle simulation")]
struct Args {
    /// Width of the height field in cells
    #[arg(short = 'W', long, default_value = "256")]
    width: usize,

    /// Height of the height field in cells
    #[arg(short = 'H', long, default_value = "256")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<i64>,

    /// Erosion model, used with default settings unless --config is given
    #[arg(long, value_enum)]
    model: Option<ModelKind>,

    /// JSON model config, e.g. {"model": "capacity", "particle_count": 20000}
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of droplets or particles
    #[arg(long)]
    cycles: Option<usize>,

    /// Output PNG of the eroded field
    #[arg(short, long, default_value = "eroded.png")]
    output: PathBuf,

    /// Also write a grayscale PNG of the eroded field
    #[arg(long)]
    gray: Option<PathBuf>,

    /// Directory for heatmap PNGs (heatmaps are only recorded when set)
    #[arg(long)]
    heatmaps: Option<PathBuf>,

    /// Write the eroded field as JSON
    #[arg(long)]
    raw: Option<PathBuf>,

    /// Erode a JSON field instead of generating one
    #[arg(long)]
    input: Option<PathBuf>,
}

fn select_model(args: &Args) -> anyhow::Result<ErosionModel> {
    let model = match (&args.config, args.model) {
        (Some(path), kind) => {
            let model = ErosionModel::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            let matches = match (kind, &model) {
                (None, _) => true,
                (Some(ModelKind::Droplet), ErosionModel::Droplet(_)) => true,
                (Some(ModelKind::Capacity), ErosionModel::Capacity(_)) => true,
                _ => false,
            };
            if !matches {
                bail!("--model disagrees with the {} model in {}", model, path.display());
            }
            model
        }
        (None, Some(ModelKind::Capacity)) => ErosionModel::Capacity(CapacityErosionSettings::default()),
        (None, _) => ErosionModel::Droplet(SimpleErosionSettings::default()),
    };

    Ok(match args.cycles {
        Some(cycles) => model.with_trajectories(cycles),
        None => model,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);
    let model = select_model(&args)?;

    let field: HeightField = match &args.input {
        Some(path) => export::load_json(path)
            .with_context(|| format!("failed to read field {}", path.display()))?,
        None => {
            println!("Generating seed field {}x{} with seed: {}", args.width, args.height, seed);
            generate_seed_field(args.width, args.height, &NoiseParams::default(), seed as u64)
        }
    };

    println!(
        "Running {} erosion with {} trajectories on {}x{}...",
        model,
        model.trajectories(),
        field.width,
        field.height
    );

    let mut heat = args.heatmaps.as_ref().map(|_| HeatMaps::new(field.width, field.height));
    let start = std::time::Instant::now();
    let (eroded, stats) = model.run(field, seed, heat.as_mut())?;

    println!("Erosion complete in {:.2?}:", start.elapsed());
    println!("  Trajectories: {}", stats.trajectories);
    println!("  Mean steps: {:.1}", stats.mean_steps());
    println!("  Total eroded: {:.3} units", stats.total_eroded);
    println!("  Total deposited: {:.3} units", stats.total_deposited);
    if stats.ceiling_hits > 0 {
        println!("  Step cap reached: {} droplets", stats.ceiling_hits);
    }

    export::export_heightmap(&eroded, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("Saved heightmap: {}", args.output.display());

    if let Some(path) = &args.gray {
        export::export_heightmap_gray(&eroded, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved grayscale heightmap: {}", path.display());
    }

    if let Some(path) = &args.raw {
        export::export_json(&eroded, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved raw field: {}", path.display());
    }

    if let (Some(dir), Some(heat)) = (&args.heatmaps, &heat) {
        let written = export::export_heat_maps(heat, dir, &model.to_string())
            .with_context(|| format!("failed to write heatmaps to {}", dir.display()))?;
        for path in written {
            println!("Saved heatmap: {}", path.display());
        }
    }

    Ok(())
}
