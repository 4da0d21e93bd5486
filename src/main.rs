use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use terrain_generator::{GeneratorSettings, Result};

#[derive(Parser, Debug)]
#[command(name = "terrain_generator")]
#[command(about = "Generate chunked terrain: heights, biomes, vegetation and hydraulic erosion")]
struct Args {
    /// JSON settings file (demo world if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Terrain seed
    #[arg(short, long)]
    seed: Option<i32>,

    /// Map width in chunks
    #[arg(short = 'W', long)]
    width: Option<usize>,

    /// Map height in chunks
    #[arg(short = 'H', long)]
    height: Option<usize>,

    /// Cells per chunk side
    #[arg(long)]
    chunk_res: Option<usize>,

    /// Number of erosion droplets
    #[arg(long)]
    droplets: Option<usize>,

    /// Run hydraulic erosion on a copy of the height map
    #[arg(long)]
    erode: bool,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn settings_from(args: &Args) -> Result<GeneratorSettings> {
    let mut settings = match &args.config {
        Some(path) => GeneratorSettings::load(path)?,
        None => GeneratorSettings::default(),
    };
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if let Some(width) = args.width {
        settings.width = width;
    }
    if let Some(height) = args.height {
        settings.height = height;
    }
    if let Some(res) = args.chunk_res {
        settings.chunk_resolution = res;
    }
    if let Some(droplets) = args.droplets {
        settings.droplets = droplets;
    }
    Ok(settings)
}

fn run(args: &Args) -> Result<()> {
    let settings = settings_from(args)?;

    if args.dump_config {
        println!("{}", settings.to_json_pretty()?);
        return Ok(());
    }

    info!(
        seed = settings.seed,
        width = settings.width,
        height = settings.height,
        chunk_res = settings.chunk_resolution,
        "Generating terrain"
    );

    let mut generator = settings.build_generator()?;
    generator.perform_terrain_generation()?;

    println!("Map: {}x{} chunks of {} cells ({}x{} cells)",
        generator.width(), generator.height(), generator.chunk_resolution(),
        generator.map_width(), generator.map_height());

    if let Some(height_map) = generator.height_map() {
        if let Some((min_h, max_h)) = height_map.min_max() {
            let above_sea = height_map.as_slice().iter().filter(|&&h| h >= generator.sea_level()).count();
            println!("Height range: {:.2} to {:.2} ({:.1}% above sea level {})", min_h, max_h,
                100.0 * above_sea as f64 / height_map.len() as f64, generator.sea_level());
        }
    }

    if let Some(per_chunk) = generator.biome_map_per_chunk() {
        let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
        for &id in per_chunk.as_slice() {
            *histogram.entry(id).or_default() += 1;
        }
        println!("Biomes per chunk:");
        for (id, count) in histogram {
            let name = generator.biome(id).map_or("unknown", |b| b.name.as_str());
            println!("  {:>3} {:<12} {:>6} chunks", id, name, count);
        }
    }

    println!("Trees: {}", generator.tree_count());

    if args.erode {
        let Some(height_map) = generator.height_map() else {
            return Ok(());
        };
        let mut engine = settings.build_erosion(height_map)?;
        let stats = engine.erode(None)?;
        println!("Erosion: {}", stats);
        if let Some((min_h, max_h)) = engine.map().and_then(|m| m.min_max()) {
            println!("Eroded height range: {:.2} to {:.2}", min_h, max_h);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
