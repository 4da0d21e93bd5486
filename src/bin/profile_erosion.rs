//! Profiling tool to identify performance bottlenecks

use std::time::Instant;

use terrain_generator::erosion::ErosionStats;
use terrain_generator::GeneratorSettings;

fn main() -> terrain_generator::Result<()> {
    let settings = GeneratorSettings::default();
    let cells = settings.width * settings.chunk_resolution * settings.height * settings.chunk_resolution;

    println!("=== Performance Profiling ===");
    println!("Map size: {}x{} chunks of {} ({} cells)",
        settings.width, settings.height, settings.chunk_resolution, cells);
    println!();

    // Profile height map generation
    let start = Instant::now();
    let mut generator = settings.build_generator()?;
    generator.generate_height_map()?;
    let heightmap_time = start.elapsed();
    println!("Height map generation: {:?}", heightmap_time);

    // Profile biome classification
    let start = Instant::now();
    generator.generate_biomes()?;
    generator.generate_biome_map_per_chunk()?;
    let biome_time = start.elapsed();
    println!("Biome classification: {:?}", biome_time);

    // Profile vegetation
    let start = Instant::now();
    generator.generate_vegetation()?;
    let vegetation_time = start.elapsed();
    println!("Vegetation placement: {:?} ({} trees)", vegetation_time, generator.tree_count());

    // Profile erosion (the big one)
    println!("\nErosion parameters:");
    println!("  Droplets: {}", settings.droplets);
    println!("  Lifetime: {}", settings.erosion.droplet_lifetime);
    println!("  Radius: {}", settings.erosion.erosion_radius);
    println!();

    let start = Instant::now();
    let stats = match generator.height_map() {
        Some(map) => settings.build_erosion(map)?.erode(None)?,
        None => ErosionStats::default(),
    };
    let erosion_time = start.elapsed();
    println!("Total erosion simulation: {:?}", erosion_time);
    println!("  {}", stats);

    // Summary
    let total = heightmap_time + biome_time + vegetation_time + erosion_time;
    let share = |d: std::time::Duration| 100.0 * d.as_secs_f64() / total.as_secs_f64();
    println!("\n=== Summary ===");
    println!("Height map:       {:>8.2}% ({:?})", share(heightmap_time), heightmap_time);
    println!("Biomes:           {:>8.2}% ({:?})", share(biome_time), biome_time);
    println!("Vegetation:       {:>8.2}% ({:?})", share(vegetation_time), vegetation_time);
    println!("Erosion:          {:>8.2}% ({:?})", share(erosion_time), erosion_time);
    println!("─────────────────────────────────");
    println!("TOTAL:            {:>8}  {:?}", "100%", total);
    Ok(())
}
