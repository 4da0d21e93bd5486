//! Vegetation placement: Poisson disc points per chunk, filtered by sea level.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::biomes::BiomeClassifier;
use crate::error::{Result, TerrainError};
use crate::tilemap::{BiomeMap, HeightMap};

/// Candidates tried around each active point before it is retired.
pub const POISSON_CANDIDATES: usize = 30;

/// Integer map coordinates of one plant.
pub type VegetationPoint = (usize, usize);

/// Up to `count` points in the unit square, no two closer than
/// `sqrt(count) / count` (Bridson's algorithm).
pub fn poisson_points<R: Rng>(count: usize, rng: &mut R) -> Vec<(f32, f32)> {
    if count == 0 {
        return Vec::new();
    }
    let min_dist = (count as f32).sqrt() / count as f32;
    let cell = min_dist / std::f32::consts::SQRT_2;
    let grid_size = (1.0 / cell).ceil() as usize;
    let mut grid: Vec<Option<usize>> = vec![None; grid_size * grid_size];
    let grid_index = |p: (f32, f32)| {
        let gx = ((p.0 / cell) as usize).min(grid_size - 1);
        let gy = ((p.1 / cell) as usize).min(grid_size - 1);
        (gx, gy)
    };

    let mut points: Vec<(f32, f32)> = Vec::with_capacity(count);
    let mut active: Vec<usize> = Vec::new();

    let first = (rng.gen::<f32>(), rng.gen::<f32>());
    let (gx, gy) = grid_index(first);
    grid[gy * grid_size + gx] = Some(0);
    points.push(first);
    active.push(0);

    while !active.is_empty() && points.len() < count {
        let slot = rng.gen_range(0..active.len());
        let origin = points[active[slot]];
        let mut placed = false;

        for _ in 0..POISSON_CANDIDATES {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = rng.gen_range(min_dist..2.0 * min_dist);
            let candidate = (origin.0 + radius * angle.cos(), origin.1 + radius * angle.sin());
            if !(0.0..1.0).contains(&candidate.0) || !(0.0..1.0).contains(&candidate.1) {
                continue;
            }

            let (cx, cy) = grid_index(candidate);
            let too_close = (cy.saturating_sub(2)..=(cy + 2).min(grid_size - 1)).any(|y| {
                (cx.saturating_sub(2)..=(cx + 2).min(grid_size - 1)).any(|x| {
                    grid[y * grid_size + x].is_some_and(|i| {
                        let (px, py) = points[i];
                        let (dx, dy) = (px - candidate.0, py - candidate.1);
                        dx * dx + dy * dy < min_dist * min_dist
                    })
                })
            });
            if too_close {
                continue;
            }

            grid[cy * grid_size + cx] = Some(points.len());
            active.push(points.len());
            points.push(candidate);
            placed = true;
            break;
        }

        if !placed {
            active.swap_remove(slot);
        }
    }

    points
}

/// Per-chunk plant positions and their total.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vegetation {
    /// Row-major by chunk: `chunks[cy * width + cx]`.
    pub chunks: Vec<Vec<VegetationPoint>>,
    pub tree_count: usize,
}

/// Scatter vegetation over every chunk.
///
/// Each chunk asks its biome for `vegetation_level` points; unknown biome ids
/// get none. Points on cells below `sea_level` are dropped. The same `seed`
/// always produces the same layout.
pub fn place_vegetation(
    seed: u64,
    chunk_biomes: &BiomeMap,
    heights: &HeightMap,
    chunk_res: usize,
    sea_level: f32,
    classifier: &BiomeClassifier,
) -> Result<Vegetation> {
    let (width, height) = (chunk_biomes.width, chunk_biomes.height);
    if chunk_res == 0 {
        return Err(TerrainError::input("chunk resolution must be positive"));
    }
    if heights.width != width * chunk_res || heights.height != height * chunk_res {
        return Err(TerrainError::state(format!(
            "height map is {}x{}, expected {}x{} chunks of {}",
            heights.width, heights.height, width, height, chunk_res
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut vegetation = Vegetation {
        chunks: vec![Vec::new(); width * height],
        tree_count: 0,
    };

    for (cx, cy, &biome_id) in chunk_biomes.iter() {
        let count = classifier.biome(biome_id).map_or(0, |b| b.vegetation_level);
        let chunk = &mut vegetation.chunks[cy * width + cx];
        for (px, py) in poisson_points(count, &mut rng) {
            let x = ((px * chunk_res as f32) as usize).min(chunk_res - 1) + cx * chunk_res;
            let y = ((py * chunk_res as f32) as usize).min(chunk_res - 1) + cy * chunk_res;
            if *heights.get(x, y) < sea_level {
                continue;
            }
            chunk.push((x, y));
        }
        vegetation.tree_count += chunk.len();
    }

    debug!(trees = vegetation.tree_count, chunks = width * height, "Vegetation placed");
    Ok(vegetation)
}
