//! Height map composition and the full terrain pipeline.
//!
//! Three noise fields drive elevation: continentalness picks the base height
//! through its spline, mountainousness adds relief scaled by how far inland a
//! cell is, and peaks/valleys (ridged) carve valleys and dampen mountains.
//! The generator also owns the biome classifier and the vegetation output.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::biomes::{Biome, BiomeClassifier, LevelRange};
use crate::error::{Result, TerrainError};
use crate::noise_field::{NegativePolicy, NoiseConfig, NoiseField};
use crate::spline::Spline;
use crate::tilemap::{BiomeMap, HeightMap};
use crate::vegetation::{self, Vegetation, VegetationPoint};

// =============================================================================
// ELEVATION CONSTANTS
// =============================================================================

/// Continentalness band (inclusive) where mountains are suppressed entirely.
const COAST_BAND: (f32, f32) = (-0.2, 0.0);
/// Offshore mountains are scaled by `-(c + 0.2) / OFFSHORE_DIVISOR`.
const OFFSHORE_DIVISOR: f32 = 25.0;
/// Depth carved by a full peaks/valleys value.
const VALLEY_DEPTH: f32 = 20.0;

pub const DEFAULT_SEA_LEVEL: f32 = 64.0;

/// The three remapping curves, in the order they are supplied.
#[derive(Clone, Debug, Default)]
struct Splines {
    continentalness: Spline,
    mountainousness: Spline,
    peaks_valleys: Spline,
}

impl Splines {
    fn is_set(&self) -> bool {
        self.continentalness.is_set() && self.mountainousness.is_set() && self.peaks_valleys.is_set()
    }
}

/// Elevation of one cell from the raw noise values.
fn compose_height(splines: &Splines, continentalness: f32, mountainous_noise: f32, pv_noise: f32) -> f32 {
    let mut mountainous = splines.mountainousness.evaluate(mountainous_noise as f64) as f32;
    let pv = splines.peaks_valleys.evaluate(pv_noise as f64) as f32;

    if continentalness >= COAST_BAND.0 && continentalness <= COAST_BAND.1 {
        mountainous *= 0.0;
    } else if continentalness > COAST_BAND.1 {
        mountainous *= continentalness;
    } else {
        mountainous *= -(continentalness - COAST_BAND.0) / OFFSHORE_DIVISOR;
    }

    mountainous -= mountainous * pv;

    splines.continentalness.evaluate(continentalness as f64) as f32 + mountainous - pv * VALLEY_DEPTH
}

fn terrain_noise(ridge: bool) -> NoiseField {
    NoiseField::with_config(NoiseConfig {
        policy: NegativePolicy::Nothing,
        ridge,
        ..NoiseConfig::default()
    })
}

// =============================================================================
// TERRAIN GENERATOR
// =============================================================================

pub struct TerrainGenerator {
    /// Map size in chunks.
    width: usize,
    height: usize,
    chunk_resolution: usize,
    seed: i32,
    sea_level: f32,

    continentalness: NoiseField,
    mountainousness: NoiseField,
    peaks_valleys: NoiseField,
    splines: Splines,

    height_map: Option<HeightMap>,
    biome_map: Option<BiomeMap>,
    biome_map_per_chunk: Option<BiomeMap>,
    classifier: BiomeClassifier,
    vegetation: Vegetation,
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainGenerator {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            chunk_resolution: 0,
            seed: 0,
            sea_level: DEFAULT_SEA_LEVEL,
            continentalness: terrain_noise(false),
            mountainousness: terrain_noise(false),
            peaks_valleys: terrain_noise(true),
            splines: Splines::default(),
            height_map: None,
            biome_map: None,
            biome_map_per_chunk: None,
            classifier: BiomeClassifier::new(),
            vegetation: Vegetation::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Map size in chunks.
    pub fn set_size(&mut self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(TerrainError::input(format!(
                "map size must be positive, got {}x{}",
                width, height
            )));
        }
        self.width = width;
        self.height = height;
        for field in self.noise_fields_mut() {
            field.set_map_size(width, height);
        }
        Ok(())
    }

    /// Cells per chunk side.
    pub fn set_chunk_resolution(&mut self, resolution: usize) -> Result<()> {
        if resolution == 0 {
            return Err(TerrainError::input("chunk resolution must be positive"));
        }
        self.chunk_resolution = resolution;
        for field in self.noise_fields_mut() {
            field.set_chunk_size(resolution, resolution);
        }
        Ok(())
    }

    pub fn set_seed(&mut self, seed: i32) {
        self.seed = seed;
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn set_sea_level(&mut self, sea_level: f32) -> Result<()> {
        if sea_level < 0.0 {
            return Err(TerrainError::input(format!("sea level must not be negative, got {}", sea_level)));
        }
        self.sea_level = sea_level;
        Ok(())
    }

    pub fn sea_level(&self) -> f32 {
        self.sea_level
    }

    fn noise_fields_mut(&mut self) -> [&mut NoiseField; 3] {
        [&mut self.continentalness, &mut self.mountainousness, &mut self.peaks_valleys]
    }

    pub fn set_continentalness_config(&mut self, config: NoiseConfig) {
        self.continentalness.configure(config);
    }

    pub fn set_mountainousness_config(&mut self, config: NoiseConfig) {
        self.mountainousness.configure(config);
    }

    pub fn set_peaks_valleys_config(&mut self, config: NoiseConfig) {
        self.peaks_valleys.configure(config);
    }

    pub fn continentalness_config_mut(&mut self) -> &mut NoiseConfig {
        self.continentalness.config_mut()
    }

    pub fn mountainousness_config_mut(&mut self) -> &mut NoiseConfig {
        self.mountainousness.config_mut()
    }

    pub fn peaks_valleys_config_mut(&mut self) -> &mut NoiseConfig {
        self.peaks_valleys.config_mut()
    }

    pub fn temperature_config_mut(&mut self) -> &mut NoiseConfig {
        self.classifier.temperature_config_mut()
    }

    pub fn humidity_config_mut(&mut self) -> &mut NoiseConfig {
        self.classifier.humidity_config_mut()
    }

    /// Control points as `[cont_x, cont_y, mount_x, mount_y, pv_x, pv_y]`.
    /// Extra arrays are ignored.
    pub fn set_splines(&mut self, splines: Vec<Vec<f64>>) -> Result<()> {
        if splines.len() < 6 {
            return Err(TerrainError::input(format!(
                "expected 6 spline arrays, got {}",
                splines.len()
            )));
        }
        let mut arrays = splines.into_iter();
        let mut next = || arrays.next().unwrap_or_default();
        let continentalness = Spline::new(next(), next())?;
        let mountainousness = Spline::new(next(), next())?;
        let peaks_valleys = Spline::new(next(), next())?;
        self.splines = Splines {
            continentalness,
            mountainousness,
            peaks_valleys,
        };
        Ok(())
    }

    pub fn set_biomes(&mut self, biomes: Vec<Biome>) -> Result<()> {
        self.classifier.set_biomes(biomes)
    }

    pub fn set_ranges(&mut self, ranges: Vec<Vec<LevelRange>>) -> Result<()> {
        self.classifier.set_ranges(ranges)
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    fn check_dimensions(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.chunk_resolution == 0 {
            return Err(TerrainError::input(format!(
                "map dimensions must be positive ({}x{} chunks of {})",
                self.width, self.height, self.chunk_resolution
            )));
        }
        Ok(())
    }

    /// Allocate a zeroed height map for the current size.
    pub fn initialize_map(&mut self) -> Result<()> {
        self.check_dimensions()?;
        self.height_map = Some(HeightMap::new(self.map_width(), self.map_height()));
        Ok(())
    }

    pub fn generate_height_map(&mut self) -> Result<()> {
        self.check_dimensions()?;
        let (grid_w, grid_h) = (self.map_width(), self.map_height());
        match &self.height_map {
            Some(map) if map.width == grid_w && map.height == grid_h => {}
            Some(_) => {
                return Err(TerrainError::state(
                    "height map size is stale; call initialize_map() after resizing",
                ))
            }
            None => return Err(TerrainError::state("generate_height_map called before initialize_map")),
        }
        if !self.splines.is_set() {
            return Err(TerrainError::state("splines not set"));
        }

        info!(width = grid_w, height = grid_h, seed = self.seed, "Generating height map");

        let seeds = [self.seed, self.seed / 2, self.seed / 3];
        for (field, seed) in self.noise_fields_mut().into_iter().zip(seeds) {
            field.set_seed(seed);
            field.initialize();
            field.generate_by_chunks()?;
        }

        let c_map = self.continentalness.map().ok_or_else(|| TerrainError::state("continentalness not generated"))?;
        let m_map = self.mountainousness.map().ok_or_else(|| TerrainError::state("mountainousness not generated"))?;
        let pv_map = self.peaks_valleys.map().ok_or_else(|| TerrainError::state("peaks/valleys not generated"))?;
        let splines = &self.splines;

        let Some(height_map) = self.height_map.as_mut() else {
            return Err(TerrainError::state("height map missing"));
        };
        height_map
            .as_mut_slice()
            .par_chunks_mut(grid_w)
            .zip(c_map.as_slice().par_chunks(grid_w))
            .zip(m_map.as_slice().par_chunks(grid_w))
            .zip(pv_map.as_slice().par_chunks(grid_w))
            .for_each(|(((row, c_row), m_row), pv_row)| {
                for (i, cell) in row.iter_mut().enumerate() {
                    *cell = compose_height(splines, c_row[i], m_row[i], pv_row[i]);
                }
            });

        if let Some((min_h, max_h)) = height_map.min_max() {
            debug!(min = min_h, max = max_h, "Height map evaluated");
        }
        Ok(())
    }

    pub fn generate_biomes(&mut self) -> Result<()> {
        self.check_dimensions()?;
        let height_map = self
            .height_map
            .as_ref()
            .ok_or_else(|| TerrainError::state("generate_biomes called before the height map"))?;
        let biome_map = self.classifier.classify_map(
            height_map,
            self.width,
            self.height,
            self.chunk_resolution,
            self.seed,
            &self.continentalness,
            &self.mountainousness,
        )?;
        self.biome_map = Some(biome_map);
        Ok(())
    }

    /// Reduce the biome map to one id per chunk: the integer mean of its
    /// cells' ids, truncated.
    pub fn generate_biome_map_per_chunk(&mut self) -> Result<()> {
        let biome_map = self
            .biome_map
            .as_ref()
            .ok_or_else(|| TerrainError::state("biome map not generated"))?;
        let res = self.chunk_resolution;
        if biome_map.width != self.width * res || biome_map.height != self.height * res {
            return Err(TerrainError::state("biome map size does not match the map size"));
        }

        let mut per_chunk = BiomeMap::new(self.width, self.height);
        for (cx, cy, cell) in per_chunk.iter_mut() {
            let mut sum: i64 = 0;
            for j in 0..res {
                for i in 0..res {
                    sum += *biome_map.get(cx * res + i, cy * res + j) as i64;
                }
            }
            *cell = (sum / (res * res) as i64) as i32;
        }
        self.biome_map_per_chunk = Some(per_chunk);
        Ok(())
    }

    /// Place vegetation for every chunk. Replaces any previous placement.
    pub fn generate_vegetation(&mut self) -> Result<()> {
        let (Some(per_chunk), Some(height_map)) = (&self.biome_map_per_chunk, &self.height_map) else {
            return Err(TerrainError::state("vegetation needs the height map and the per-chunk biome map"));
        };
        self.vegetation = vegetation::place_vegetation(
            self.seed as u64,
            per_chunk,
            height_map,
            self.chunk_resolution,
            self.sea_level,
            &self.classifier,
        )?;
        Ok(())
    }

    /// Height map, biomes, per-chunk biomes and vegetation, in that order.
    /// Stops at the first failing stage.
    pub fn perform_terrain_generation(&mut self) -> Result<()> {
        if self.height_map.is_none() {
            self.initialize_map()?;
        }
        self.generate_height_map()?;
        self.generate_biomes()?;
        self.generate_biome_map_per_chunk()?;
        self.generate_vegetation()?;
        info!(trees = self.vegetation.tree_count, "Terrain generation complete");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Width in chunks.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in chunks.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn chunk_resolution(&self) -> usize {
        self.chunk_resolution
    }

    /// Width in cells.
    pub fn map_width(&self) -> usize {
        self.width * self.chunk_resolution
    }

    /// Height in cells.
    pub fn map_height(&self) -> usize {
        self.height * self.chunk_resolution
    }

    pub fn height_map(&self) -> Option<&HeightMap> {
        self.height_map.as_ref()
    }

    pub fn height_at(&self, x: usize, y: usize) -> Option<f32> {
        self.height_map.as_ref()?.try_get(x, y).copied()
    }

    pub fn biome_map(&self) -> Option<&BiomeMap> {
        self.biome_map.as_ref()
    }

    pub fn biome_at(&self, x: usize, y: usize) -> Option<i32> {
        self.biome_map.as_ref()?.try_get(x, y).copied()
    }

    pub fn biome_map_per_chunk(&self) -> Option<&BiomeMap> {
        self.biome_map_per_chunk.as_ref()
    }

    pub fn biome_at_chunk(&self, cx: usize, cy: usize) -> Option<i32> {
        self.biome_map_per_chunk.as_ref()?.try_get(cx, cy).copied()
    }

    pub fn biome(&self, id: i32) -> Option<&Biome> {
        self.classifier.biome(id)
    }

    pub fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    /// Plant positions per chunk, row-major by chunk.
    pub fn vegetation_points(&self) -> &[Vec<VegetationPoint>] {
        &self.vegetation.chunks
    }

    pub fn tree_count(&self) -> usize {
        self.vegetation.tree_count
    }

    pub fn continentalness_noise(&self) -> &NoiseField {
        &self.continentalness
    }

    pub fn mountainousness_noise(&self) -> &NoiseField {
        &self.mountainousness
    }

    pub fn peaks_valleys_noise(&self) -> &NoiseField {
        &self.peaks_valleys
    }
}
