//! Fractal simplex noise over a chunked 2D grid.
//!
//! Each cell is an fBm sum of simplex octaves, optionally ridged, then shaped
//! by contrast, redistribution, a negative-value policy and an island mask.
//! The grid is `width * chunk_width` by `height * chunk_height` cells stored
//! row-major in one flat array.

use noise::{NoiseFn, Simplex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TerrainError};
use crate::tilemap::Tilemap;

/// How negative noise values are treated after shaping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegativePolicy {
    /// Rescale the whole field linearly onto [-1, 1] once every cell is known.
    RefitAll,
    /// Clamp negative values to 0.
    FlattenNegatives,
    /// Pull negative values toward 0 by `revert_gain`.
    #[default]
    RevertNegatives,
    /// Leave values untouched.
    Nothing,
}

/// Radial falloff used by the island mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IslandType {
    #[default]
    Cone,
    Diagonal,
    EuclideanSquared,
    SquareBump,
    Hyperboloid,
    Squircle,
    Trig,
}

impl IslandType {
    pub fn all() -> &'static [Self] {
        &[
            Self::Cone,
            Self::Diagonal,
            Self::EuclideanSquared,
            Self::SquareBump,
            Self::Hyperboloid,
            Self::Squircle,
            Self::Trig,
        ]
    }

    /// Distance from the map centre for normalized coordinates in [-1, 1].
    /// 0 at the centre, about 1 at the edges.
    pub fn distance(&self, nx: f32, ny: f32) -> f32 {
        match self {
            Self::Cone => (nx * nx + ny * ny).sqrt(),
            Self::Diagonal => nx.abs().max(ny.abs()),
            Self::EuclideanSquared => ((nx * nx + ny * ny) / std::f32::consts::SQRT_2).min(1.0),
            Self::SquareBump => 1.0 - (1.0 - nx * nx) * (1.0 - ny * ny),
            Self::Hyperboloid => {
                const A: f32 = 0.2;
                (nx * nx + ny * ny + A * A).sqrt() - A
            }
            Self::Squircle => (nx.powi(4) + ny.powi(4)).sqrt(),
            Self::Trig => {
                let half_pi = std::f32::consts::FRAC_PI_2;
                1.0 - (nx * half_pi).cos() * (ny * half_pi).cos()
            }
        }
    }
}

impl std::fmt::Display for IslandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cone => write!(f, "cone"),
            Self::Diagonal => write!(f, "diagonal"),
            Self::EuclideanSquared => write!(f, "euclidean-squared"),
            Self::SquareBump => write!(f, "square-bump"),
            Self::Hyperboloid => write!(f, "hyperboloid"),
            Self::Squircle => write!(f, "squircle"),
            Self::Trig => write!(f, "trig"),
        }
    }
}

/// Parameters of one noise field. Copied by value into each field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub x_offset: f32,
    pub y_offset: f32,
    pub seed: i32,

    // Fractal sum
    pub scale: f32,
    pub octaves: u32,
    pub contrast: f32,
    pub redistribution: f32,
    pub lacunarity: f32,
    pub persistence: f32,
    pub policy: NegativePolicy,
    pub revert_gain: f32,

    // Ridge
    pub ridge: bool,
    pub ridge_gain: f32,
    pub ridge_offset: f32,

    // Island
    pub island: bool,
    pub mix_power: f32,
    pub island_type: IslandType,

    /// Mirror the field onto all four quadrants.
    pub symmetrical: bool,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            x_offset: 0.0,
            y_offset: 0.0,
            seed: 0,
            scale: 1.0,
            octaves: 8,
            contrast: 1.0,
            redistribution: 1.0,
            lacunarity: 2.0,
            persistence: 0.5,
            policy: NegativePolicy::RevertNegatives,
            revert_gain: 0.5,
            ridge: false,
            ridge_gain: 1.0,
            ridge_offset: 1.0,
            island: false,
            mix_power: 0.5,
            island_type: IslandType::Cone,
            symmetrical: false,
        }
    }
}

impl NoiseConfig {
    /// Cheap change detector for settings panels: the sum of all numeric
    /// parameters.
    pub fn checksum(&self) -> f32 {
        self.x_offset
            + self.y_offset
            + self.scale
            + self.octaves as f32
            + self.contrast
            + self.redistribution
            + self.lacunarity
            + self.persistence
            + self.ridge_gain
            + self.ridge_offset
            + self.revert_gain
            + self.mix_power
            + self.seed as f32
    }
}

/// Sharpen a noise value into a ridge: crests where `|h|` is small.
/// Output lies in [-1, 1] for `offset <= 1`.
fn ridge(h: f32, offset: f32, gain: f32) -> f32 {
    let r = (offset - h.abs()).max(0.0);
    2.0 * r.powf(gain) - 1.0
}

/// A grid of fractal noise values.
pub struct NoiseField {
    config: NoiseConfig,
    map: Option<Tilemap<f32>>,
    width: usize,
    height: usize,
    chunk_width: usize,
    chunk_height: usize,
}

impl Default for NoiseField {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseField {
    pub fn new() -> Self {
        Self {
            config: NoiseConfig::default(),
            map: None,
            width: 0,
            height: 0,
            chunk_width: 1,
            chunk_height: 1,
        }
    }

    pub fn with_config(config: NoiseConfig) -> Self {
        Self { config, ..Self::new() }
    }

    pub fn configure(&mut self, config: NoiseConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut NoiseConfig {
        &mut self.config
    }

    pub fn set_seed(&mut self, seed: i32) {
        self.config.seed = seed;
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    /// Map size in chunks.
    pub fn set_map_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// Cells per chunk along each axis.
    pub fn set_chunk_size(&mut self, chunk_width: usize, chunk_height: usize) {
        self.chunk_width = chunk_width;
        self.chunk_height = chunk_height;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn chunk_width(&self) -> usize {
        self.chunk_width
    }

    pub fn chunk_height(&self) -> usize {
        self.chunk_height
    }

    /// Grid width in cells.
    pub fn grid_width(&self) -> usize {
        self.width * self.chunk_width
    }

    /// Grid height in cells.
    pub fn grid_height(&self) -> usize {
        self.height * self.chunk_height
    }

    /// Allocate and zero-fill the backing grid.
    pub fn initialize(&mut self) {
        self.map = Some(Tilemap::new_with(self.grid_width(), self.grid_height(), 0.0f32));
    }

    pub fn is_initialized(&self) -> bool {
        self.map.is_some()
    }

    pub fn map(&self) -> Option<&Tilemap<f32>> {
        self.map.as_ref()
    }

    /// Value at a grid cell. Panics if the field is not initialized or the
    /// cell is out of bounds; check against `grid_width`/`grid_height`.
    pub fn value_at(&self, x: usize, y: usize) -> f32 {
        match &self.map {
            Some(map) => *map.get(x, y),
            None => panic!("noise field read before initialize()"),
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.map.as_ref().and_then(|m| m.try_get(x, y).copied())
    }

    /// Fill the grid row by row.
    pub fn generate(&mut self) -> Result<()> {
        let sampler = self.sampler()?;
        let grid_width = sampler.grid_width;
        let map = self.ready_map()?;

        map.as_mut_slice()
            .par_chunks_mut(grid_width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    *cell = sampler.sample(x, y);
                }
            });

        self.finish()
    }

    /// Fill the grid chunk by chunk. Produces the same values as `generate`.
    pub fn generate_by_chunks(&mut self) -> Result<()> {
        let sampler = self.sampler()?;
        let (chunks_x, chunk_w, chunk_h) = (self.width, self.chunk_width, self.chunk_height);
        let grid_width = sampler.grid_width;
        let map = self.ready_map()?;

        // One band of chunk rows per task.
        map.as_mut_slice()
            .par_chunks_mut(grid_width * chunk_h)
            .enumerate()
            .for_each(|(chunk_y, band)| {
                for chunk_x in 0..chunks_x {
                    for j in 0..chunk_h {
                        let y = chunk_y * chunk_h + j;
                        for i in 0..chunk_w {
                            let x = chunk_x * chunk_w + i;
                            band[j * grid_width + x] = sampler.sample(x, y);
                        }
                    }
                }
            });

        self.finish()
    }

    fn sampler(&self) -> Result<Sampler> {
        if self.grid_width() == 0 || self.grid_height() == 0 {
            return Err(TerrainError::state(format!(
                "noise field has zero size ({}x{} chunks of {}x{})",
                self.width, self.height, self.chunk_width, self.chunk_height
            )));
        }
        if self.config.octaves == 0 {
            return Err(TerrainError::state("noise field configured with zero octaves"));
        }
        Ok(Sampler::new(self.config, self.grid_width(), self.grid_height()))
    }

    fn ready_map(&mut self) -> Result<&mut Tilemap<f32>> {
        let (w, h) = (self.grid_width(), self.grid_height());
        match self.map.as_mut() {
            Some(map) if map.width == w && map.height == h => Ok(map),
            Some(_) => Err(TerrainError::state(
                "noise field was resized after initialize(); call initialize() again",
            )),
            None => Err(TerrainError::state("noise field generated before initialize()")),
        }
    }

    /// Whole-field passes: refit and island mask.
    fn finish(&mut self) -> Result<()> {
        let config = self.config;
        let map = self.ready_map()?;

        if config.policy == NegativePolicy::RefitAll {
            refit(map);
        }

        if config.island {
            let (w, h) = (map.width as f32, map.height as f32);
            for (x, y, value) in map.iter_mut() {
                let nx = 2.0 * x as f32 / w - 1.0;
                let ny = 2.0 * y as f32 / h - 1.0;
                let d = config.island_type.distance(nx, ny);
                *value += (1.0 - d - *value) * config.mix_power;
            }
        }

        if let Some((min_v, max_v)) = map.min_max() {
            debug!(
                seed = config.seed,
                cells = map.len(),
                min = min_v,
                max = max_v,
                "noise field generated"
            );
        }
        Ok(())
    }
}

/// Linearly rescale the map onto [-1, 1]. A constant map becomes 0.
fn refit(map: &mut Tilemap<f32>) {
    let Some((min_v, max_v)) = map.min_max() else {
        return;
    };
    let range = max_v - min_v;
    for v in map.as_mut_slice() {
        *v = if range > 0.0 { 2.0 * (*v - min_v) / range - 1.0 } else { 0.0 };
    }
}

/// Immutable per-generation state shared across worker threads.
struct Sampler {
    noise: Simplex,
    config: NoiseConfig,
    grid_width: usize,
    grid_height: usize,
}

impl Sampler {
    fn new(config: NoiseConfig, grid_width: usize, grid_height: usize) -> Self {
        Self {
            noise: Simplex::new(config.seed as u32),
            config,
            grid_width,
            grid_height,
        }
    }

    fn fbm(&self, x: f64, y: f64) -> f32 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            total += amplitude * self.noise.get([x * frequency, y * frequency]);
            max_value += amplitude;
            amplitude *= self.config.persistence as f64;
            frequency *= self.config.lacunarity as f64;
        }

        if max_value == 0.0 {
            0.0
        } else {
            (total / max_value) as f32
        }
    }

    /// Shaped value of one cell, before whole-field passes.
    fn sample(&self, x: usize, y: usize) -> f32 {
        let c = &self.config;
        let (x, y) = if c.symmetrical {
            (x.min(self.grid_width - 1 - x), y.min(self.grid_height - 1 - y))
        } else {
            (x, y)
        };

        let nx = (x as f64 + c.x_offset as f64) * c.scale as f64;
        let ny = (y as f64 + c.y_offset as f64) * c.scale as f64;
        let mut h = self.fbm(nx, ny);

        if c.ridge {
            h = ridge(h, c.ridge_offset, c.ridge_gain);
        }

        h = (h * c.contrast).clamp(-1.0, 1.0);
        h = h.signum() * h.abs().powf(c.redistribution);

        match c.policy {
            NegativePolicy::FlattenNegatives => h.max(0.0),
            NegativePolicy::RevertNegatives if h < 0.0 => h * (1.0 - c.revert_gain),
            _ => h,
        }
    }
}
