//! Hydraulic erosion simulation using particle-based water droplets.
//!
//! Droplets spawn uniformly over the map and advance in lock step: every
//! round, each live droplet (in spawn order) follows the bilinear gradient one
//! cell, then either fills the gap behind it (uphill), drops surplus sediment,
//! or erodes a disc around its previous position (downhill). Droplets that
//! leave the map are removed; the rest expire after `droplet_lifetime` rounds.
//!
//! The engine erodes its own copy of the height map. Stepping is sequential so
//! overlapping erosion discs are applied in a fixed order, which keeps a seeded
//! run reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace};

use crate::erosion::droplet::{CapacityOutcome, Droplet};
use crate::erosion::params::ErosionConfig;
use crate::erosion::utils::{self, Vec2};
use crate::erosion::{ErosionStats, TrackPoint};
use crate::error::{Result, TerrainError};
use crate::tilemap::HeightMap;

pub struct ErosionEngine {
    width: usize,
    height: usize,
    config: ErosionConfig,
    droplet_count: usize,
    map: Option<HeightMap>,
    rng: ChaCha8Rng,
}

impl Default for ErosionEngine {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            config: ErosionConfig::default(),
            droplet_count: 0,
            map: None,
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl ErosionEngine {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let mut engine = Self::default();
        engine.configure(width, height)?;
        Ok(engine)
    }

    /// Set the map dimensions. Drops any map set for the previous size.
    pub fn configure(&mut self, width: usize, height: usize) -> Result<()> {
        if width < 2 || height < 2 {
            return Err(TerrainError::input(format!(
                "erosion needs a map of at least 2x2 cells, got {}x{}",
                width, height
            )));
        }
        if (width, height) != (self.width, self.height) {
            self.map = None;
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn set_config(&mut self, config: ErosionConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ErosionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ErosionConfig {
        &mut self.config
    }

    pub fn set_droplet_count(&mut self, count: usize) {
        self.droplet_count = count;
    }

    pub fn droplet_count(&self) -> usize {
        self.droplet_count
    }

    /// Reseed the droplet RNG. Spawn positions and random turns on flat
    /// ground are reproducible afterwards.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Copy `map` in as the terrain to erode. Later changes to `map` do not
    /// affect the engine.
    pub fn set_map(&mut self, map: &HeightMap) -> Result<()> {
        if self.width < 2 || self.height < 2 {
            return Err(TerrainError::state("erosion engine not configured"));
        }
        if map.width != self.width || map.height != self.height {
            return Err(TerrainError::input(format!(
                "height map is {}x{}, erosion engine is configured for {}x{}",
                map.width, map.height, self.width, self.height
            )));
        }
        self.map = Some(map.clone());
        Ok(())
    }

    pub fn map(&self) -> Option<&HeightMap> {
        self.map.as_ref()
    }

    pub fn into_map(self) -> Option<HeightMap> {
        self.map
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_on_map(&self, pos: Vec2) -> bool {
        utils::is_on_map(self.width, self.height, pos)
    }

    fn loaded_map(&self) -> Result<&HeightMap> {
        self.map.as_ref().ok_or_else(|| TerrainError::state("no height map set"))
    }

    fn loaded_map_mut(&mut self) -> Result<&mut HeightMap> {
        self.map.as_mut().ok_or_else(|| TerrainError::state("no height map set"))
    }

    fn check_on_map(&self, pos: Vec2) -> Result<()> {
        if self.is_on_map(pos) {
            Ok(())
        } else {
            Err(TerrainError::input(format!("position ({}, {}) is off the map", pos.x, pos.y)))
        }
    }

    pub fn gradient(&self, pos: Vec2) -> Result<Vec2> {
        self.check_on_map(pos)?;
        Ok(utils::gradient(self.loaded_map()?, pos))
    }

    pub fn interpolated_height(&self, pos: Vec2) -> Result<f32> {
        self.check_on_map(pos)?;
        Ok(utils::interpolated_height(self.loaded_map()?, pos))
    }

    pub fn elevation_difference(&self, old: Vec2, new: Vec2) -> Result<f32> {
        self.check_on_map(old)?;
        self.check_on_map(new)?;
        Ok(utils::elevation_difference(self.loaded_map()?, old, new))
    }

    pub fn distribute_sediment(&mut self, pos: Vec2, amount: f32) -> Result<()> {
        self.check_on_map(pos)?;
        utils::distribute_sediment(self.loaded_map_mut()?, pos, amount);
        Ok(())
    }

    pub fn erode_radius(&mut self, old: Vec2, new: Vec2, amount: f32) -> Result<f32> {
        self.check_on_map(old)?;
        self.check_on_map(new)?;
        let (radius, blur) = (self.config.erosion_radius, self.config.blur);
        Ok(utils::erode_radius(self.loaded_map_mut()?, old, new, amount, radius, blur))
    }

    /// Run one erosion pass over the stored map.
    ///
    /// With `track`, the normalized position and height of every spawn and
    /// every on-map step is appended as `[x / width, height, y / height]`.
    pub fn erode(&mut self, mut track: Option<&mut Vec<TrackPoint>>) -> Result<ErosionStats> {
        let (width, height) = (self.width, self.height);
        let config = self.config;
        let map = self
            .map
            .as_mut()
            .ok_or_else(|| TerrainError::state("erode called before set_map"))?;
        let rng = &mut self.rng;

        info!(droplets = self.droplet_count, width, height, "Running hydraulic erosion");

        let mut stats = ErosionStats::default();
        let mut droplets: Vec<Droplet> = (0..self.droplet_count)
            .map(|_| {
                let pos = Vec2::new(
                    rng.gen_range(0.0..(width - 1) as f32),
                    rng.gen_range(0.0..(height - 1) as f32),
                );
                Droplet::new(pos, config.initial_velocity, config.initial_water, config.initial_capacity)
            })
            .collect();
        stats.spawned = droplets.len();

        if let Some(track) = track.as_deref_mut() {
            track.reserve(droplets.len());
            for d in &droplets {
                track.push(track_point(map, width, height, d.position()));
            }
        }

        for round in 0..config.droplet_lifetime {
            if droplets.is_empty() {
                break;
            }
            droplets.retain_mut(|droplet| {
                let on_map = step(map, droplet, &config, width, height, rng, &mut stats);
                if on_map {
                    if let Some(track) = track.as_deref_mut() {
                        track.push(track_point(map, width, height, droplet.position()));
                    }
                } else {
                    stats.fell_off += 1;
                }
                on_map
            });
            trace!(round, alive = droplets.len(), "erosion round");
        }
        stats.expired = droplets.len();

        debug!(
            spawned = stats.spawned,
            fell_off = stats.fell_off,
            expired = stats.expired,
            eroded = stats.total_eroded,
            deposited = stats.total_deposited,
            "Erosion finished"
        );
        Ok(stats)
    }
}

fn track_point(map: &HeightMap, width: usize, height: usize, pos: Vec2) -> TrackPoint {
    [
        pos.x / width as f32,
        utils::interpolated_height(map, pos),
        pos.y / height as f32,
    ]
}

/// Advance one droplet by one cell. Returns false when it left the map.
fn step(
    map: &mut HeightMap,
    droplet: &mut Droplet,
    config: &ErosionConfig,
    width: usize,
    height: usize,
    rng: &mut ChaCha8Rng,
    stats: &mut ErosionStats,
) -> bool {
    let old = droplet.position();
    let gradient = utils::gradient(map, old);
    droplet.adjust_direction(gradient, config.inertia, rng);

    let new = droplet.position();
    if !utils::is_on_map(width, height, new) {
        return false;
    }

    let delta = utils::elevation_difference(map, old, new);
    if delta >= 0.0 {
        let dropped = droplet.drop_sediment(delta);
        utils::distribute_sediment(map, old, dropped);
        stats.total_deposited += dropped as f64;
    } else {
        match droplet.adjust_capacity(config.min_slope, config.erosion_rate, config.deposition_rate, delta) {
            CapacityOutcome::Deposit(amount) => {
                utils::distribute_sediment(map, old, amount);
                stats.total_deposited += amount as f64;
            }
            CapacityOutcome::Gather(amount) => {
                let eroded = utils::erode_radius(map, old, new, amount, config.erosion_radius, config.blur);
                droplet.add_sediment(eroded);
                stats.total_eroded += eroded as f64;
            }
        }
    }

    droplet.adjust_velocity(delta, config.gravity);
    droplet.evaporate(config.evaporation_rate);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slope_map(width: usize, height: usize) -> HeightMap {
        let mut map = HeightMap::new(width, height);
        for (x, y, h) in map.iter_mut() {
            let dx = x as f32 - width as f32 / 2.0;
            let dy = y as f32 - height as f32 / 2.0;
            *h = 10.0 + 0.05 * (dx * dx + dy * dy).sqrt() + 0.3 * ((x * 7 + y * 13) % 5) as f32;
        }
        map
    }

    fn engine(map: &HeightMap, droplets: usize, seed: u64) -> ErosionEngine {
        let mut engine = ErosionEngine::new(map.width, map.height).unwrap();
        engine.set_droplet_count(droplets);
        engine.set_seed(seed);
        engine.set_map(map).unwrap();
        engine
    }

    #[test]
    fn test_configure_rejects_tiny_maps() {
        assert!(matches!(ErosionEngine::new(1, 5), Err(TerrainError::InvalidInput(_))));
        assert!(matches!(ErosionEngine::new(5, 0), Err(TerrainError::InvalidInput(_))));
        assert!(ErosionEngine::new(2, 2).is_ok());
    }

    #[test]
    fn test_map_starts_unset() {
        let engine = ErosionEngine::new(3, 3).unwrap();
        assert!(engine.map().is_none());
    }

    #[test]
    fn test_set_map_copies() {
        let mut source = HeightMap::new_with(3, 3, 1.0);
        let mut engine = ErosionEngine::new(3, 3).unwrap();
        engine.set_map(&source).unwrap();
        source.fill(5.0);
        assert!(engine.map().unwrap().as_slice().iter().all(|&h| h == 1.0));
    }

    #[test]
    fn test_set_map_rejects_size_mismatch() {
        let mut engine = ErosionEngine::new(3, 3).unwrap();
        let map = HeightMap::new(4, 3);
        assert!(matches!(engine.set_map(&map), Err(TerrainError::InvalidInput(_))));
    }

    #[test]
    fn test_erode_before_set_map_fails() {
        let mut engine = ErosionEngine::new(3, 3).unwrap();
        engine.set_droplet_count(10);
        assert!(matches!(engine.erode(None), Err(TerrainError::InvalidState(_))));
    }

    #[test]
    fn test_position_stays_on_map() {
        let map = HeightMap::from_vec(3, 3, vec![0.2, 0.3, 0.4, 0.3, 0.5, 0.4, 0.4, 0.5, 0.6]).unwrap();
        let engine = engine(&map, 0, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut d = Droplet::new(Vec2::new(0.9, 0.9), 1.0, 1.0, 1.0);
        let g = engine.gradient(d.position()).unwrap();
        d.adjust_direction(g, 0.1, &mut rng);
        assert!(engine.is_on_map(d.position()));
    }

    #[test]
    fn test_droplet_displacement() {
        let map = HeightMap::from_vec(
            4,
            4,
            vec![
                0.2, 0.3, 0.4, 0.5, //
                0.3, 0.5, 0.4, 0.6, //
                0.4, 0.5, 0.6, 0.7, //
                0.5, 0.6, 0.7, 0.8,
            ],
        )
        .unwrap();
        let engine = engine(&map, 0, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut d = Droplet::new(Vec2::new(1.6, 1.2), 1.0, 1.0, 1.0);
        d.add_sediment(0.5);

        let g = engine.gradient(d.position()).unwrap();
        let old = d.position();
        d.adjust_direction(g, 0.1, &mut rng);
        let delta = engine.elevation_difference(old, d.position()).unwrap();
        let gather = d.sediment_to_gather(0.1, delta);

        assert!((gather - 0.05).abs() < 0.005);
        assert!((d.position().x - 1.15).abs() < 0.05);
        assert!((d.position().y - 0.3).abs() < 0.05);
    }

    #[test]
    fn test_helpers_reject_off_map_positions() {
        let map = HeightMap::new(4, 4);
        let engine = engine(&map, 0, 1);
        assert!(engine.gradient(Vec2::new(3.0, 3.0)).is_err());
        assert!(engine.interpolated_height(Vec2::new(-1.0, 0.0)).is_err());
    }

    #[test]
    fn test_erode_radius_through_engine_conserves() {
        let map = slope_map(12, 12);
        let mut engine = engine(&map, 0, 1);
        engine.config_mut().erosion_radius = 3;
        let before: f64 = engine.map().unwrap().as_slice().iter().map(|&h| h as f64).sum();
        let removed = engine.erode_radius(Vec2::new(9.5, 9.5), Vec2::new(6.0, 6.0), 0.5).unwrap();
        let after: f64 = engine.map().unwrap().as_slice().iter().map(|&h| h as f64).sum();
        assert!(removed > 0.0);
        assert!(((before - after) - removed as f64).abs() < 1e-3);
    }

    #[test]
    fn test_erode_changes_terrain_and_counts_droplets() {
        let map = slope_map(32, 32);
        let mut engine = engine(&map, 500, 42);
        let stats = engine.erode(None).unwrap();

        assert_eq!(stats.spawned, 500);
        assert_eq!(stats.fell_off + stats.expired, 500);
        assert!(stats.total_eroded > 0.0);
        assert_ne!(engine.map().unwrap(), &map);
    }

    #[test]
    fn test_seeded_erosion_is_reproducible() {
        let map = slope_map(24, 24);
        let mut a = engine(&map, 200, 9);
        let mut b = engine(&map, 200, 9);
        let sa = a.erode(None).unwrap();
        let sb = b.erode(None).unwrap();
        assert_eq!(sa, sb);
        assert_eq!(a.map(), b.map());
    }

    #[test]
    fn test_tracking_records_spawns_and_steps() {
        let map = slope_map(16, 16);
        let mut engine = engine(&map, 20, 3);
        engine.config_mut().droplet_lifetime = 5;
        let mut track = Vec::new();
        let stats = engine.erode(Some(&mut track)).unwrap();

        assert!(track.len() >= 20);
        assert!(track.len() <= 20 + 20 * 5);
        assert!(stats.spawned == 20);
        for p in &track {
            assert!((0.0..1.0).contains(&p[0]));
            assert!((0.0..1.0).contains(&p[2]));
        }
    }

    fn cone_map(size: usize) -> HeightMap {
        let center = (size - 1) as f32 / 2.0;
        let mut map = HeightMap::new(size, size);
        for (x, y, h) in map.iter_mut() {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            *h = 10.0 * (dx * dx + dy * dy).sqrt();
        }
        map
    }

    fn cells_apart(a: TrackPoint, b: TrackPoint, size: usize) -> f32 {
        let dx = (a[0] - b[0]) * size as f32;
        let dy = (a[2] - b[2]) * size as f32;
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_droplets_advance_in_lock_step() {
        const SIZE: usize = 33;
        const N: usize = 12;
        let map = cone_map(SIZE);
        let mut engine = engine(&map, N, 5);
        engine.config_mut().droplet_lifetime = 2;
        let mut track = Vec::new();
        let stats = engine.erode(Some(&mut track)).unwrap();

        // Every droplet runs downhill toward the center and stays on the map
        assert_eq!(stats.fell_off, 0);
        assert_eq!(stats.expired, N);
        assert_eq!(track.len(), 3 * N);

        // Round r holds one entry per droplet, in spawn order
        for i in 0..N {
            assert!((cells_apart(track[i], track[N + i], SIZE) - 1.0).abs() < 1e-3);
            assert!((cells_apart(track[N + i], track[2 * N + i], SIZE) - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_into_map_returns_eroded_copy() {
        let map = slope_map(16, 16);
        let mut engine = engine(&map, 50, 11);
        engine.erode(None).unwrap();
        let eroded = engine.map().cloned();
        assert_eq!(engine.into_map(), eroded);
        assert!(ErosionEngine::new(4, 4).unwrap().into_map().is_none());
    }

    #[test]
    fn test_zero_droplets_leaves_map_untouched() {
        let map = slope_map(8, 8);
        let mut engine = engine(&map, 0, 1);
        let stats = engine.erode(None).unwrap();
        assert_eq!(stats, ErosionStats::default());
        assert_eq!(engine.map().unwrap(), &map);
    }

    #[test]
    fn test_configure_new_size_drops_map() {
        let map = slope_map(8, 8);
        let mut engine = engine(&map, 10, 1);
        engine.configure(10, 10).unwrap();
        assert!(engine.map().is_none());
        assert!(engine.erode(None).is_err());
    }
}
