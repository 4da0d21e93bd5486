//! Generator settings loaded from JSON.
//!
//! `GeneratorSettings::default()` is the demo world: 20x20 chunks of 20 cells,
//! seed 742, six biomes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::biomes::{default_climate_config, Biome, LevelRange};
use crate::erosion::{ErosionConfig, ErosionEngine};
use crate::error::{Result, TerrainError};
use crate::noise_field::{NegativePolicy, NoiseConfig};
use crate::terrain::{TerrainGenerator, DEFAULT_SEA_LEVEL};
use crate::tilemap::HeightMap;

/// Noise scale shared by the three terrain fields in the demo world.
const DEMO_SCALE: f32 = 0.05;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Map width in chunks.
    pub width: usize,
    /// Map height in chunks.
    pub height: usize,
    pub chunk_resolution: usize,
    pub seed: i32,
    pub sea_level: f32,

    pub continentalness: NoiseConfig,
    pub mountainousness: NoiseConfig,
    pub peaks_valleys: NoiseConfig,
    pub temperature: NoiseConfig,
    pub humidity: NoiseConfig,

    /// `[cont_x, cont_y, mount_x, mount_y, pv_x, pv_y]`
    pub splines: Vec<Vec<f64>>,
    /// Level tables: temperature, humidity, continentalness, mountainousness.
    pub ranges: Vec<Vec<LevelRange>>,
    pub biomes: Vec<Biome>,

    pub erosion: ErosionConfig,
    pub droplets: usize,
    pub erosion_seed: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        let terrain_noise = NoiseConfig {
            scale: DEMO_SCALE,
            contrast: 1.5,
            policy: NegativePolicy::Nothing,
            ..NoiseConfig::default()
        };
        let climate_levels = vec![
            LevelRange::new(-1.0, -0.5, 0),
            LevelRange::new(-0.5, 0.0, 1),
            LevelRange::new(0.0, 0.5, 2),
            LevelRange::new(0.5, 1.1, 3),
        ];

        Self {
            width: 20,
            height: 20,
            chunk_resolution: 20,
            seed: 742,
            sea_level: DEFAULT_SEA_LEVEL,

            continentalness: NoiseConfig { octaves: 7, ..terrain_noise },
            mountainousness: terrain_noise,
            peaks_valleys: NoiseConfig {
                ridge: true,
                ridge_gain: 3.0,
                ..terrain_noise
            },
            temperature: default_climate_config(),
            humidity: default_climate_config(),

            splines: vec![
                vec![-1.0, -0.7, -0.2, 0.03, 0.3, 1.0],
                vec![0.0, 40.0, 64.0, 66.0, 68.0, 70.0],
                vec![-1.0, -0.78, -0.37, -0.2, 0.05, 0.45, 0.55, 1.0],
                vec![0.0, 5.0, 10.0, 20.0, 30.0, 80.0, 100.0, 170.0],
                vec![-1.0, -0.85, -0.6, 0.2, 0.7, 1.0],
                vec![1.0, 0.7, 0.4, 0.2, 0.05, 0.0],
            ],
            ranges: vec![
                climate_levels.clone(),
                climate_levels,
                vec![
                    LevelRange::new(-1.0, -0.7, 0),
                    LevelRange::new(-0.7, -0.2, 1),
                    LevelRange::new(-0.2, 0.03, 2),
                    LevelRange::new(0.03, 0.3, 3),
                    LevelRange::new(0.3, 1.1, 4),
                ],
                vec![
                    LevelRange::new(-1.0, -0.78, 0),
                    LevelRange::new(-0.78, -0.37, 1),
                    LevelRange::new(-0.37, -0.2, 2),
                    LevelRange::new(-0.2, 0.05, 3),
                    LevelRange::new(0.05, 0.45, 4),
                    LevelRange::new(0.45, 0.55, 5),
                    LevelRange::new(0.55, 1.1, 6),
                ],
            ],
            biomes: demo_biomes(),

            erosion: ErosionConfig::default(),
            droplets: 70_000,
            erosion_seed: 742,
        }
    }
}

/// Vegetation levels are points per 20x20 chunk.
fn demo_biomes() -> Vec<Biome> {
    vec![
        Biome::new(0, "Grassplains")
            .with_temperature(1, 2)
            .with_humidity(1, 4)
            .with_continentalness(3, 5)
            .with_mountainousness(0, 3)
            .with_texture_offset(3)
            .with_vegetation(80),
        Biome::new(1, "Desert")
            .with_temperature(2, 4)
            .with_humidity(0, 1)
            .with_continentalness(3, 5)
            .with_mountainousness(0, 4)
            .with_texture_offset(2)
            .with_vegetation(4),
        Biome::new(2, "Snow")
            .with_temperature(0, 1)
            .with_humidity(0, 4)
            .with_continentalness(3, 5)
            .with_mountainousness(0, 4)
            .with_texture_offset(7)
            .with_vegetation(12),
        Biome::new(3, "Sand")
            .with_temperature(0, 4)
            .with_humidity(0, 4)
            .with_continentalness(2, 3)
            .with_mountainousness(0, 7)
            .with_texture_offset(8)
            .with_vegetation(4),
        Biome::new(4, "Mountain")
            .with_temperature(0, 4)
            .with_humidity(0, 4)
            .with_continentalness(4, 5)
            .with_mountainousness(4, 7)
            .with_texture_offset(0)
            .with_vegetation(8),
        Biome::new(5, "Ocean")
            .with_temperature(0, 4)
            .with_humidity(0, 4)
            .with_continentalness(0, 2)
            .with_mountainousness(0, 7)
            .with_texture_offset(5)
            .with_vegetation(0),
    ]
}

impl GeneratorSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TerrainError::input(format!("invalid settings: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TerrainError::input(format!("cannot read {}: {}", path.display(), e)))?;
        let settings = Self::from_json_str(&text)?;
        info!(path = %path.display(), "Loaded generator settings");
        Ok(settings)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TerrainError::input(format!("cannot serialize settings: {}", e)))
    }

    /// A generator with every setting applied and its height map allocated.
    pub fn build_generator(&self) -> Result<TerrainGenerator> {
        let mut generator = TerrainGenerator::new();
        generator.set_size(self.width, self.height)?;
        generator.set_chunk_resolution(self.chunk_resolution)?;
        generator.set_seed(self.seed);
        generator.set_sea_level(self.sea_level)?;

        generator.set_continentalness_config(self.continentalness);
        generator.set_mountainousness_config(self.mountainousness);
        generator.set_peaks_valleys_config(self.peaks_valleys);
        *generator.temperature_config_mut() = self.temperature;
        *generator.humidity_config_mut() = self.humidity;

        generator.set_splines(self.splines.clone())?;
        generator.set_ranges(self.ranges.clone())?;
        generator.set_biomes(self.biomes.clone())?;
        generator.initialize_map()?;
        Ok(generator)
    }

    /// An erosion engine loaded with a copy of `map`.
    pub fn build_erosion(&self, map: &HeightMap) -> Result<ErosionEngine> {
        let mut engine = ErosionEngine::new(map.width, map.height)?;
        engine.set_config(self.erosion);
        engine.set_droplet_count(self.droplets);
        engine.set_seed(self.erosion_seed);
        engine.set_map(map)?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_defaults() {
        let s = GeneratorSettings::default();
        assert_eq!((s.width, s.height, s.chunk_resolution, s.seed), (20, 20, 20, 742));
        assert_eq!(s.biomes.len(), 6);
        assert_eq!(s.ranges.len(), 4);
        assert_eq!(s.splines.len(), 6);
        assert!(s.peaks_valleys.ridge);
        assert_eq!(s.continentalness.octaves, 7);
        assert!(s.biomes.iter().all(Biome::is_specified));
    }

    #[test]
    fn test_json_round_trip() {
        let s = GeneratorSettings::default();
        let json = s.to_json_pretty().unwrap();
        let back = GeneratorSettings::from_json_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s = GeneratorSettings::from_json_str(r#"{ "seed": 1234, "width": 4 }"#).unwrap();
        assert_eq!(s.seed, 1234);
        assert_eq!(s.width, 4);
        assert_eq!(s.height, 20);
        assert_eq!(s.biomes.len(), 6);
    }

    #[test]
    fn test_malformed_json_is_invalid_input() {
        assert!(matches!(
            GeneratorSettings::from_json_str("{ seed: }"),
            Err(TerrainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_generator_rejects_bad_settings() {
        let s = GeneratorSettings {
            chunk_resolution: 0,
            ..GeneratorSettings::default()
        };
        assert!(s.build_generator().is_err());

        let s = GeneratorSettings {
            splines: vec![vec![0.0, 1.0]; 4],
            ..GeneratorSettings::default()
        };
        assert!(s.build_generator().is_err());
    }

    #[test]
    fn test_build_erosion_copies_map() {
        let s = GeneratorSettings {
            droplets: 25,
            ..GeneratorSettings::default()
        };
        let map = HeightMap::new_with(8, 8, 70.0);
        let engine = s.build_erosion(&map).unwrap();
        assert_eq!(engine.droplet_count(), 25);
        assert_eq!(engine.map(), Some(&map));
    }
}
