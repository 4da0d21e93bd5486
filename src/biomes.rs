//! Biome classification from climate levels.
//!
//! Four world parameters (temperature, humidity, continentalness,
//! mountainousness) are bucketed into integer levels through ordered range
//! tables. A biome claims a half-open span of levels on each parameter; the
//! first biome (in insertion order) whose spans contain all four levels wins.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, TerrainError};
use crate::noise_field::{NegativePolicy, NoiseConfig, NoiseField};
use crate::tilemap::{BiomeMap, HeightMap};

/// Heights at or below this are ocean, regardless of climate.
pub const OCEAN_HEIGHT: f32 = 64.0;
/// Biome id assigned to ocean cells.
pub const OCEAN_BIOME: i32 = 5;
/// Biome id returned when no biome matches.
pub const DEFAULT_BIOME: i32 = 0;

/// Level returned for a value outside every range of its table.
pub const LEVEL_NOT_FOUND: i32 = -2;
/// Level returned for a parameter that has no table.
pub const LEVEL_INVALID: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorldParameter {
    Temperature,
    Humidity,
    Continentalness,
    Mountainousness,
    /// Reserved for biome variants; has no level table.
    Variant,
}

impl std::fmt::Display for WorldParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Humidity => write!(f, "humidity"),
            Self::Continentalness => write!(f, "continentalness"),
            Self::Mountainousness => write!(f, "mountainousness"),
            Self::Variant => write!(f, "variant"),
        }
    }
}

/// Maps raw values in `[min, max)` to `level`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: f32,
    pub max: f32,
    pub level: i32,
}

impl LevelRange {
    pub fn new(min: f32, max: f32, level: i32) -> Self {
        Self { min, max, level }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value < self.max
    }
}

/// Half-open span of levels `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpan {
    pub min: i32,
    pub max: i32,
}

impl LevelSpan {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, level: i32) -> bool {
        level >= self.min && level < self.max
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    pub id: i32,
    pub name: String,
    pub temperature: Option<LevelSpan>,
    pub humidity: Option<LevelSpan>,
    pub continentalness: Option<LevelSpan>,
    pub mountainousness: Option<LevelSpan>,
    /// Offset into the terrain texture atlas.
    #[serde(default)]
    pub texture_offset: i32,
    /// Number of vegetation points requested per chunk.
    #[serde(default)]
    pub vegetation_level: usize,
}

impl Biome {
    /// A biome with no level spans. It matches nothing until all four spans
    /// are set.
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            temperature: None,
            humidity: None,
            continentalness: None,
            mountainousness: None,
            texture_offset: 0,
            vegetation_level: 0,
        }
    }

    pub fn with_temperature(mut self, min: i32, max: i32) -> Self {
        self.set_temperature_level(LevelSpan::new(min, max));
        self
    }

    pub fn with_humidity(mut self, min: i32, max: i32) -> Self {
        self.set_humidity_level(LevelSpan::new(min, max));
        self
    }

    pub fn with_continentalness(mut self, min: i32, max: i32) -> Self {
        self.set_continentalness_level(LevelSpan::new(min, max));
        self
    }

    pub fn with_mountainousness(mut self, min: i32, max: i32) -> Self {
        self.set_mountainousness_level(LevelSpan::new(min, max));
        self
    }

    pub fn with_texture_offset(mut self, offset: i32) -> Self {
        self.texture_offset = offset;
        self
    }

    pub fn with_vegetation(mut self, level: usize) -> Self {
        self.vegetation_level = level;
        self
    }

    pub fn set_temperature_level(&mut self, span: LevelSpan) {
        self.temperature = Some(span);
    }

    pub fn set_humidity_level(&mut self, span: LevelSpan) {
        self.humidity = Some(span);
    }

    pub fn set_continentalness_level(&mut self, span: LevelSpan) {
        self.continentalness = Some(span);
    }

    pub fn set_mountainousness_level(&mut self, span: LevelSpan) {
        self.mountainousness = Some(span);
    }

    pub fn is_specified(&self) -> bool {
        self.temperature.is_some()
            && self.humidity.is_some()
            && self.continentalness.is_some()
            && self.mountainousness.is_some()
    }

    /// True when all four levels fall inside this biome's spans.
    pub fn matches(&self, temperature: i32, humidity: i32, continentalness: i32, mountainousness: i32) -> bool {
        let within = |span: Option<LevelSpan>, level| span.is_some_and(|s| s.contains(level));
        within(self.temperature, temperature)
            && within(self.humidity, humidity)
            && within(self.continentalness, continentalness)
            && within(self.mountainousness, mountainousness)
    }
}

/// Scale of the temperature and humidity fields.
pub const CLIMATE_SCALE: f32 = 0.01;
/// Contrast of the temperature and humidity fields.
pub const CLIMATE_CONTRAST: f32 = 1.5;

/// Configuration of the climate noise fields before seeding.
pub fn default_climate_config() -> NoiseConfig {
    NoiseConfig {
        scale: CLIMATE_SCALE,
        contrast: CLIMATE_CONTRAST,
        policy: NegativePolicy::Nothing,
        ..NoiseConfig::default()
    }
}

pub struct BiomeClassifier {
    temperature_levels: Vec<LevelRange>,
    humidity_levels: Vec<LevelRange>,
    continentalness_levels: Vec<LevelRange>,
    mountainousness_levels: Vec<LevelRange>,
    /// Insertion order, ids unique.
    biomes: Vec<Biome>,
    temperature: NoiseField,
    humidity: NoiseField,
}

impl Default for BiomeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BiomeClassifier {
    pub fn new() -> Self {
        Self {
            temperature_levels: Vec::new(),
            humidity_levels: Vec::new(),
            continentalness_levels: Vec::new(),
            mountainousness_levels: Vec::new(),
            biomes: Vec::new(),
            temperature: NoiseField::with_config(default_climate_config()),
            humidity: NoiseField::with_config(default_climate_config()),
        }
    }

    /// Install the level tables, ordered temperature, humidity,
    /// continentalness, mountainousness.
    pub fn set_ranges(&mut self, tables: Vec<Vec<LevelRange>>) -> Result<()> {
        let [t, h, c, m]: [Vec<LevelRange>; 4] = tables.try_into().map_err(|t: Vec<_>| {
            TerrainError::input(format!("expected 4 level tables, got {}", t.len()))
        })?;
        self.temperature_levels = t;
        self.humidity_levels = h;
        self.continentalness_levels = c;
        self.mountainousness_levels = m;
        Ok(())
    }

    fn table(&self, parameter: WorldParameter) -> Option<&[LevelRange]> {
        match parameter {
            WorldParameter::Temperature => Some(&self.temperature_levels),
            WorldParameter::Humidity => Some(&self.humidity_levels),
            WorldParameter::Continentalness => Some(&self.continentalness_levels),
            WorldParameter::Mountainousness => Some(&self.mountainousness_levels),
            WorldParameter::Variant => None,
        }
    }

    /// Level of `value` on `parameter`: the first matching range in table
    /// order, `LEVEL_NOT_FOUND` if none matches, `LEVEL_INVALID` if the
    /// parameter has no table.
    pub fn determine_level(&self, parameter: WorldParameter, value: f32) -> i32 {
        let Some(table) = self.table(parameter) else {
            trace!(%parameter, "no level table for parameter");
            return LEVEL_INVALID;
        };
        match table.iter().find(|r| r.contains(value)) {
            Some(range) => range.level,
            None => {
                trace!(%parameter, value, "level not found");
                LEVEL_NOT_FOUND
            }
        }
    }

    /// Add biomes. A biome whose id is already present replaces the earlier
    /// one in place.
    pub fn set_biomes(&mut self, biomes: Vec<Biome>) -> Result<()> {
        if biomes.is_empty() {
            return Err(TerrainError::input("biome list is empty"));
        }
        for biome in biomes {
            match self.biomes.iter_mut().find(|b| b.id == biome.id) {
                Some(slot) => *slot = biome,
                None => self.biomes.push(biome),
            }
        }
        Ok(())
    }

    pub fn biome(&self, id: i32) -> Option<&Biome> {
        self.biomes.iter().find(|b| b.id == id)
    }

    pub fn biomes(&self) -> &[Biome] {
        &self.biomes
    }

    /// Id of the first biome containing all four levels, or `DEFAULT_BIOME`.
    pub fn determine_biome(&self, temperature: i32, humidity: i32, continentalness: i32, mountainousness: i32) -> i32 {
        match self
            .biomes
            .iter()
            .find(|b| b.matches(temperature, humidity, continentalness, mountainousness))
        {
            Some(biome) => biome.id,
            None => {
                trace!(temperature, humidity, continentalness, mountainousness, "no biome matched");
                DEFAULT_BIOME
            }
        }
    }

    pub fn temperature_config_mut(&mut self) -> &mut NoiseConfig {
        self.temperature.config_mut()
    }

    pub fn humidity_config_mut(&mut self) -> &mut NoiseConfig {
        self.humidity.config_mut()
    }

    pub fn temperature_noise(&self) -> &NoiseField {
        &self.temperature
    }

    pub fn humidity_noise(&self) -> &NoiseField {
        &self.humidity
    }

    /// Assign a biome id to every cell of `height_map`.
    ///
    /// `width`/`height` are in chunks of `chunk_res` cells. Temperature and
    /// humidity fields are regenerated with `seed` and `seed / 2`, always at
    /// `CLIMATE_SCALE` and `CLIMATE_CONTRAST` with no negative handling;
    /// their other settings (octaves, persistence, ...) are kept.
    /// continentalness and mountainousness are read from the terrain fields,
    /// which must already cover the same grid.
    #[allow(clippy::too_many_arguments)]
    pub fn classify_map(
        &mut self,
        height_map: &HeightMap,
        width: usize,
        height: usize,
        chunk_res: usize,
        seed: i32,
        continentalness: &NoiseField,
        mountainousness: &NoiseField,
    ) -> Result<BiomeMap> {
        let (grid_w, grid_h) = (width * chunk_res, height * chunk_res);
        if grid_w == 0 || grid_h == 0 {
            return Err(TerrainError::state("biome classification on an empty map"));
        }
        if height_map.width != grid_w || height_map.height != grid_h {
            return Err(TerrainError::state(format!(
                "height map is {}x{}, expected {}x{}",
                height_map.width, height_map.height, grid_w, grid_h
            )));
        }
        let c_map = terrain_field(continentalness, grid_w, grid_h, "continentalness")?;
        let m_map = terrain_field(mountainousness, grid_w, grid_h, "mountainousness")?;

        for (field, field_seed) in [(&mut self.temperature, seed), (&mut self.humidity, seed / 2)] {
            field.set_seed(field_seed);
            field.set_scale(CLIMATE_SCALE);
            let config = field.config_mut();
            config.contrast = CLIMATE_CONTRAST;
            config.policy = NegativePolicy::Nothing;
            field.set_map_size(width, height);
            field.set_chunk_size(chunk_res, chunk_res);
            field.initialize();
            field.generate_by_chunks()?;
        }

        let t_map = terrain_field(&self.temperature, grid_w, grid_h, "temperature")?;
        let h_map = terrain_field(&self.humidity, grid_w, grid_h, "humidity")?;

        let mut biome_map = BiomeMap::new_with(grid_w, grid_h, DEFAULT_BIOME);
        biome_map
            .as_mut_slice()
            .par_chunks_mut(grid_w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    if *height_map.get(x, y) <= OCEAN_HEIGHT {
                        *cell = OCEAN_BIOME;
                        continue;
                    }
                    let t = self.determine_level(WorldParameter::Temperature, *t_map.get(x, y));
                    let h = self.determine_level(WorldParameter::Humidity, *h_map.get(x, y));
                    let c = self.determine_level(WorldParameter::Continentalness, *c_map.get(x, y));
                    let m = self.determine_level(WorldParameter::Mountainousness, *m_map.get(x, y));
                    *cell = self.determine_biome(t, h, c, m);
                }
            });

        debug!(cells = biome_map.len(), biomes = self.biomes.len(), "Biome map classified");
        Ok(biome_map)
    }
}

fn terrain_field<'a>(
    field: &'a NoiseField,
    width: usize,
    height: usize,
    name: &str,
) -> Result<&'a HeightMap> {
    match field.map() {
        Some(map) if map.width == width && map.height == height => Ok(map),
        Some(map) => Err(TerrainError::state(format!(
            "{} field is {}x{}, expected {}x{}",
            name, map.width, map.height, width, height
        ))),
        None => Err(TerrainError::state(format!("{} field not generated", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges() -> Vec<Vec<LevelRange>> {
        let climate = vec![
            LevelRange::new(-1.0, -0.5, 0),
            LevelRange::new(-0.5, 0.0, 1),
            LevelRange::new(0.0, 0.5, 2),
            LevelRange::new(0.5, 1.1, 3),
        ];
        vec![
            climate.clone(),
            climate,
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
        ]
    }

    fn grassplains() -> Biome {
        Biome::new(0, "Grassplains")
            .with_temperature(1, 2)
            .with_humidity(1, 4)
            .with_continentalness(3, 5)
            .with_mountainousness(0, 3)
    }

    fn desert() -> Biome {
        Biome::new(1, "Desert")
            .with_temperature(2, 4)
            .with_humidity(0, 1)
            .with_continentalness(3, 5)
            .with_mountainousness(0, 4)
    }

    fn classifier() -> BiomeClassifier {
        let mut c = BiomeClassifier::new();
        c.set_ranges(ranges()).unwrap();
        c.set_biomes(vec![grassplains(), desert()]).unwrap();
        c
    }

    #[test]
    fn test_biome_span_is_half_open() {
        let b = grassplains();
        assert!(b.matches(1, 1, 3, 0));
        assert!(b.matches(1, 3, 4, 2));
        assert!(!b.matches(2, 1, 3, 0));
        assert!(!b.matches(1, 4, 3, 0));
    }

    #[test]
    fn test_unspecified_biome_matches_nothing() {
        let b = Biome::new(9, "Unfinished").with_temperature(0, 4);
        assert!(!b.is_specified());
        assert!(!b.matches(1, 1, 1, 1));
        assert!(grassplains().is_specified());
    }

    #[test]
    fn test_set_ranges_requires_four_tables() {
        let mut c = BiomeClassifier::new();
        let mut tables = ranges();
        tables.pop();
        assert!(matches!(c.set_ranges(tables), Err(TerrainError::InvalidInput(_))));
        assert!(c.set_ranges(ranges()).is_ok());
    }

    #[test]
    fn test_empty_biome_list_rejected() {
        let mut c = BiomeClassifier::new();
        assert!(matches!(c.set_biomes(Vec::new()), Err(TerrainError::InvalidInput(_))));
    }

    #[test]
    fn test_determine_level() {
        let c = classifier();
        assert_eq!(c.determine_level(WorldParameter::Humidity, -1.5), LEVEL_NOT_FOUND);
        assert_eq!(c.determine_level(WorldParameter::Humidity, -0.5), 1);
        assert_eq!(c.determine_level(WorldParameter::Temperature, 0.99), 3);
        assert_eq!(c.determine_level(WorldParameter::Mountainousness, 0.5), 5);
        assert_eq!(c.determine_level(WorldParameter::Variant, 0.0), LEVEL_INVALID);
    }

    #[test]
    fn test_first_matching_biome_wins() {
        let mut c = classifier();
        let overlapping = Biome::new(7, "Meadow")
            .with_temperature(0, 4)
            .with_humidity(0, 4)
            .with_continentalness(0, 5)
            .with_mountainousness(0, 7);
        c.set_biomes(vec![overlapping]).unwrap();
        assert_eq!(c.determine_biome(1, 1, 3, 0), 0);
        assert_eq!(c.determine_biome(2, 0, 3, 1), 1);
        assert_eq!(c.determine_biome(0, 0, 0, 6), 7);
    }

    #[test]
    fn test_no_match_falls_back_to_default() {
        let c = classifier();
        assert_eq!(c.determine_biome(-2, -2, -2, -2), DEFAULT_BIOME);
    }

    #[test]
    fn test_duplicate_id_replaces_in_place() {
        let mut c = classifier();
        let renamed = Biome { name: "Steppe".to_string(), ..grassplains() };
        c.set_biomes(vec![renamed]).unwrap();
        assert_eq!(c.biomes().len(), 2);
        assert_eq!(c.biomes()[0].name, "Steppe");
        assert_eq!(c.biome(1).map(|b| b.name.as_str()), Some("Desert"));
        assert!(c.biome(42).is_none());
    }

    fn terrain_noise(seed: i32) -> NoiseField {
        let mut f = NoiseField::with_config(NoiseConfig {
            seed,
            scale: 0.05,
            policy: NegativePolicy::Nothing,
            ..NoiseConfig::default()
        });
        f.set_map_size(3, 3);
        f.set_chunk_size(4, 4);
        f.initialize();
        f.generate_by_chunks().unwrap();
        f
    }

    #[test]
    fn test_classify_map_marks_ocean_and_is_repeatable() {
        let mut c = classifier();
        let cont = terrain_noise(742);
        let mount = terrain_noise(371);
        let mut heights = HeightMap::new_with(12, 12, 80.0);
        for x in 0..12 {
            heights.set(x, 0, 64.0);
        }

        let first = c.classify_map(&heights, 3, 3, 4, 742, &cont, &mount).unwrap();
        let second = c.classify_map(&heights, 3, 3, 4, 742, &cont, &mount).unwrap();
        assert_eq!(first, second);
        assert!((0..12).all(|x| *first.get(x, 0) == OCEAN_BIOME));
        assert!((0..12).all(|x| [0, 1].contains(first.get(x, 5))));
    }

    #[test]
    fn test_classify_map_resets_climate_noise() {
        let cont = terrain_noise(742);
        let mount = terrain_noise(371);
        let heights = HeightMap::new_with(12, 12, 80.0);

        let mut plain = classifier();
        assert!(!plain.temperature_noise().is_initialized());
        let expected = plain.classify_map(&heights, 3, 3, 4, 742, &cont, &mount).unwrap();

        let mut edited = classifier();
        edited.temperature_config_mut().scale = 0.5;
        edited.temperature_config_mut().contrast = 3.0;
        edited.humidity_config_mut().policy = NegativePolicy::FlattenNegatives;
        let biomes = edited.classify_map(&heights, 3, 3, 4, 742, &cont, &mount).unwrap();
        assert_eq!(biomes, expected);

        let temperature = edited.temperature_noise();
        assert!(temperature.is_initialized());
        assert_eq!(temperature.config().seed, 742);
        assert_eq!(temperature.config().scale, CLIMATE_SCALE);
        assert_eq!(temperature.config().contrast, CLIMATE_CONTRAST);
        let humidity = edited.humidity_noise();
        assert_eq!(humidity.config().seed, 371);
        assert_eq!(humidity.config().policy, NegativePolicy::Nothing);
        assert_eq!((humidity.grid_width(), humidity.grid_height()), (12, 12));
    }

    #[test]
    fn test_classify_map_looks_up_temperature_before_humidity() {
        let mut c = classifier();
        let cont = terrain_noise(742);
        let mount = terrain_noise(371);
        let heights = HeightMap::new_with(12, 12, 80.0);
        let biomes = c.classify_map(&heights, 3, 3, 4, 742, &cont, &mount).unwrap();

        let t_map = c.temperature_noise().map().unwrap();
        let h_map = c.humidity_noise().map().unwrap();
        for (x, y, &id) in biomes.iter() {
            let expected = c.determine_biome(
                c.determine_level(WorldParameter::Temperature, *t_map.get(x, y)),
                c.determine_level(WorldParameter::Humidity, *h_map.get(x, y)),
                c.determine_level(WorldParameter::Continentalness, *cont.map().unwrap().get(x, y)),
                c.determine_level(WorldParameter::Mountainousness, *mount.map().unwrap().get(x, y)),
            );
            assert_eq!(id, expected, "cell ({}, {})", x, y);
        }
    }

    #[test]
    fn test_classify_map_rejects_mismatched_inputs() {
        let mut c = classifier();
        let cont = terrain_noise(1);
        let mount = terrain_noise(2);
        let heights = HeightMap::new_with(10, 12, 80.0);
        assert!(matches!(
            c.classify_map(&heights, 3, 3, 4, 1, &cont, &mount),
            Err(TerrainError::InvalidState(_))
        ));

        let heights = HeightMap::new_with(16, 16, 80.0);
        assert!(matches!(
            c.classify_map(&heights, 4, 4, 4, 1, &cont, &mount),
            Err(TerrainError::InvalidState(_))
        ));
    }
}
