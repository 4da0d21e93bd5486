//! Terrain generation library
//!
//! Noise fields, spline remapping, height map composition, biome
//! classification, vegetation placement and hydraulic erosion. Re-exports
//! modules for use by binaries and tools.

pub mod biomes;
pub mod config;
pub mod erosion;
pub mod error;
pub mod noise_field;
pub mod spline;
pub mod terrain;
pub mod tilemap;
pub mod vegetation;

pub use config::GeneratorSettings;
pub use error::{Result, TerrainError};
pub use terrain::TerrainGenerator;
