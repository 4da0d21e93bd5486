//! Erosion simulation module
//!
//! Particle-based hydraulic erosion over a copy of a height map:
//! - `hydraulic`: the droplet engine and its simulation loop
//! - `droplet`: a single droplet's movement and sediment bookkeeping
//! - `utils`: bilinear sampling and the erosion disc
//! - `params`: tunable parameters

pub mod droplet;
pub mod hydraulic;
pub mod params;
pub mod utils;

pub use droplet::{CapacityOutcome, Droplet};
pub use hydraulic::ErosionEngine;
pub use params::ErosionConfig;
pub use utils::Vec2;

/// One recorded droplet sample: `[x / width, height, y / height]`.
pub type TrackPoint = [f32; 3];

/// Statistics from an erosion pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Droplets created at the start of the pass
    pub spawned: usize,
    /// Droplets that stepped off the map
    pub fell_off: usize,
    /// Droplets still alive when their lifetime ran out
    pub expired: usize,
    /// Total material eroded (in height units)
    pub total_eroded: f64,
    /// Total material deposited
    pub total_deposited: f64,
}

impl std::fmt::Display for ErosionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} droplets ({} fell off, {} expired), eroded {:.3}, deposited {:.3}",
            self.spawned, self.fell_off, self.expired, self.total_eroded, self.total_deposited
        )
    }
}
