//! Droplet erosion parameters

use serde::{Deserialize, Serialize};

/// Parameters of one erosion pass. Copied into the engine by value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionConfig {
    /// Fraction of the free capacity a droplet picks up per step (0.0-1.0)
    pub erosion_rate: f32,

    /// Fraction of the surplus sediment dropped per step (0.0-1.0)
    pub deposition_rate: f32,

    /// Fraction of water lost per step (0.0-1.0)
    pub evaporation_rate: f32,

    pub gravity: f32,

    /// How much of the previous direction is kept (0.0-1.0).
    /// 0 follows the gradient exactly, 1 ignores it.
    pub inertia: f32,

    /// Floor on the slope used for capacity, so droplets on flat ground
    /// still carry something.
    pub min_slope: f32,

    /// Radius in cells of the erosion disc.
    pub erosion_radius: i32,

    /// Fraction of the old height kept when a cell is eroded (0.0-1.0)
    pub blur: f32,

    /// Maximum number of steps per droplet.
    pub droplet_lifetime: usize,

    pub initial_water: f32,
    pub initial_velocity: f32,
    pub initial_capacity: f32,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            erosion_rate: 0.2,
            deposition_rate: 0.5,
            evaporation_rate: 0.01,
            gravity: 1.0,
            inertia: 0.1,
            min_slope: 0.0,
            erosion_radius: 3,
            blur: 0.0,
            droplet_lifetime: 64,
            initial_water: 1.0,
            initial_velocity: 1.0,
            initial_capacity: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ErosionConfig =
            serde_json::from_str(r#"{ "erosion_radius": 2, "blur": 0.25 }"#).unwrap();
        assert_eq!(config.erosion_radius, 2);
        assert_eq!(config.blur, 0.25);
        assert_eq!(config.droplet_lifetime, 64);
        assert_eq!(config.inertia, 0.1);
    }
}
