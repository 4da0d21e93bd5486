//! A single water droplet and its sediment bookkeeping.

use rand::Rng;

use crate::erosion::utils::Vec2;

/// What a downhill step does with the terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CapacityOutcome {
    /// Carrying too much: drop this much at the old position.
    Deposit(f32),
    /// Room left: try to erode this much around the old position.
    Gather(f32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Droplet {
    position: Vec2,
    direction: Vec2,
    velocity: f32,
    water: f32,
    sediment: f32,
    capacity: f32,
}

impl Droplet {
    pub fn new(position: Vec2, velocity: f32, water: f32, capacity: f32) -> Self {
        Self {
            position,
            direction: Vec2::ZERO,
            velocity,
            water,
            sediment: 0.0,
            capacity,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn water(&self) -> f32 {
        self.water
    }

    pub fn sediment(&self) -> f32 {
        self.sediment
    }

    pub fn capacity(&self) -> f32 {
        self.capacity
    }

    /// Blend the previous direction with the downhill direction, normalize,
    /// and take one cell-sized step.
    pub fn adjust_direction<R: Rng>(&mut self, gradient: Vec2, inertia: f32, rng: &mut R) {
        let dir = Vec2 {
            x: self.direction.x * inertia - gradient.x * (1.0 - inertia),
            y: self.direction.y * inertia - gradient.y * (1.0 - inertia),
        };

        let len = dir.length();
        self.direction = if len > 0.0 && len.is_finite() {
            Vec2::new(dir.x / len, dir.y / len)
        } else {
            // Flat spot, exact saddle or a blend too small to normalize
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            Vec2::new(angle.cos(), angle.sin())
        };
        self.position.x += self.direction.x;
        self.position.y += self.direction.y;
    }

    /// `v = sqrt(v^2 + delta * gravity)`, stopping the droplet instead of
    /// going imaginary when it climbs faster than it can.
    pub fn adjust_velocity(&mut self, elevation_difference: f32, gravity: f32) {
        let radicand = self.velocity * self.velocity + elevation_difference * gravity;
        self.velocity = if radicand > 0.0 { radicand.sqrt() } else { 0.0 };
    }

    pub fn evaporate(&mut self, evaporation_rate: f32) {
        self.water *= 1.0 - evaporation_rate;
    }

    /// Recompute capacity for a downhill step and decide between deposit and
    /// erosion.
    pub fn adjust_capacity(
        &mut self,
        min_slope: f32,
        erosion_rate: f32,
        deposition_rate: f32,
        elevation_difference: f32,
    ) -> CapacityOutcome {
        self.capacity = (-elevation_difference).max(min_slope) * self.velocity * self.water;
        if self.sediment > self.capacity {
            CapacityOutcome::Deposit(self.drop_surplus_sediment(deposition_rate))
        } else {
            CapacityOutcome::Gather(self.sediment_to_gather(erosion_rate, elevation_difference))
        }
    }

    /// Upper bound on what a downhill step may erode: a share of the free
    /// capacity, never more than the height just descended.
    pub fn sediment_to_gather(&self, erosion_rate: f32, elevation_difference: f32) -> f32 {
        ((self.capacity - self.sediment) * erosion_rate).min(-elevation_difference)
    }

    pub fn add_sediment(&mut self, amount: f32) {
        self.sediment += amount;
    }

    /// Uphill step: fill the gap behind with up to `elevation_difference`.
    pub fn drop_sediment(&mut self, elevation_difference: f32) -> f32 {
        let amount = elevation_difference.min(self.sediment);
        self.sediment -= amount;
        amount
    }

    pub fn drop_surplus_sediment(&mut self, deposition_rate: f32) -> f32 {
        let amount = (self.sediment - self.capacity) * deposition_rate;
        self.sediment -= amount;
        amount
    }
}
