//! Bilinear sampling helpers for droplet erosion.
//!
//! All helpers assume the position lies on the map, i.e. `0 <= x < width - 1`
//! and `0 <= y < height - 1`, so the cell's right and bottom neighbours exist.
//! The engine checks this with `is_on_map` before sampling.

use crate::tilemap::HeightMap;

/// A position or direction on the height map, in cell units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Integer cell and the fractional offset inside it.
#[inline]
fn cell(pos: Vec2) -> (usize, usize, f32, f32) {
    let x = pos.x as usize;
    let y = pos.y as usize;
    (x, y, pos.x - x as f32, pos.y - y as f32)
}

#[inline]
fn corners(map: &HeightMap, x: usize, y: usize) -> (f32, f32, f32, f32) {
    (
        *map.get(x, y),
        *map.get(x + 1, y),
        *map.get(x, y + 1),
        *map.get(x + 1, y + 1),
    )
}

pub fn is_on_map(width: usize, height: usize, pos: Vec2) -> bool {
    pos.x >= 0.0 && pos.y >= 0.0 && pos.x < width as f32 - 1.0 && pos.y < height as f32 - 1.0
}

/// Slope of the cell under `pos`, pointing uphill.
///
/// Each component is the edge difference along that axis, blended across the
/// cell by the offset along the same axis.
pub fn gradient(map: &HeightMap, pos: Vec2) -> Vec2 {
    let (x, y, fx, fy) = cell(pos);
    let (h00, h10, h01, h11) = corners(map, x, y);
    Vec2 {
        x: (h10 - h00) * (1.0 - fx) + (h11 - h01) * fx,
        y: (h01 - h00) * (1.0 - fy) + (h11 - h10) * fy,
    }
}

/// Bilinearly interpolated height at `pos`.
pub fn interpolated_height(map: &HeightMap, pos: Vec2) -> f32 {
    let (x, y, fx, fy) = cell(pos);
    let (h00, h10, h01, h11) = corners(map, x, y);
    h00 * (1.0 - fx) * (1.0 - fy) + h10 * fx * (1.0 - fy) + h01 * (1.0 - fx) * fy + h11 * fx * fy
}

/// `H(new) - H(old)`. Positive means the droplet moved uphill.
pub fn elevation_difference(map: &HeightMap, old: Vec2, new: Vec2) -> f32 {
    interpolated_height(map, new) - interpolated_height(map, old)
}

/// Add `amount` to the four corners of the cell under `pos`, weighted
/// bilinearly.
pub fn distribute_sediment(map: &mut HeightMap, pos: Vec2, amount: f32) {
    let (x, y, fx, fy) = cell(pos);
    *map.get_mut(x, y) += (1.0 - fx) * (1.0 - fy) * amount;
    *map.get_mut(x + 1, y) += fx * (1.0 - fy) * amount;
    *map.get_mut(x, y + 1) += (1.0 - fx) * fy * amount;
    *map.get_mut(x + 1, y + 1) += fx * fy * amount;
}

/// Remove up to `amount` of material from cells around `old`.
///
/// Only cells closer than `radius` and higher than the cell under `new` are
/// eroded. Each gets a share weighted by `1 - d / radius`, capped so no cell
/// drops below 0. `blur` keeps that fraction of the old height. Returns the
/// height actually removed.
pub fn erode_radius(
    map: &mut HeightMap,
    old: Vec2,
    new: Vec2,
    amount: f32,
    radius: i32,
    blur: f32,
) -> f32 {
    if radius <= 0 || amount <= 0.0 {
        return 0.0;
    }
    let (width, height) = (map.width as i32, map.height as i32);
    let floor = *map.get(new.x as usize, new.y as usize);
    let (cx, cy) = (old.x as i32, old.y as i32);
    let radius_f = radius as f32;

    let mut weights: Vec<(usize, usize, f32)> = Vec::new();
    let mut weight_sum = 0.0;
    for y in (cy - radius).max(0)..=(cy + radius).min(height - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(width - 1) {
            let dx = x as f32 - old.x;
            let dy = y as f32 - old.y;
            let distance = (dx * dx + dy * dy).sqrt();
            let (ux, uy) = (x as usize, y as usize);
            if distance < radius_f && *map.get(ux, uy) > floor {
                let weight = 1.0 - distance / radius_f;
                weight_sum += weight;
                weights.push((ux, uy, weight));
            }
        }
    }

    if weight_sum <= 0.0 {
        return 0.0;
    }

    let mut total = 0.0;
    for (x, y, weight) in weights {
        let h = map.get_mut(x, y);
        let take = (amount * weight / weight_sum).min(h.max(0.0));
        *h = blur * *h + (1.0 - blur) * (*h - take);
        total += (1.0 - blur) * take;
    }
    total
}
