use serde::{Serialize, Deserialize};
use std::time::Duration;

/// World-space position. `y` is up; the flood rises along `y`.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn with_y(self, y: f32) -> Self {
        Self { y, ..self }
    }

    pub fn offset(self, dx: f32, dy: f32, dz: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Squared distance on the horizontal (x/z) plane.
pub fn get_distance_squared(x1: f32, z1: f32, x2: f32, z2: f32) -> f32 {
    let dx = x1 - x2;
    let dz = z1 - z2;
    dx * dx + dz * dz
}

pub fn planar_distance_squared(a: Vec3, b: Vec3) -> f32 {
    get_distance_squared(a.x, a.z, b.x, b.z)
}

pub fn distance_squared(a: Vec3, b: Vec3) -> f32 {
    let dy = a.y - b.y;
    planar_distance_squared(a, b) + dy * dy
}

/// Axis-aligned playable volume of the map.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct MapBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for MapBounds {
    fn default() -> Self {
        Self {
            min: Vec3::new(-64.0, 0.0, -64.0),
            max: Vec3::new(64.0, 96.0, 64.0),
        }
    }
}

impl MapBounds {
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x
            && p.y >= self.min.y && p.y <= self.max.y
            && p.z >= self.min.z && p.z <= self.max.z
    }

    /// `min <= max` on every axis. `clamp` requires it.
    pub fn is_ordered(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn clamp(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }
}

/// Seconds from config as a Duration. Values `Duration` cannot hold fall
/// back to zero.
pub fn duration_from_secs(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or_else(|e| {
        log::warn!("[Config] Duration of {}s is out of range ({}); using 0", secs, e);
        Duration::ZERO
    })
}
