//! Capabilities the host engine provides to the match core.
//!
//! The core never drives physics or pathfinding itself. It decides *when* an
//! animal should move and *where to*, then hands the request to a [`Mover`].
//! Requests are fire-and-forget: the host later reports the result through
//! `MatchSession::on_movement_finished` with the same [`MoveRequestId`].

use std::collections::HashMap;

use crate::models::{AnimalId, PickupId, PlayerId, PowerUpType};
use crate::utils::Vec3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoveRequestId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MovementOutcome {
    Completed,
    Aborted,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PathfindOptions {
    pub max_jump: f32,
    pub max_fall: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct MoveOptions {
    pub ignore_vertical_axis: bool,
}

/// Movement requests for animal entities.
pub trait Mover {
    /// Expensive: route around terrain. May abort.
    fn pathfind_to(&mut self, animal: AnimalId, request: MoveRequestId, target: Vec3, speed: f32, options: PathfindOptions);
    /// Cheap: walk in a straight line toward the target.
    fn move_to(&mut self, animal: AnimalId, request: MoveRequestId, target: Vec3, speed: f32, options: MoveOptions);
    fn face(&mut self, animal: AnimalId, target: Vec3, turn_rate: f32);
    fn teleport(&mut self, animal: AnimalId, position: Vec3);
    /// Drops any in-flight movement. No completion is reported for it.
    fn stop(&mut self, animal: AnimalId);
}

/// Terrain queries.
pub trait GroundProbe {
    /// Casts straight down from `from_y` at (x, z). Returns the first ground hit.
    fn probe_ground(&mut self, x: f32, z: f32, from_y: f32) -> Option<f32>;
}

pub trait EntitySpawner {
    fn spawn_animal(&mut self, animal: AnimalId, type_id: &str, position: Vec3);
    fn despawn_animal(&mut self, animal: AnimalId);
    fn spawn_pickup(&mut self, pickup: PickupId, kind: PowerUpType, position: Vec3);
    fn despawn_pickup(&mut self, pickup: PickupId);
}

pub trait PlayerControl {
    fn set_speed_multiplier(&mut self, player: PlayerId, multiplier: f32);
}

/// Everything the match core needs from the engine.
pub trait HostEngine: Mover + GroundProbe + EntitySpawner + PlayerControl {}

impl<T: Mover + GroundProbe + EntitySpawner + PlayerControl> HostEngine for T {}

// --- Per-tick snapshot ---

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Vec3,
}

/// Positions gathered once at the start of a tick. All behaviour logic for
/// that tick reads from here rather than from live entities.
#[derive(Clone, Debug, Default)]
pub struct WorldSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub animal_positions: HashMap<AnimalId, Vec3>,
}

impl WorldSnapshot {
    pub fn player_position(&self, id: PlayerId) -> Option<Vec3> {
        self.players.iter().find(|p| p.id == id).map(|p| p.position)
    }

    pub fn with_player(mut self, id: PlayerId, position: Vec3) -> Self {
        self.players.retain(|p| p.id != id);
        self.players.push(PlayerSnapshot { id, position });
        self
    }
}
