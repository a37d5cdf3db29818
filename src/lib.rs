// Rising Tide match core.
//
// Players herd animal pairs to a goal platform while a flood rises. This crate
// holds the match rules; the host engine supplies entities, physics and
// pathfinding through the traits in `host`.

pub mod models; // Shared ids and enums
pub mod utils; // Vec3, distances, map bounds
pub mod config; // GameConfig and every tunable
pub mod schedule; // Virtual match clock
pub mod host; // Capabilities the engine provides
pub mod flood; // Flood height controller
pub mod spawn_zones; // Spawn zone index
pub mod wild_animal_npc; // Animal behaviour, population, spawning
pub mod active_effects; // Power-up effect coordinator
pub mod power_up_spawning; // Pickups in the world
pub mod game_session; // Match coordinator

pub use config::GameConfig;
pub use game_session::{DeliveryResult, GameEvent, MatchSession};
pub use host::{HostEngine, MoveRequestId, MovementOutcome, PlayerSnapshot, WorldSnapshot};
pub use models::{AnimalId, Difficulty, MapSide, MatchMode, PickupId, PlayerId, PowerUpType};
pub use schedule::Timestamp;
pub use spawn_zones::{SpawnZone, SpawnZoneIndex};
pub use utils::Vec3;
