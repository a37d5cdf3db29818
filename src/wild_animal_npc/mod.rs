// Wild Animal NPC System - Module Organization
// Per-animal behaviour, the population that owns them, and spawning

pub mod core;
pub mod population;
pub mod respawn;

// Re-export core types and functionality
pub use self::core::*;

pub use population::{AnimalPopulation, PairProgress};
pub use respawn::SpawnCtx;
