use serde::{Serialize, Deserialize};
use std::fmt;

// --- Identifiers ---

/// Player identity as handed to us by the host engine.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

/// One spawned animal individual. Also used as the host entity handle.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimalId(pub u64);

/// A power-up pickup lying in the world.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PickupId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for PickupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pickup#{}", self.0)
    }
}

// --- Map layout ---

/// Half of a dual-sided map. Single-sided maps tag every zone `West`.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapSide {
    West,
    East,
}

impl MapSide {
    pub fn opposite(self) -> MapSide {
        match self {
            MapSide::West => MapSide::East,
            MapSide::East => MapSide::West,
        }
    }
}

/// Which sides of the map the current match plays on.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchMode {
    SingleSide(MapSide), // Only one half is in use (solo / co-op on a split map)
    BothSides,           // Whole map in use, pairs split across halves
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::BothSides
    }
}

impl MatchMode {
    pub fn active_sides(&self) -> Vec<MapSide> {
        match self {
            MatchMode::SingleSide(side) => vec![*side],
            MatchMode::BothSides => vec![MapSide::West, MapSide::East],
        }
    }

    pub fn allows(&self, side: MapSide) -> bool {
        match self {
            MatchMode::SingleSide(active) => *active == side,
            MatchMode::BothSides => true,
        }
    }
}

// --- Difficulty ---

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Normal
    }
}

// --- Power-ups ---

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PowerUpType {
    SpeedBoots,   // Movement speed multiplier for the holder
    AnimalMagnet, // Periodically pulls nearby animals into following the holder
    FloodFreeze,  // Holds the water level while any holder is active
}

impl PowerUpType {
    pub const ALL: [PowerUpType; 3] = [
        PowerUpType::SpeedBoots,
        PowerUpType::AnimalMagnet,
        PowerUpType::FloodFreeze,
    ];
}
