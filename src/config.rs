/******************************************************************************
 *                                                                            *
 * Match Configuration                                                        *
 *                                                                            *
 * Every tunable used by the flood, animal, spawn and power-up systems.       *
 * Systems read them from a GameConfig built once per match and passed in     *
 * explicitly.                                                                *
 *                                                                            *
 ******************************************************************************/

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Difficulty, MatchMode, PowerUpType};
use crate::utils::MapBounds;

// --- Flood ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RiseRates {
    pub easy: f32,   // units per second
    pub normal: f32,
    pub hard: f32,
}

impl Default for RiseRates {
    fn default() -> Self {
        Self { easy: 0.5, normal: 1.0, hard: 1.5 }
    }
}

impl RiseRates {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> f32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Normal => self.normal,
            Difficulty::Hard => self.hard,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FloodConfig {
    pub start_height: f32,
    pub max_height: f32,
    pub start_delay_secs: f32, // Countdown before the water starts moving
    pub tick_interval_ms: u64, // 200ms = 5 rises per second
    pub rise_rate: RiseRates,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            start_height: 2.0,
            max_height: 40.0,
            start_delay_secs: 10.0,
            tick_interval_ms: 200,
            rise_rate: RiseRates::default(),
        }
    }
}

// --- Spawning ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    pub min_spawn_height: f32,  // Lowest y an animal may be placed at (safely above the starting flood)
    pub max_spawn_height: f32,  // Highest y an animal may be placed at
    pub platform_height: f32,   // Delivery platform; nothing spawns above it
    pub population_cap: usize,
    pub spawn_jitter: f32,      // Max x/z offset from the chosen zone centre
    pub probe_start_height: f32, // Ground probes are cast down from here
    pub ground_offset: f32,     // Placed this far above the probed ground
    pub respawn_on_pair_collected: bool,
    pub map_bounds: MapBounds,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            min_spawn_height: 8.0,
            max_spawn_height: 60.0,
            platform_height: 70.0,
            population_cap: 50,
            spawn_jitter: 2.0,
            probe_start_height: 120.0,
            ground_offset: 1.0,
            respawn_on_pair_collected: true,
            map_bounds: MapBounds::default(),
        }
    }
}

impl SpawnConfig {
    /// Upper edge of the valid spawn band.
    pub fn spawn_ceiling(&self) -> f32 {
        self.max_spawn_height.min(self.platform_height)
    }

    pub fn clamp_spawn_height(&self, y: f32) -> f32 {
        y.clamp(self.min_spawn_height, self.spawn_ceiling())
    }
}

// --- Animal behaviour ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BehaviorConfig {
    pub wander_delay_min_ms: u64,
    pub wander_delay_max_ms: u64,
    pub wander_radius: f32,
    pub danger_buffer: f32,   // Flee once flood + danger_buffer > animal y
    pub safe_buffer: f32,     // Stop fleeing once y >= flood + safe_buffer. Keep >= danger_buffer.
    pub flee_stagger_min_ms: u64,
    pub flee_stagger_max_ms: u64,
    pub flee_target_jitter: f32,
    pub follow_distance: f32, // Followers stop closing in inside this radius
    pub teleport_distance: f32, // Followers further than this are snapped next to their player
    pub teleport_offset: f32,
    pub follow_cap: usize,    // Animals one player may lead at once
    pub walk_speed: f32,
    pub run_speed: f32,
    pub follow_speed: f32,
    pub max_jump: f32,
    pub max_fall: f32,
    pub pathfind_cooldown_ms: u64, // After an abort, use direct moves for this long
    pub follow_eval_interval_ticks: u32,
    pub bounds_check_interval_ticks: u32,
    pub face_interval_ticks: u32,
    pub turn_rate: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            wander_delay_min_ms: 3_000,
            wander_delay_max_ms: 8_000,
            wander_radius: 8.0,
            danger_buffer: 5.0,
            safe_buffer: 6.0,
            flee_stagger_min_ms: 100,
            flee_stagger_max_ms: 900,
            flee_target_jitter: 1.5,
            follow_distance: 3.0,
            teleport_distance: 20.0,
            teleport_offset: 1.5,
            follow_cap: 2,
            walk_speed: 3.0,
            run_speed: 6.0,
            follow_speed: 5.0,
            max_jump: 1.0,
            max_fall: 3.0,
            pathfind_cooldown_ms: 3_000,
            follow_eval_interval_ticks: 3,
            bounds_check_interval_ticks: 10,
            face_interval_ticks: 6,
            turn_rate: 4.0,
        }
    }
}

// --- Power-ups ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PowerUpKindConfig {
    pub duration_secs: f32,
    pub magnitude: f32, // SpeedBoots: speed multiplier. AnimalMagnet: pull radius. FloodFreeze: unused.
    pub spawn_weight: u32,
}

impl Default for PowerUpKindConfig {
    fn default() -> Self {
        Self { duration_secs: 10.0, magnitude: 1.0, spawn_weight: 1 }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PowerUpKinds {
    pub speed_boots: PowerUpKindConfig,
    pub animal_magnet: PowerUpKindConfig,
    pub flood_freeze: PowerUpKindConfig,
}

impl Default for PowerUpKinds {
    fn default() -> Self {
        Self {
            speed_boots: PowerUpKindConfig { duration_secs: 10.0, magnitude: 1.5, spawn_weight: 5 },
            animal_magnet: PowerUpKindConfig { duration_secs: 8.0, magnitude: 12.0, spawn_weight: 3 },
            flood_freeze: PowerUpKindConfig { duration_secs: 6.0, magnitude: 0.0, spawn_weight: 2 },
        }
    }
}

impl PowerUpKinds {
    pub fn get(&self, kind: PowerUpType) -> &PowerUpKindConfig {
        match kind {
            PowerUpType::SpeedBoots => &self.speed_boots,
            PowerUpType::AnimalMagnet => &self.animal_magnet,
            PowerUpType::FloodFreeze => &self.flood_freeze,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PowerUpConfig {
    pub expiry_sweep_interval_ms: u64,
    pub magnet_interval_ms: u64,
    pub spawn_interval_ms: u64,
    pub max_active_pickups: usize,
    pub pickup_radius: f32,
    pub spawn_tags: Vec<String>, // Empty = any zone
    pub kinds: PowerUpKinds,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_interval_ms: 500,
            magnet_interval_ms: 1_000,
            spawn_interval_ms: 15_000,
            max_active_pickups: 3,
            pickup_radius: 1.5,
            spawn_tags: Vec::new(),
            kinds: PowerUpKinds::default(),
        }
    }
}

// --- Animal catalog ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnimalTypeConfig {
    pub type_id: String,
    pub pairs_required: u32,
    #[serde(default)]
    pub spawn_tags: Vec<String>,
    #[serde(default)]
    pub preferred_tiers: Vec<u8>,
}

impl AnimalTypeConfig {
    fn new(type_id: &str, pairs_required: u32, tags: &[&str], tiers: &[u8]) -> Self {
        Self {
            type_id: type_id.to_string(),
            pairs_required,
            spawn_tags: tags.iter().map(|t| t.to_string()).collect(),
            preferred_tiers: tiers.to_vec(),
        }
    }
}

lazy_static! {
    pub static ref DEFAULT_ANIMAL_TYPES: Vec<AnimalTypeConfig> = vec![
        AnimalTypeConfig::new("sheep", 1, &["meadow"], &[1, 2]),
        AnimalTypeConfig::new("cow", 1, &["meadow", "farm"], &[1]),
        AnimalTypeConfig::new("pig", 1, &["mud", "farm"], &[1]),
        AnimalTypeConfig::new("chicken", 1, &["farm"], &[1, 2]),
        AnimalTypeConfig::new("goat", 1, &["mountain", "rocky"], &[3]),
        AnimalTypeConfig::new("fox", 1, &["forest"], &[2]),
        AnimalTypeConfig::new("deer", 1, &["forest", "meadow"], &[2, 3]),
    ];
}

// --- Root ---

/// Longest countdown or buff duration a config may ask for.
pub const MAX_DURATION_SECS: f32 = 3_600.0;

fn check_duration(name: &str, secs: f32, allow_zero: bool) -> Result<(), String> {
    let lower_ok = if allow_zero { secs >= 0.0 } else { secs > 0.0 };
    if !lower_ok || !(secs <= MAX_DURATION_SECS) {
        return Err(format!("{} must be within 0..={} seconds, got {}", name, MAX_DURATION_SECS, secs));
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    pub match_mode: MatchMode,
    pub rng_seed: Option<u64>,
    pub flood: FloodConfig,
    pub spawn: SpawnConfig,
    pub behavior: BehaviorConfig,
    pub power_ups: PowerUpConfig,
    pub animal_types: Vec<AnimalTypeConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            match_mode: MatchMode::default(),
            rng_seed: None,
            flood: FloodConfig::default(),
            spawn: SpawnConfig::default(),
            behavior: BehaviorConfig::default(),
            power_ups: PowerUpConfig::default(),
            animal_types: DEFAULT_ANIMAL_TYPES.clone(),
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: GameConfig = serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse game config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read game config {}: {}", path.display(), e))?;
        log::info!("[Config] Loading game config from {}", path.display());
        Self::from_json_str(&raw)
    }

    pub fn rise_rate(&self) -> f32 {
        self.flood.rise_rate.for_difficulty(self.difficulty)
    }

    pub fn animal_type(&self, type_id: &str) -> Option<&AnimalTypeConfig> {
        self.animal_types.iter().find(|t| t.type_id == type_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        let flood = &self.flood;
        if flood.max_height < flood.start_height {
            return Err(format!(
                "flood.max_height ({}) is below flood.start_height ({})",
                flood.max_height, flood.start_height
            ));
        }
        if flood.tick_interval_ms == 0 {
            return Err("flood.tick_interval_ms must be greater than zero".to_string());
        }
        check_duration("flood.start_delay_secs", flood.start_delay_secs, true)?;
        for (name, rate) in [
            ("easy", flood.rise_rate.easy),
            ("normal", flood.rise_rate.normal),
            ("hard", flood.rise_rate.hard),
        ] {
            if rate < 0.0 {
                return Err(format!("flood.rise_rate.{} must not be negative", name));
            }
        }

        let spawn = &self.spawn;
        if spawn.min_spawn_height > spawn.spawn_ceiling() {
            return Err(format!(
                "spawn band is empty: min_spawn_height {} > ceiling {}",
                spawn.min_spawn_height,
                spawn.spawn_ceiling()
            ));
        }
        if !spawn.map_bounds.is_ordered() {
            return Err(format!(
                "spawn.map_bounds is inverted: min {:?} exceeds max {:?} on some axis",
                spawn.map_bounds.min, spawn.map_bounds.max
            ));
        }
        if spawn.spawn_jitter < 0.0 {
            return Err("spawn.spawn_jitter must not be negative".to_string());
        }

        let behavior = &self.behavior;
        if behavior.wander_delay_min_ms > behavior.wander_delay_max_ms {
            return Err("behavior.wander_delay_min_ms exceeds wander_delay_max_ms".to_string());
        }
        if behavior.flee_stagger_min_ms > behavior.flee_stagger_max_ms {
            return Err("behavior.flee_stagger_min_ms exceeds flee_stagger_max_ms".to_string());
        }
        if behavior.follow_eval_interval_ticks == 0
            || behavior.bounds_check_interval_ticks == 0
            || behavior.face_interval_ticks == 0
        {
            return Err("behavior tick throttles must be at least 1".to_string());
        }
        if behavior.teleport_distance < behavior.follow_distance {
            return Err("behavior.teleport_distance must not be below follow_distance".to_string());
        }

        let power_ups = &self.power_ups;
        if power_ups.expiry_sweep_interval_ms == 0 || power_ups.magnet_interval_ms == 0 {
            return Err("power-up sweep and magnet intervals must be greater than zero".to_string());
        }
        let mut total_weight: u32 = 0;
        for kind in PowerUpType::ALL {
            let kind_config = power_ups.kinds.get(kind);
            check_duration(&format!("power_ups.kinds {:?} duration", kind), kind_config.duration_secs, false)?;
            total_weight = total_weight
                .checked_add(kind_config.spawn_weight)
                .ok_or_else(|| "power-up spawn weights add up past u32::MAX".to_string())?;
        }

        let mut seen = std::collections::HashSet::new();
        for animal in &self.animal_types {
            if !seen.insert(animal.type_id.as_str()) {
                return Err(format!("duplicate animal type '{}'", animal.type_id));
            }
            if animal.preferred_tiers.iter().any(|t| !(1..=3).contains(t)) {
                return Err(format!("animal type '{}' lists a tier outside 1..=3", animal.type_id));
            }
        }
        Ok(())
    }
}
