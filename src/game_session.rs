/******************************************************************************
 *                                                                            *
 * Match Session                                                              *
 *                                                                            *
 * Owns one match: config, clock, flood, spawn zones, the animal population,  *
 * power-up effects and pickups. The host drives it with `tick` once per      *
 * frame and reports movement results back through `on_movement_finished`.   *
 * Everything the match produces for the outside world is queued as a        *
 * GameEvent and drained by the host.                                         *
 *                                                                            *
 ******************************************************************************/

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::active_effects::{ApplyOutcome, PowerUpEffects};
use crate::config::GameConfig;
use crate::flood::{FloodController, SubmersionChange};
use crate::host::{HostEngine, MoveRequestId, MovementOutcome, WorldSnapshot};
use crate::models::{AnimalId, PlayerId, PowerUpType};
use crate::power_up_spawning::PowerUpSpawner;
use crate::schedule::{JobKind, MatchClock, ScheduledJob, Timestamp};
use crate::spawn_zones::{SpawnZone, SpawnZoneIndex};
use crate::wild_animal_npc::{self as animals, AnimalPopulation, BehaviorCtx, SpawnCtx};

// --- Events ---

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    MatchStarted,
    FloodStarted,
    FloodHeightChanged { height: f32, max_height: f32 },
    FloodPeaked { height: f32 },
    PlayerSubmerged(PlayerId),
    PlayerSurfaced(PlayerId),
    PairCollected { type_id: String, pairs_collected: u32 },
    AllPairsCollected,
    PowerUpCollected { player: PlayerId, power_up: PowerUpType, refreshed: bool },
    PowerUpExpired { player: PlayerId, power_up: PowerUpType },
}

/// What a goal delivery amounted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryResult {
    NotFound,
    AwaitingPartner,
    PairCompleted { pairs_collected: u32 },
}

// --- Session ---

pub struct MatchSession {
    config: GameConfig,
    clock: MatchClock,
    rng: StdRng,
    flood: FloodController,
    zones: SpawnZoneIndex,
    population: AnimalPopulation,
    effects: PowerUpEffects,
    pickups: PowerUpSpawner,
    next_move_request: u64,
    started: bool,
    all_pairs_announced: bool,
    events: Vec<GameEvent>,
}

/// Builds a behaviour context from disjoint session fields.
macro_rules! behavior_ctx {
    ($host:expr, $clock:expr, $rng:expr, $config:expr, $zones:expr, $flood:expr, $next:expr) => {
        BehaviorCtx {
            host: &mut *$host,
            clock: &mut *$clock,
            rng: &mut *$rng,
            config: &$config.behavior,
            bounds: &$config.spawn.map_bounds,
            zones: &*$zones,
            flood_height: $flood.current_height(),
            next_move_request: &mut *$next,
        }
    };
}

impl MatchSession {
    /// Validates `config` and indexes the map's spawn zones for its mode.
    pub fn new(config: GameConfig, raw_zones: Vec<SpawnZone>) -> Result<Self, String> {
        config.validate()?;
        let zones = SpawnZoneIndex::new(raw_zones, &config.spawn, config.match_mode)?;
        Ok(Self::with_zone_index(config, zones))
    }

    pub fn from_json(config_json: &str, zones_json: &str) -> Result<Self, String> {
        let config = GameConfig::from_json_str(config_json)?;
        let zones = SpawnZoneIndex::from_json_str(zones_json, &config.spawn, config.match_mode)?;
        Ok(Self::with_zone_index(config, zones))
    }

    fn with_zone_index(config: GameConfig, zones: SpawnZoneIndex) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let flood = FloodController::new(&config.flood, config.rise_rate());
        log::info!(
            "[Session] Match created: {:?} {:?}, {} zones, {} animal types",
            config.difficulty,
            config.match_mode,
            zones.len(),
            config.animal_types.len()
        );
        Self {
            config,
            clock: MatchClock::new(),
            rng,
            flood,
            zones,
            population: AnimalPopulation::new(),
            effects: PowerUpEffects::new(),
            pickups: PowerUpSpawner::new(),
            next_move_request: 0,
            started: false,
            all_pairs_announced: false,
            events: Vec::new(),
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn clock(&self) -> &MatchClock {
        &self.clock
    }

    pub fn flood(&self) -> &FloodController {
        &self.flood
    }

    pub fn zones(&self) -> &SpawnZoneIndex {
        &self.zones
    }

    pub fn population(&self) -> &AnimalPopulation {
        &self.population
    }

    pub fn effects(&self) -> &PowerUpEffects {
        &self.effects
    }

    pub fn pickups(&self) -> &PowerUpSpawner {
        &self.pickups
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Lifecycle ---

    /// Seeds the population and starts the flood countdown and the power-up
    /// timers. No-op while a match is already running.
    pub fn start_match<H: HostEngine>(&mut self, host: &mut H) {
        if self.started {
            log::warn!("[Session] start_match called on a running match; ignoring");
            return;
        }
        let Self { config, clock, rng, zones, population, flood, effects, pickups, .. } = self;

        let mut spawn_ctx = SpawnCtx {
            host: &mut *host,
            zones: &mut *zones,
            clock: &mut *clock,
            rng: &mut *rng,
            spawn: &config.spawn,
            behavior: &config.behavior,
        };
        let spawned = population.spawn_initial_population(&mut spawn_ctx, &config.animal_types, config.match_mode);

        flood.start(clock);
        effects.schedule_processing(clock, &config.power_ups);
        pickups.schedule_spawning(clock, &config.power_ups);

        self.started = true;
        self.events.push(GameEvent::MatchStarted);
        log::info!("[Session] Match started with {} animals", spawned);
    }

    /// One frame. Applies the snapshot, runs every job due by `now`, then the
    /// per-animal throttled work, submersion tracking and pickup collection.
    pub fn tick<H: HostEngine>(&mut self, host: &mut H, now: Timestamp, snapshot: &WorldSnapshot) {
        for animal in self.population.iter_mut() {
            if let Some(position) = snapshot.animal_positions.get(&animal.id) {
                animals::update_animal_position(animal, *position);
            }
        }

        while let Some(job) = self.clock.pop_due(now) {
            self.run_job(host, job, snapshot);
        }
        self.clock.advance_to(now);

        {
            let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
            let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
            for animal in population.iter_mut() {
                let player_position = animal.following_player_id.and_then(|p| snapshot.player_position(p));
                animals::tick_animal(animal, player_position, &mut ctx);
            }
        }

        // No water to be under until the countdown ends.
        if self.flood.is_started() {
            for change in self.flood.update_submersion(&snapshot.players) {
                self.events.push(match change {
                    SubmersionChange::Submerged(player) => GameEvent::PlayerSubmerged(player),
                    SubmersionChange::Surfaced(player) => GameEvent::PlayerSurfaced(player),
                });
            }
        }

        if !self.pickups.is_empty() {
            let collected = self.pickups.collect_nearby(host, &snapshot.players, self.config.power_ups.pickup_radius);
            for (player, pickup) in collected {
                self.collect_power_up(host, player, pickup.power_up);
            }
        }
    }

    fn run_job<H: HostEngine>(&mut self, host: &mut H, job: ScheduledJob, snapshot: &WorldSnapshot) {
        log::trace!("[Session] Running {} ({:?}) at {:?}", job.job_name, job.kind, job.due_at);
        match job.kind {
            JobKind::FloodStart => {
                let was_started = self.flood.is_started();
                self.flood.on_countdown_elapsed(&mut self.clock);
                if !was_started && self.flood.is_started() {
                    self.events.push(GameEvent::FloodStarted);
                }
            }
            JobKind::FloodRise => self.on_flood_rise(host),
            JobKind::AnimalWander(id) => {
                let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
                match population.get_mut(id) {
                    Some(animal) if animal.wander_job == Some(job.job_id) => {
                        let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
                        animals::on_wander_timer(animal, &mut ctx);
                    }
                    _ => log::trace!("[Session] Stale wander timer for {}", id),
                }
            }
            JobKind::AnimalFlee(id) => {
                let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
                match population.get_mut(id) {
                    Some(animal) if animal.flee_job == Some(job.job_id) => {
                        let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
                        animals::on_flee_timer(animal, &mut ctx);
                    }
                    _ => log::trace!("[Session] Stale flee timer for {}", id),
                }
            }
            JobKind::EffectExpirySweep => {
                let now = self.clock.now();
                for (player, power_up) in self.effects.sweep_expired(now, host, &mut self.flood) {
                    self.events.push(GameEvent::PowerUpExpired { player, power_up });
                }
            }
            JobKind::MagnetPulse => {
                let Self { config, clock, rng, zones, population, flood, effects, next_move_request, .. } = self;
                let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
                effects.magnet_pulse(population, snapshot, &mut ctx);
            }
            JobKind::PowerUpSpawn => {
                let now = self.clock.now();
                self.pickups.spawn_pickup(host, &self.zones, &mut self.rng, &self.config.power_ups, now);
            }
        }
    }

    fn on_flood_rise<H: HostEngine>(&mut self, host: &mut H) {
        let before = self.flood.current_height();
        let Some(update) = self.flood.tick() else {
            return;
        };
        if update.current_height != before {
            self.events.push(GameEvent::FloodHeightChanged {
                height: update.current_height,
                max_height: update.max_height,
            });
        }
        if update.peaked_now {
            self.events.push(GameEvent::FloodPeaked { height: update.current_height });
        }

        let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
        let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
        for animal in population.iter_mut() {
            animals::on_flood_update(animal, &mut ctx);
        }
    }

    // --- Host callbacks and player actions ---

    /// Completion or abort of a move previously requested for `animal`.
    pub fn on_movement_finished<H: HostEngine>(
        &mut self,
        host: &mut H,
        animal_id: AnimalId,
        request: MoveRequestId,
        outcome: MovementOutcome,
    ) {
        let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
        let Some(animal) = population.get_mut(animal_id) else {
            log::trace!("[Session] Movement result for despawned {} ignored", animal_id);
            return;
        };
        let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
        animals::on_movement_finished(animal, request, outcome, &mut ctx);
    }

    pub fn try_follow<H: HostEngine>(&mut self, host: &mut H, animal: AnimalId, player: PlayerId) -> bool {
        let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
        let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
        population.try_follow(animal, player, &mut ctx)
    }

    pub fn release_animal<H: HostEngine>(&mut self, host: &mut H, animal: AnimalId) -> bool {
        let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
        let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
        population.release_animal(animal, &mut ctx)
    }

    /// Frees the player's followers and drops their buffs.
    pub fn player_disconnected<H: HostEngine>(&mut self, host: &mut H, player: PlayerId) {
        let released = {
            let Self { config, clock, rng, zones, population, flood, next_move_request, .. } = self;
            let mut ctx = behavior_ctx!(host, clock, rng, config, zones, flood, next_move_request);
            population.release_all(player, &mut ctx)
        };
        let cleared = self.effects.clear_player(player, host, &mut self.flood);
        log::info!("[Session] {} disconnected: {} animals released, {} effects cleared", player, released, cleared);
    }

    /// Applies a power-up to `player` as if they had walked into a pickup.
    pub fn collect_power_up<H: HostEngine>(&mut self, host: &mut H, player: PlayerId, power_up: PowerUpType) {
        let now = self.clock.now();
        let outcome = self.effects.apply_effect(player, power_up, &self.config.power_ups, now, host, &mut self.flood);
        self.events.push(GameEvent::PowerUpCollected {
            player,
            power_up,
            refreshed: outcome == ApplyOutcome::Refreshed,
        });
    }

    /// An animal reached the goal platform. Two deliveries of one type make
    /// a pair; a completed pair may bring two replacements into the world.
    pub fn deliver_to_goal<H: HostEngine>(&mut self, host: &mut H, animal: AnimalId) -> DeliveryResult {
        let Some(delivered) = self.population.despawn(animal, host, &mut self.clock) else {
            log::warn!("[Session] Delivery of unknown animal {} ignored", animal);
            return DeliveryResult::NotFound;
        };
        if !self.population.record_delivery(&delivered.type_id) {
            log::debug!("[Session] {} {} delivered; waiting for its partner", delivered.type_id, animal);
            return DeliveryResult::AwaitingPartner;
        }

        let pairs_collected = self.population.record_pair_collected(&delivered.type_id);
        self.events.push(GameEvent::PairCollected { type_id: delivered.type_id.clone(), pairs_collected });

        if let Some(animal_type) = self.config.animal_type(&delivered.type_id).cloned() {
            let Self { config, clock, rng, zones, population, .. } = self;
            let mut spawn_ctx = SpawnCtx {
                host: &mut *host,
                zones: &mut *zones,
                clock: &mut *clock,
                rng: &mut *rng,
                spawn: &config.spawn,
                behavior: &config.behavior,
            };
            population.respawn_after_pair_collected(&mut spawn_ctx, &animal_type, config.match_mode);
        }

        if !self.all_pairs_announced && self.all_pairs_collected() {
            self.all_pairs_announced = true;
            self.events.push(GameEvent::AllPairsCollected);
            log::info!("[Session] Every required pair collected");
        }
        DeliveryResult::PairCompleted { pairs_collected }
    }

    pub fn all_pairs_collected(&self) -> bool {
        !self.config.animal_types.is_empty()
            && self
                .config
                .animal_types
                .iter()
                .all(|t| self.population.pairs().get(&t.type_id) >= t.pairs_required)
    }

    /// Tears the match down to its pre-start state. Time keeps moving forward
    /// and movement request ids keep counting so nothing from the old match
    /// can be mistaken for a new one.
    pub fn reset_match<H: HostEngine>(&mut self, host: &mut H) {
        self.population.reset(host, &mut self.clock);
        self.effects.reset(host, &mut self.flood, &mut self.clock);
        self.pickups.reset(host, &mut self.clock);
        self.flood.reset(&mut self.clock);
        self.zones.reset_usage();
        self.clock.clear();
        self.started = false;
        self.all_pairs_announced = false;
        self.events.clear();
        log::info!("[Session] Match reset");
    }
}

#[cfg(test)]
mod tests;
