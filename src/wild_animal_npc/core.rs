/******************************************************************************
 *                                                                            *
 * Core Animal Behaviour - per-animal state machine                           *
 *                                                                            *
 * Idle -> Wandering on the wander timer, Idle/Wandering -> Fleeing when the  *
 * flood closes in, any -> Following when a player claims the animal.         *
 * Following always wins over Fleeing. This module only decides when to move  *
 * and toward what; the host engine executes the movement.                    *
 *                                                                            *
 ******************************************************************************/

use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::PI;
use std::time::Duration;

use crate::config::BehaviorConfig;
use crate::host::{HostEngine, MoveOptions, MoveRequestId, MovementOutcome, PathfindOptions};
use crate::models::{AnimalId, MapSide, PlayerId};
use crate::schedule::{JobId, JobKind, MatchClock, Timestamp};
use crate::spawn_zones::SpawnZoneIndex;
use crate::utils::{planar_distance_squared, MapBounds, Vec3};

// --- Animal Types and State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimalState {
    Idle,      // Standing still until the wander timer fires
    Wandering, // Walking to a random nearby point
    Following, // Bound to a player
    Fleeing,   // Heading for high ground ahead of the flood
}

#[derive(Debug, Clone)]
pub struct Animal {
    pub id: AnimalId,
    pub type_id: String,
    pub state: AnimalState,
    pub following_player_id: Option<PlayerId>,
    pub position: Vec3,
    pub spawn_tier: u8,
    pub side: MapSide,
    pub spawned_at: Timestamp,
    pub state_change_time: Timestamp,

    // Movement bookkeeping
    pub movement_target: Option<Vec3>,
    pub pending_move: Option<MoveRequestId>, // Only completions for this request are honoured
    pub pending_move_is_pathfind: bool,
    pub pathfind_cooldown_until: Option<Timestamp>,

    // Timers
    pub wander_job: Option<JobId>,
    pub flee_job: Option<JobId>,

    // Throttling: per-tick work runs on (ticks_alive + tick_phase) % interval
    pub tick_phase: u32,
    pub ticks_alive: u32,
}

impl Animal {
    pub fn new(
        id: AnimalId,
        type_id: &str,
        position: Vec3,
        spawn_tier: u8,
        side: MapSide,
        now: Timestamp,
        tick_phase: u32,
    ) -> Self {
        Self {
            id,
            type_id: type_id.to_string(),
            state: AnimalState::Idle,
            following_player_id: None,
            position,
            spawn_tier,
            side,
            spawned_at: now,
            state_change_time: now,
            movement_target: None,
            pending_move: None,
            pending_move_is_pathfind: false,
            pathfind_cooldown_until: None,
            wander_job: None,
            flee_job: None,
            tick_phase,
            ticks_alive: 0,
        }
    }

    pub fn is_following(&self) -> bool {
        self.state == AnimalState::Following
    }

    pub fn is_following_player(&self, player: PlayerId) -> bool {
        self.is_following() && self.following_player_id == Some(player)
    }

    fn phase_tick(&self) -> u32 {
        self.ticks_alive.wrapping_add(self.tick_phase)
    }
}

/// Everything a behaviour step may touch outside the animal itself.
pub struct BehaviorCtx<'a, H: HostEngine> {
    pub host: &'a mut H,
    pub clock: &'a mut MatchClock,
    pub rng: &'a mut StdRng,
    pub config: &'a BehaviorConfig,
    pub bounds: &'a MapBounds,
    pub zones: &'a SpawnZoneIndex,
    pub flood_height: f32,
    pub next_move_request: &'a mut u64,
}

impl<'a, H: HostEngine> BehaviorCtx<'a, H> {
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn next_request_id(&mut self) -> MoveRequestId {
        *self.next_move_request += 1;
        MoveRequestId(*self.next_move_request)
    }
}

// --- State transitions ---

pub fn transition_to_state(animal: &mut Animal, new_state: AnimalState, now: Timestamp, reason: &str) {
    let old_state = animal.state;
    animal.state = new_state;
    animal.state_change_time = now;

    if new_state != AnimalState::Following {
        animal.following_player_id = None;
    }

    log::debug!("{} {} state: {:?} -> {:?} ({})", animal.type_id, animal.id, old_state, new_state, reason);
}

/// Restarts the wander timer with a fresh random delay.
pub fn schedule_wander(animal: &mut Animal, clock: &mut MatchClock, rng: &mut StdRng, config: &BehaviorConfig) {
    if let Some(job) = animal.wander_job.take() {
        clock.cancel(job);
    }
    let delay_ms = rng.gen_range(config.wander_delay_min_ms..=config.wander_delay_max_ms);
    animal.wander_job = Some(clock.schedule_in(
        "animal_wander",
        JobKind::AnimalWander(animal.id),
        Duration::from_millis(delay_ms),
    ));
}

fn schedule_flee(animal: &mut Animal, clock: &mut MatchClock, rng: &mut StdRng, config: &BehaviorConfig) {
    if animal.flee_job.is_some() {
        return;
    }
    // Staggered per animal.
    let delay_ms = rng.gen_range(config.flee_stagger_min_ms..=config.flee_stagger_max_ms);
    animal.flee_job = Some(clock.schedule_in(
        "animal_flee",
        JobKind::AnimalFlee(animal.id),
        Duration::from_millis(delay_ms),
    ));
}

pub fn cancel_timers(animal: &mut Animal, clock: &mut MatchClock) {
    if let Some(job) = animal.wander_job.take() {
        clock.cancel(job);
    }
    if let Some(job) = animal.flee_job.take() {
        clock.cancel(job);
    }
}

pub fn cancel_movement<H: HostEngine>(animal: &mut Animal, host: &mut H) {
    if animal.pending_move.take().is_some() {
        host.stop(animal.id);
    }
    animal.movement_target = None;
    animal.pending_move_is_pathfind = false;
}

/// Issues a movement request. Pathfinding is skipped while the animal is in
/// its post-abort cooldown.
fn request_movement<H: HostEngine>(
    animal: &mut Animal,
    ctx: &mut BehaviorCtx<'_, H>,
    target: Vec3,
    speed: f32,
    prefer_pathfind: bool,
) {
    let now = ctx.now();
    let in_cooldown = animal.pathfind_cooldown_until.map_or(false, |until| now < until);
    let request = ctx.next_request_id();

    if prefer_pathfind && !in_cooldown {
        ctx.host.pathfind_to(
            animal.id,
            request,
            target,
            speed,
            PathfindOptions { max_jump: ctx.config.max_jump, max_fall: ctx.config.max_fall },
        );
        animal.pending_move_is_pathfind = true;
    } else {
        ctx.host.move_to(animal.id, request, target, speed, MoveOptions { ignore_vertical_axis: true });
        animal.pending_move_is_pathfind = false;
    }
    animal.pending_move = Some(request);
    animal.movement_target = Some(target);
}

// --- Wandering ---

pub fn on_wander_timer<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>) {
    animal.wander_job = None;
    if animal.state != AnimalState::Idle {
        log::trace!("{} {} wander timer fired in {:?}; ignoring", animal.type_id, animal.id, animal.state);
        return;
    }

    let angle = ctx.rng.gen::<f32>() * 2.0 * PI;
    let distance = ctx.config.wander_radius * ctx.rng.gen_range(0.3..=1.0);
    let target = ctx.bounds.clamp(animal.position.offset(angle.cos() * distance, 0.0, angle.sin() * distance));

    let speed = ctx.config.walk_speed;
    request_movement(animal, ctx, target, speed, true);
    let now = ctx.now();
    transition_to_state(animal, AnimalState::Wandering, now, "wander timer");
}

// --- Fleeing ---

pub fn is_in_danger(animal: &Animal, flood_height: f32, config: &BehaviorConfig) -> bool {
    flood_height + config.danger_buffer > animal.position.y
}

pub fn is_safe(animal: &Animal, flood_height: f32, config: &BehaviorConfig) -> bool {
    animal.position.y >= flood_height + config.safe_buffer
}

/// Flood height broadcast. Threatened animals get a staggered flee timer
/// rather than fleeing in this very tick.
pub fn on_flood_update<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>) {
    match animal.state {
        AnimalState::Following | AnimalState::Fleeing => return,
        AnimalState::Idle | AnimalState::Wandering => {}
    }
    if animal.flee_job.is_some() {
        return;
    }
    if is_in_danger(animal, ctx.flood_height, ctx.config) {
        log::debug!(
            "{} {} threatened by flood {:.2} at y {:.2}; flee queued",
            animal.type_id, animal.id, ctx.flood_height, animal.position.y
        );
        schedule_flee(animal, ctx.clock, ctx.rng, ctx.config);
    }
}

pub fn on_flee_timer<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>) {
    animal.flee_job = None;
    match animal.state {
        AnimalState::Following => {
            log::trace!("{} {} flee timer fired while following; ignoring", animal.type_id, animal.id);
        }
        AnimalState::Fleeing => {
            if is_safe(animal, ctx.flood_height, ctx.config) {
                finish_flee(animal, ctx, "reached safety");
            } else {
                issue_flee_move(animal, ctx);
            }
        }
        AnimalState::Idle | AnimalState::Wandering => {
            if !is_in_danger(animal, ctx.flood_height, ctx.config) {
                log::trace!("{} {} no longer threatened; flee cancelled", animal.type_id, animal.id);
                return;
            }
            if let Some(job) = animal.wander_job.take() {
                ctx.clock.cancel(job);
            }
            cancel_movement(animal, ctx.host);
            let now = ctx.now();
            transition_to_state(animal, AnimalState::Fleeing, now, "flood rising");
            issue_flee_move(animal, ctx);
        }
    }
}

/// Heads for the nearest zone above the safe line, or straight up if the map
/// has nothing that high.
pub fn issue_flee_move<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>) {
    // Aim above both lines so arriving never re-triggers a flee.
    let safe_line = ctx.flood_height + ctx.config.safe_buffer.max(ctx.config.danger_buffer);
    let target = match ctx.zones.safest_zone_near(animal.position, safe_line) {
        Some(zone) => {
            let jitter = ctx.config.flee_target_jitter;
            let dx = if jitter > 0.0 { ctx.rng.gen_range(-jitter..=jitter) } else { 0.0 };
            let dz = if jitter > 0.0 { ctx.rng.gen_range(-jitter..=jitter) } else { 0.0 };
            zone.position.offset(dx, 0.0, dz)
        }
        None => animal.position.with_y(safe_line),
    };
    let target = ctx.bounds.clamp(target);

    log::debug!(
        "{} {} fleeing toward ({:.1}, {:.1}, {:.1})",
        animal.type_id, animal.id, target.x, target.y, target.z
    );
    let speed = ctx.config.run_speed;
    request_movement(animal, ctx, target, speed, true);
}

fn finish_flee<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>, reason: &str) {
    cancel_movement(animal, ctx.host);
    let now = ctx.now();
    transition_to_state(animal, AnimalState::Idle, now, reason);
    schedule_wander(animal, ctx.clock, ctx.rng, ctx.config);
}

// --- Movement completion ---

pub fn on_movement_finished<H: HostEngine>(
    animal: &mut Animal,
    request: MoveRequestId,
    outcome: MovementOutcome,
    ctx: &mut BehaviorCtx<'_, H>,
) {
    if animal.pending_move != Some(request) {
        log::trace!("{} {} ignoring stale movement result {:?}", animal.type_id, animal.id, request);
        return;
    }
    animal.pending_move = None;

    if outcome == MovementOutcome::Aborted && animal.pending_move_is_pathfind {
        handle_pathfind_abort(animal, ctx);
        return;
    }

    animal.movement_target = None;
    animal.pending_move_is_pathfind = false;
    match animal.state {
        AnimalState::Wandering => {
            let now = ctx.now();
            transition_to_state(animal, AnimalState::Idle, now, "wander finished");
            schedule_wander(animal, ctx.clock, ctx.rng, ctx.config);
        }
        AnimalState::Fleeing => {
            if is_safe(animal, ctx.flood_height, ctx.config) {
                finish_flee(animal, ctx, "reached safety");
            } else {
                // Still wet: try again after a staggered delay.
                schedule_flee(animal, ctx.clock, ctx.rng, ctx.config);
            }
        }
        AnimalState::Following | AnimalState::Idle => {}
    }
}

/// Pathfinding gave up. Fall back to a straight-line move toward the same
/// target and avoid the pathfinder for a while.
fn handle_pathfind_abort<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>) {
    let now = ctx.now();
    animal.pathfind_cooldown_until = Some(now.plus(Duration::from_millis(ctx.config.pathfind_cooldown_ms)));

    let Some(target) = animal.movement_target else {
        animal.pending_move_is_pathfind = false;
        return;
    };
    log::warn!(
        "{} {} pathfinding aborted in {:?}; falling back to direct movement",
        animal.type_id, animal.id, animal.state
    );
    let speed = match animal.state {
        AnimalState::Fleeing => ctx.config.run_speed,
        AnimalState::Following => ctx.config.follow_speed,
        AnimalState::Idle | AnimalState::Wandering => ctx.config.walk_speed,
    };
    request_movement(animal, ctx, target, speed, false);
}

// --- Following ---

/// Binds the animal to a player. Capacity is checked by the population.
pub fn begin_following<H: HostEngine>(animal: &mut Animal, player: PlayerId, ctx: &mut BehaviorCtx<'_, H>) {
    cancel_timers(animal, ctx.clock);
    cancel_movement(animal, ctx.host);
    let now = ctx.now();
    transition_to_state(animal, AnimalState::Following, now, "player claimed");
    animal.following_player_id = Some(player);
}

/// Drops the player binding and goes back to idling.
pub fn release_following<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>, reason: &str) {
    if !animal.is_following() {
        return;
    }
    cancel_movement(animal, ctx.host);
    let now = ctx.now();
    transition_to_state(animal, AnimalState::Idle, now, reason);
    schedule_wander(animal, ctx.clock, ctx.rng, ctx.config);
}

/// Keeps a follower near its player. Falls too far behind and it is
/// teleported next to them instead of pathing.
pub fn update_following<H: HostEngine>(animal: &mut Animal, player_position: Option<Vec3>, ctx: &mut BehaviorCtx<'_, H>) {
    let Some(owner_id) = animal.following_player_id else {
        return;
    };
    let Some(player_pos) = player_position else {
        log::warn!("{} {} lost its player {}; going idle", animal.type_id, animal.id, owner_id);
        release_following(animal, ctx, "followed player missing");
        return;
    };

    let distance_sq = planar_distance_squared(animal.position, player_pos);
    let teleport_sq = ctx.config.teleport_distance * ctx.config.teleport_distance;
    let follow_sq = ctx.config.follow_distance * ctx.config.follow_distance;

    if distance_sq > teleport_sq {
        let angle = ctx.rng.gen::<f32>() * 2.0 * PI;
        let offset = ctx.config.teleport_offset;
        let landing = ctx.bounds.clamp(player_pos.offset(angle.cos() * offset, 0.0, angle.sin() * offset));
        cancel_movement(animal, ctx.host);
        ctx.host.teleport(animal.id, landing);
        update_animal_position(animal, landing);
        log::debug!("{} {} fell {:.1} behind {}; teleported", animal.type_id, animal.id, distance_sq.sqrt(), owner_id);
    } else if distance_sq > follow_sq {
        let speed = ctx.config.follow_speed;
        request_movement(animal, ctx, player_pos, speed, false);
    } else if animal.pending_move.is_some() {
        cancel_movement(animal, ctx.host);
    }
}

// --- Bounds ---

pub fn update_animal_position(animal: &mut Animal, position: Vec3) {
    animal.position = position;
}

/// Snaps an escaped animal back inside the map and idles it. Followers are
/// left alone; the follow teleport already covers them.
pub fn clamp_to_world_bounds<H: HostEngine>(animal: &mut Animal, ctx: &mut BehaviorCtx<'_, H>) -> bool {
    if animal.is_following() || ctx.bounds.contains(animal.position) {
        return false;
    }
    let snapped = ctx.bounds.clamp(animal.position);
    log::warn!(
        "{} {} escaped bounds at ({:.1}, {:.1}, {:.1}); snapping back",
        animal.type_id, animal.id, animal.position.x, animal.position.y, animal.position.z
    );
    cancel_movement(animal, ctx.host);
    if let Some(job) = animal.flee_job.take() {
        ctx.clock.cancel(job);
    }
    ctx.host.teleport(animal.id, snapped);
    update_animal_position(animal, snapped);
    let now = ctx.now();
    transition_to_state(animal, AnimalState::Idle, now, "out of bounds");
    schedule_wander(animal, ctx.clock, ctx.rng, ctx.config);
    true
}

// --- Per-frame driver ---

/// Throttled per-frame work. Each kind of check only runs every N ticks,
/// offset by the animal's random phase so the herd doesn't act in lockstep.
pub fn tick_animal<H: HostEngine>(animal: &mut Animal, player_position: Option<Vec3>, ctx: &mut BehaviorCtx<'_, H>) {
    animal.ticks_alive = animal.ticks_alive.wrapping_add(1);
    let t = animal.phase_tick();

    if animal.is_following() && t % ctx.config.follow_eval_interval_ticks == 0 {
        update_following(animal, player_position, ctx);
    }

    if t % ctx.config.bounds_check_interval_ticks == 0 {
        clamp_to_world_bounds(animal, ctx);
    }

    if t % ctx.config.face_interval_ticks == 0 {
        if let Some(target) = animal.movement_target {
            ctx.host.face(animal.id, target, ctx.config.turn_rate);
        }
    }
}
