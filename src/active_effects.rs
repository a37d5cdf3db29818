use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::PowerUpConfig;
use crate::flood::FloodController;
use crate::host::{HostEngine, PlayerControl, WorldSnapshot};
use crate::models::{PlayerId, PowerUpType};
use crate::schedule::{JobId, JobKind, MatchClock, ScheduleAt, Timestamp};
use crate::wild_animal_npc::{AnimalPopulation, BehaviorCtx};
use crate::utils::duration_from_secs;

// --- Registry ---

/// One time-limited buff held by one player. At most one per (player, type).
#[derive(Clone, Debug, PartialEq)]
pub struct ActivePowerUp {
    pub player_id: PlayerId,
    pub power_up: PowerUpType,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub magnitude: f32, // Copied from config at apply time
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Refreshed, // Already held; only the expiry moved
}

#[derive(Debug, Default)]
pub struct PowerUpEffects {
    active: BTreeMap<(PlayerId, PowerUpType), ActivePowerUp>,
    sweep_job: Option<JobId>,
    magnet_job: Option<JobId>,
}

impl PowerUpEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the expiry sweep and magnet pulse intervals. Safe to call twice.
    pub fn schedule_processing(&mut self, clock: &mut MatchClock, config: &PowerUpConfig) {
        if self.sweep_job.is_none() {
            self.sweep_job = Some(clock.schedule(
                "power_up_expiry_sweep",
                JobKind::EffectExpirySweep,
                ScheduleAt::Interval(Duration::from_millis(config.expiry_sweep_interval_ms)),
            ));
        }
        if self.magnet_job.is_none() {
            self.magnet_job = Some(clock.schedule(
                "power_up_magnet_pulse",
                JobKind::MagnetPulse,
                ScheduleAt::Interval(Duration::from_millis(config.magnet_interval_ms)),
            ));
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn get(&self, player: PlayerId, power_up: PowerUpType) -> Option<&ActivePowerUp> {
        self.active.get(&(player, power_up))
    }

    pub fn is_active(&self, player: PlayerId, power_up: PowerUpType) -> bool {
        self.active.contains_key(&(player, power_up))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivePowerUp> {
        self.active.values()
    }

    pub fn any_active(&self, power_up: PowerUpType) -> bool {
        self.active.values().any(|e| e.power_up == power_up)
    }

    /// Inserts or refreshes the buff. A refresh resets the expiry to
    /// `now + duration`; duration and magnitude never stack.
    pub fn apply_effect<H: PlayerControl>(
        &mut self,
        player: PlayerId,
        power_up: PowerUpType,
        config: &PowerUpConfig,
        now: Timestamp,
        host: &mut H,
        flood: &mut FloodController,
    ) -> ApplyOutcome {
        let kind = config.kinds.get(power_up);
        let expires_at = now.plus(duration_from_secs(kind.duration_secs));

        let outcome = match self.active.get_mut(&(player, power_up)) {
            Some(existing) => {
                existing.expires_at = expires_at;
                log::info!("[PowerUps] {:?} refreshed for {} until {:?}", power_up, player, expires_at);
                ApplyOutcome::Refreshed
            }
            None => {
                self.active.insert(
                    (player, power_up),
                    ActivePowerUp { player_id: player, power_up, started_at: now, expires_at, magnitude: kind.magnitude },
                );
                log::info!("[PowerUps] {:?} applied to {} for {:.1}s", power_up, player, kind.duration_secs);
                ApplyOutcome::Applied
            }
        };

        match power_up {
            PowerUpType::SpeedBoots => host.set_speed_multiplier(player, kind.magnitude),
            PowerUpType::FloodFreeze => self.sync_flood_freeze(flood),
            PowerUpType::AnimalMagnet => {} // Acts on the pulse interval
        }
        outcome
    }

    /// Removes every buff with `expires_at <= now`, reverting its side
    /// effects. Returns what expired, in (player, type) order.
    pub fn sweep_expired<H: PlayerControl>(
        &mut self,
        now: Timestamp,
        host: &mut H,
        flood: &mut FloodController,
    ) -> Vec<(PlayerId, PowerUpType)> {
        let expired: Vec<(PlayerId, PowerUpType)> = self
            .active
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(key, _)| *key)
            .collect();

        for &(player, power_up) in &expired {
            self.active.remove(&(player, power_up));
            revert_side_effect(player, power_up, host);
            log::info!("[PowerUps] {:?} expired for {}", power_up, player);
        }
        if !expired.is_empty() {
            self.sync_flood_freeze(flood);
        }
        expired
    }

    /// One magnet pulse: every active magnet holder pulls nearby free animals
    /// into following, up to their remaining follow slots.
    pub fn magnet_pulse<H: HostEngine>(
        &self,
        population: &mut AnimalPopulation,
        snapshot: &WorldSnapshot,
        ctx: &mut BehaviorCtx<'_, H>,
    ) -> usize {
        let holders: Vec<(PlayerId, f32)> = self
            .active
            .values()
            .filter(|e| e.power_up == PowerUpType::AnimalMagnet)
            .map(|e| (e.player_id, e.magnitude))
            .collect();

        let mut pulled = 0;
        for (player, radius) in holders {
            let Some(position) = snapshot.player_position(player) else {
                continue;
            };
            let free_slots = ctx.config.follow_cap.saturating_sub(population.following_count(player));
            if free_slots == 0 {
                continue;
            }
            for animal_id in population.get_nearby(position, radius, free_slots) {
                if population.try_follow(animal_id, player, ctx) {
                    pulled += 1;
                }
            }
        }
        if pulled > 0 {
            log::debug!("[PowerUps] Magnet pulse pulled {} animals", pulled);
        }
        pulled
    }

    /// Drops all of one player's buffs without emitting expiry (disconnect).
    pub fn clear_player<H: PlayerControl>(&mut self, player: PlayerId, host: &mut H, flood: &mut FloodController) -> usize {
        let keys: Vec<(PlayerId, PowerUpType)> = self.active.keys().filter(|(p, _)| *p == player).copied().collect();
        for &(p, power_up) in &keys {
            self.active.remove(&(p, power_up));
            revert_side_effect(p, power_up, host);
        }
        if !keys.is_empty() {
            self.sync_flood_freeze(flood);
        }
        keys.len()
    }

    pub fn reset<H: PlayerControl>(&mut self, host: &mut H, flood: &mut FloodController, clock: &mut MatchClock) {
        let keys: Vec<(PlayerId, PowerUpType)> = self.active.keys().copied().collect();
        for (player, power_up) in keys {
            revert_side_effect(player, power_up, host);
        }
        self.active.clear();
        if let Some(job) = self.sweep_job.take() {
            clock.cancel(job);
        }
        if let Some(job) = self.magnet_job.take() {
            clock.cancel(job);
        }
        self.sync_flood_freeze(flood);
    }

    // Freeze is held while any FloodFreeze instance is live.
    fn sync_flood_freeze(&self, flood: &mut FloodController) {
        flood.set_frozen(self.any_active(PowerUpType::FloodFreeze));
    }
}

fn revert_side_effect<H: PlayerControl>(player: PlayerId, power_up: PowerUpType, host: &mut H) {
    if power_up == PowerUpType::SpeedBoots {
        host.set_speed_multiplier(player, 1.0);
    }
}
