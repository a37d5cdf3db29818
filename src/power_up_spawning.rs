/******************************************************************************
 *                                                                            *
 * Power-Up Pickup Spawning                                                   *
 *                                                                            *
 * Places pickups on spawn zones at a fixed interval, choosing the kind by    *
 * configured weight, and hands a pickup to the first player who walks into   *
 * it. The effect itself is applied by active_effects.                        *
 *                                                                            *
 ******************************************************************************/

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::PowerUpConfig;
use crate::host::{EntitySpawner, PlayerSnapshot};
use crate::models::{PickupId, PlayerId, PowerUpType};
use crate::schedule::{JobId, JobKind, MatchClock, ScheduleAt, Timestamp};
use crate::spawn_zones::SpawnZoneIndex;
use crate::utils::{distance_squared, Vec3};

#[derive(Clone, Debug, PartialEq)]
pub struct PowerUpPickup {
    pub id: PickupId,
    pub power_up: PowerUpType,
    pub position: Vec3,
    pub spawned_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct PowerUpSpawner {
    pickups: BTreeMap<PickupId, PowerUpPickup>,
    next_pickup_id: u64,
    spawn_job: Option<JobId>,
    zone_usage: Vec<u32>, // Pickup placements per zone, separate from animal spawns
}

impl PowerUpSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_spawning(&mut self, clock: &mut MatchClock, config: &PowerUpConfig) {
        if self.spawn_job.is_some() || config.spawn_interval_ms == 0 {
            return;
        }
        self.spawn_job = Some(clock.schedule(
            "power_up_spawn",
            JobKind::PowerUpSpawn,
            ScheduleAt::Interval(Duration::from_millis(config.spawn_interval_ms)),
        ));
    }

    pub fn len(&self) -> usize {
        self.pickups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pickups.is_empty()
    }

    pub fn get(&self, id: PickupId) -> Option<&PowerUpPickup> {
        self.pickups.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PowerUpPickup> {
        self.pickups.values()
    }

    /// Places one pickup unless the world already holds the maximum.
    pub fn spawn_pickup<H: EntitySpawner>(
        &mut self,
        host: &mut H,
        zones: &SpawnZoneIndex,
        rng: &mut StdRng,
        config: &PowerUpConfig,
        now: Timestamp,
    ) -> Option<PickupId> {
        if self.pickups.len() >= config.max_active_pickups {
            log::trace!("[PowerUps] {} pickups already out; skipping spawn", self.pickups.len());
            return None;
        }
        let Some(power_up) = choose_power_up(config, rng) else {
            log::warn!("[PowerUps] Every power-up has zero spawn weight; nothing to spawn");
            return None;
        };
        let Some(zone) = zones.pick_zone_with_usage(&mut self.zone_usage, &config.spawn_tags, &[], None, rng) else {
            log::warn!("[PowerUps] No spawn zone for {:?} pickup", power_up);
            return None;
        };

        self.next_pickup_id += 1;
        let id = PickupId(self.next_pickup_id);
        let position = zone.position;
        host.spawn_pickup(id, power_up, position);
        self.pickups.insert(id, PowerUpPickup { id, power_up, position, spawned_at: now });
        log::info!(
            "[PowerUps] Spawned {:?} {} at ({:.1}, {:.1}, {:.1})",
            power_up, id, position.x, position.y, position.z
        );
        Some(id)
    }

    /// Removes every pickup some player is standing within `radius` of. When
    /// several players qualify the closest one gets it.
    pub fn collect_nearby<H: EntitySpawner>(
        &mut self,
        host: &mut H,
        players: &[PlayerSnapshot],
        radius: f32,
    ) -> Vec<(PlayerId, PowerUpPickup)> {
        let radius_sq = radius * radius;
        let mut claims = Vec::new();
        for pickup in self.pickups.values() {
            let closest = players
                .iter()
                .map(|p| (p.id, distance_squared(p.position, pickup.position)))
                .filter(|(_, d)| *d <= radius_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((player, _)) = closest {
                claims.push((player, pickup.id));
            }
        }

        let mut collected = Vec::with_capacity(claims.len());
        for (player, id) in claims {
            if let Some(pickup) = self.pickups.remove(&id) {
                host.despawn_pickup(id);
                log::info!("[PowerUps] {} picked up {:?} {}", player, pickup.power_up, id);
                collected.push((player, pickup));
            }
        }
        collected
    }

    pub fn reset<H: EntitySpawner>(&mut self, host: &mut H, clock: &mut MatchClock) {
        for id in self.pickups.keys() {
            host.despawn_pickup(*id);
        }
        self.pickups.clear();
        self.zone_usage.clear();
        if let Some(job) = self.spawn_job.take() {
            clock.cancel(job);
        }
    }
}

/// Weighted roll over the configured kinds. `None` when all weights are zero.
pub fn choose_power_up(config: &PowerUpConfig, rng: &mut StdRng) -> Option<PowerUpType> {
    let total_weight: u64 = PowerUpType::ALL.iter().map(|k| u64::from(config.kinds.get(*k).spawn_weight)).sum();
    if total_weight == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total_weight);
    for kind in PowerUpType::ALL {
        let weight = u64::from(config.kinds.get(kind).spawn_weight);
        if roll < weight {
            return Some(kind);
        }
        roll -= weight;
    }
    None
}
