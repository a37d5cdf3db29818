/******************************************************************************
 *                                                                            *
 * Animal Population Manager                                                  *
 *                                                                            *
 * Owns the live animal set, follow-slot accounting, the nearby query used    *
 * by the magnet and by players, and pair progress. Spawning lives in         *
 * respawn.rs.                                                                *
 *                                                                            *
 ******************************************************************************/

use std::collections::BTreeMap;

use crate::host::HostEngine;
use crate::models::{AnimalId, PlayerId};
use crate::schedule::MatchClock;
use crate::utils::{planar_distance_squared, Vec3};

use super::core::{begin_following, cancel_movement, cancel_timers, release_following, Animal, BehaviorCtx};

// --- Pair Progress ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairProgress {
    pairs_collected_by_type: BTreeMap<String, u32>,
}

impl PairProgress {
    pub fn get(&self, type_id: &str) -> u32 {
        self.pairs_collected_by_type.get(type_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.pairs_collected_by_type.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs_collected_by_type.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.pairs_collected_by_type.iter()
    }

    fn record(&mut self, type_id: &str) -> u32 {
        let count = self.pairs_collected_by_type.entry(type_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn clear(&mut self) {
        self.pairs_collected_by_type.clear();
    }
}

// --- Population ---

#[derive(Debug, Default)]
pub struct AnimalPopulation {
    animals: BTreeMap<AnimalId, Animal>,
    next_animal_id: u64,
    pairs: PairProgress,
    delivered_unpaired: BTreeMap<String, u32>, // Deliveries still waiting for a partner
}

impl AnimalPopulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.animals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }

    pub fn get(&self, id: AnimalId) -> Option<&Animal> {
        self.animals.get(&id)
    }

    pub fn get_mut(&mut self, id: AnimalId) -> Option<&mut Animal> {
        self.animals.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Animal> {
        self.animals.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Animal> {
        self.animals.values_mut()
    }

    pub fn count_of_type(&self, type_id: &str) -> usize {
        self.animals.values().filter(|a| a.type_id == type_id).count()
    }

    pub(super) fn allocate_id(&mut self) -> AnimalId {
        self.next_animal_id += 1;
        AnimalId(self.next_animal_id)
    }

    pub(super) fn insert(&mut self, animal: Animal) {
        self.animals.insert(animal.id, animal);
    }

    pub fn following_count(&self, player: PlayerId) -> usize {
        self.animals.values().filter(|a| a.is_following_player(player)).count()
    }

    pub fn followers_of(&self, player: PlayerId) -> Vec<AnimalId> {
        self.animals.values().filter(|a| a.is_following_player(player)).map(|a| a.id).collect()
    }

    /// Binds `id` to `player` if the player has a free follow slot. Returns
    /// false, leaving the animal untouched, when the slots are full, the
    /// animal is gone, or it already follows someone else.
    pub fn try_follow<H: HostEngine>(&mut self, id: AnimalId, player: PlayerId, ctx: &mut BehaviorCtx<'_, H>) -> bool {
        let current = self.following_count(player);
        let Some(animal) = self.animals.get_mut(&id) else {
            log::trace!("[Population] try_follow on missing animal {}", id);
            return false;
        };
        match animal.following_player_id {
            Some(owner) if owner == player => return true,
            Some(_) => return false,
            None => {}
        }
        if current >= ctx.config.follow_cap {
            log::debug!("[Population] {} has no free follow slot ({}/{})", player, current, ctx.config.follow_cap);
            return false;
        }
        begin_following(animal, player, ctx);
        log::info!("[Population] {} {} now following {}", animal.type_id, animal.id, player);
        true
    }

    pub fn release_animal<H: HostEngine>(&mut self, id: AnimalId, ctx: &mut BehaviorCtx<'_, H>) -> bool {
        match self.animals.get_mut(&id) {
            Some(animal) if animal.is_following() => {
                release_following(animal, ctx, "released by player");
                true
            }
            _ => false,
        }
    }

    /// Forces every follower of `player` back to Idle (e.g. on disconnect).
    pub fn release_all<H: HostEngine>(&mut self, player: PlayerId, ctx: &mut BehaviorCtx<'_, H>) -> usize {
        let mut released = 0;
        for animal in self.animals.values_mut().filter(|a| a.is_following_player(player)) {
            release_following(animal, ctx, "player released all");
            released += 1;
        }
        if released > 0 {
            log::info!("[Population] Released {} animals following {}", released, player);
        }
        released
    }

    /// Up to `max_count` live, non-following animals within `radius` on the
    /// x/z plane. Cheap axis rejects run before any distance math.
    pub fn get_nearby(&self, position: Vec3, radius: f32, max_count: usize) -> Vec<AnimalId> {
        let mut found = Vec::new();
        if max_count == 0 {
            return found;
        }
        let radius_sq = radius * radius;
        for animal in self.animals.values() {
            if animal.is_following() {
                continue;
            }
            if (animal.position.x - position.x).abs() > radius {
                continue;
            }
            if (animal.position.z - position.z).abs() > radius {
                continue;
            }
            if planar_distance_squared(animal.position, position) > radius_sq {
                continue;
            }
            found.push(animal.id);
            if found.len() >= max_count {
                break;
            }
        }
        found
    }

    pub fn pairs(&self) -> &PairProgress {
        &self.pairs
    }

    /// One call = one pair.
    pub fn record_pair_collected(&mut self, type_id: &str) -> u32 {
        let count = self.pairs.record(type_id);
        log::info!("[Population] Pair of {} collected ({} so far)", type_id, count);
        count
    }

    /// Counts a goal delivery. Returns true when it completes a pair; the
    /// caller then records the pair.
    pub fn record_delivery(&mut self, type_id: &str) -> bool {
        let waiting = self.delivered_unpaired.entry(type_id.to_string()).or_insert(0);
        *waiting += 1;
        if *waiting >= 2 {
            *waiting -= 2;
            true
        } else {
            false
        }
    }

    pub fn delivered_waiting(&self, type_id: &str) -> u32 {
        self.delivered_unpaired.get(type_id).copied().unwrap_or(0)
    }

    /// Removes an animal, cancelling its timers and in-flight movement.
    pub fn despawn<H: HostEngine>(&mut self, id: AnimalId, host: &mut H, clock: &mut MatchClock) -> Option<Animal> {
        let mut animal = self.animals.remove(&id)?;
        cancel_timers(&mut animal, clock);
        cancel_movement(&mut animal, host);
        host.despawn_animal(id);
        log::debug!("[Population] Despawned {} {}", animal.type_id, id);
        Some(animal)
    }

    pub fn reset<H: HostEngine>(&mut self, host: &mut H, clock: &mut MatchClock) {
        let ids: Vec<AnimalId> = self.animals.keys().copied().collect();
        for id in ids {
            self.despawn(id, host, clock);
        }
        self.pairs.clear();
        self.delivered_unpaired.clear();
        log::info!("[Population] Reset: all animals despawned, pair progress cleared");
    }
}
