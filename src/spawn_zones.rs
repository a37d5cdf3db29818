/******************************************************************************
 *                                                                            *
 * Spawn Zone Index                                                           *
 *                                                                            *
 * Static per-map spawn points, filtered once at match setup to the valid     *
 * height band and the sides the match mode uses. Picks spread population by  *
 * preferring the least-used matching zone.                                   *
 *                                                                            *
 ******************************************************************************/

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::SpawnConfig;
use crate::models::{MapSide, MatchMode};
use crate::utils::{planar_distance_squared, Vec3};

fn default_side() -> MapSide {
    MapSide::West
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpawnZone {
    pub position: Vec3,
    pub tier: u8, // 1 = lowest / floods first, 3 = highest / safest
    #[serde(default)]
    pub biome_tags: BTreeSet<String>,
    #[serde(default = "default_side")]
    pub side: MapSide,
}

impl SpawnZone {
    pub fn new(position: Vec3, tier: u8, tags: &[&str], side: MapSide) -> Self {
        Self {
            position,
            tier,
            biome_tags: tags.iter().map(|t| t.to_string()).collect(),
            side,
        }
    }

    fn matches_tags(&self, tags: &[String]) -> bool {
        tags.is_empty() || tags.iter().any(|t| self.biome_tags.contains(t))
    }

    fn matches_tier(&self, tiers: &[u8]) -> bool {
        tiers.is_empty() || tiers.contains(&self.tier)
    }
}

#[derive(Debug, Clone)]
pub struct SpawnZoneIndex {
    zones: Vec<SpawnZone>,
    usage: Vec<u32>,
}

impl SpawnZoneIndex {
    /// Rejects zones with a tier outside 1..=3, then keeps the ones inside the
    /// spawn band on a side `mode` plays on.
    pub fn new(raw: Vec<SpawnZone>, spawn: &SpawnConfig, mode: MatchMode) -> Result<Self, String> {
        if let Some(bad) = raw.iter().find(|z| !(1..=3).contains(&z.tier)) {
            return Err(format!("spawn zone at {:?} has invalid tier {}", bad.position, bad.tier));
        }
        let total = raw.len();
        let floor = spawn.min_spawn_height;
        let ceiling = spawn.spawn_ceiling();

        let zones: Vec<SpawnZone> = raw
            .into_iter()
            .filter(|z| z.position.y >= floor && z.position.y <= ceiling)
            .filter(|z| mode.allows(z.side))
            .collect();

        if zones.len() < total {
            log::debug!(
                "[SpawnZones] Dropped {} of {} zones outside band [{:.1}, {:.1}] or inactive side",
                total - zones.len(), total, floor, ceiling
            );
        }
        if zones.is_empty() {
            log::warn!("[SpawnZones] No usable spawn zones for this map and mode");
        }
        let usage = vec![0; zones.len()];
        Ok(Self { zones, usage })
    }

    pub fn from_json_str(json: &str, spawn: &SpawnConfig, mode: MatchMode) -> Result<Self, String> {
        let raw: Vec<SpawnZone> = serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse spawn zone list: {}", e))?;
        Self::new(raw, spawn, mode)
    }

    pub fn zones(&self) -> &[SpawnZone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn usage_of(&self, index: usize) -> u32 {
        self.usage.get(index).copied().unwrap_or(0)
    }

    pub fn reset_usage(&mut self) {
        self.usage.iter_mut().for_each(|u| *u = 0);
    }

    /// Picks a zone matching side AND tags AND tier, relaxing to side-only and
    /// then to any zone. Among candidates the least-used wins; ties are random.
    /// `None` only when the index is empty.
    pub fn pick_zone(
        &mut self,
        tags: &[String],
        tiers: &[u8],
        side: Option<MapSide>,
        rng: &mut impl Rng,
    ) -> Option<SpawnZone> {
        pick_least_used(&self.zones, &mut self.usage, tags, tiers, side, rng)
    }

    /// Same selection as `pick_zone`, but balanced against a caller-owned
    /// usage table so the index's own counters are left alone.
    pub fn pick_zone_with_usage(
        &self,
        usage: &mut Vec<u32>,
        tags: &[String],
        tiers: &[u8],
        side: Option<MapSide>,
        rng: &mut impl Rng,
    ) -> Option<SpawnZone> {
        usage.resize(self.zones.len(), 0);
        pick_least_used(&self.zones, usage, tags, tiers, side, rng)
    }

    /// Nearest zone at or above `min_height`, else the highest zone on the map.
    pub fn safest_zone_near(&self, from: Vec3, min_height: f32) -> Option<&SpawnZone> {
        let safe = self
            .zones
            .iter()
            .filter(|z| z.position.y >= min_height)
            .min_by(|a, b| {
                planar_distance_squared(from, a.position)
                    .total_cmp(&planar_distance_squared(from, b.position))
            });
        safe.or_else(|| self.zones.iter().max_by(|a, b| a.position.y.total_cmp(&b.position.y)))
    }
}

fn indices_where(zones: &[SpawnZone], pred: impl Fn(&SpawnZone) -> bool) -> Vec<usize> {
    zones
        .iter()
        .enumerate()
        .filter(|(_, z)| pred(z))
        .map(|(i, _)| i)
        .collect()
}

fn pick_least_used(
    zones: &[SpawnZone],
    usage: &mut [u32],
    tags: &[String],
    tiers: &[u8],
    side: Option<MapSide>,
    rng: &mut impl Rng,
) -> Option<SpawnZone> {
    let side_ok = |z: &SpawnZone| side.map_or(true, |s| z.side == s);

    let mut candidates = indices_where(zones, |z| side_ok(z) && z.matches_tags(tags) && z.matches_tier(tiers));
    if candidates.is_empty() {
        candidates = indices_where(zones, |z| side_ok(z));
        if !candidates.is_empty() {
            log::debug!("[SpawnZones] No zone for tags {:?} tiers {:?}; relaxed to side {:?}", tags, tiers, side);
        }
    }
    if candidates.is_empty() {
        candidates = (0..zones.len()).collect();
        if !candidates.is_empty() {
            log::debug!("[SpawnZones] No zone on side {:?}; relaxed to any zone", side);
        }
    }

    let least_used = candidates.iter().map(|&i| usage[i]).min()?;
    let tied: Vec<usize> = candidates.into_iter().filter(|&i| usage[i] == least_used).collect();
    let chosen = *tied.choose(rng)?;
    usage[chosen] += 1;
    Some(zones[chosen].clone())
}
