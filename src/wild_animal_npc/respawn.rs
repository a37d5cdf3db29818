use rand::rngs::StdRng;
use rand::Rng;

use crate::config::{AnimalTypeConfig, BehaviorConfig, SpawnConfig};
use crate::host::HostEngine;
use crate::models::{AnimalId, MapSide, MatchMode};
use crate::schedule::MatchClock;
use crate::spawn_zones::SpawnZoneIndex;
use crate::utils::Vec3;

use super::core::{schedule_wander, Animal};
use super::population::AnimalPopulation;

/// Spread of the per-animal tick phase. Larger than any throttle interval.
const TICK_PHASE_SPREAD: u32 = 64;

/// Everything spawning touches outside the population itself.
pub struct SpawnCtx<'a, H: HostEngine> {
    pub host: &'a mut H,
    pub zones: &'a mut SpawnZoneIndex,
    pub clock: &'a mut MatchClock,
    pub rng: &'a mut StdRng,
    pub spawn: &'a SpawnConfig,
    pub behavior: &'a BehaviorConfig,
}

impl AnimalPopulation {
    /// Places one animal at a zone matching `tags`/`tiers` on `side`, snapped
    /// to the ground and clamped into the spawn band. `None` when the
    /// population is at its cap or the map has no usable zones.
    pub fn spawn_one<H: HostEngine>(
        &mut self,
        ctx: &mut SpawnCtx<'_, H>,
        type_id: &str,
        tags: &[String],
        tiers: &[u8],
        side: Option<MapSide>,
    ) -> Option<AnimalId> {
        if self.len() >= ctx.spawn.population_cap {
            log::debug!("[Population] At cap ({}); {} not spawned", ctx.spawn.population_cap, type_id);
            return None;
        }
        let Some(zone) = ctx.zones.pick_zone(tags, tiers, side, ctx.rng) else {
            log::warn!("[Population] No spawn zones available for {}", type_id);
            return None;
        };

        let jitter = ctx.spawn.spawn_jitter;
        let (dx, dz) = if jitter > 0.0 {
            (ctx.rng.gen_range(-jitter..=jitter), ctx.rng.gen_range(-jitter..=jitter))
        } else {
            (0.0, 0.0)
        };
        let bounds = &ctx.spawn.map_bounds;
        let x = (zone.position.x + dx).clamp(bounds.min.x, bounds.max.x);
        let z = (zone.position.z + dz).clamp(bounds.min.z, bounds.max.z);
        let y = resolve_spawn_height(ctx.host, ctx.spawn, x, z, zone.position.y);
        let position = Vec3::new(x, y, z);

        let id = self.allocate_id();
        let now = ctx.clock.now();
        let phase = ctx.rng.gen_range(0..TICK_PHASE_SPREAD);
        let mut animal = Animal::new(id, type_id, position, zone.tier, zone.side, now, phase);

        ctx.host.spawn_animal(id, type_id, position);
        schedule_wander(&mut animal, ctx.clock, ctx.rng, ctx.behavior);
        self.insert(animal);

        log::info!(
            "[Population] Spawned {} {} at ({:.1}, {:.1}, {:.1}) tier {} {:?} [population: {}/{}]",
            type_id, id, x, y, z, zone.tier, zone.side, self.len(), ctx.spawn.population_cap
        );
        Some(id)
    }

    /// Seeds `pairs_required * 2` of every configured type. Individuals
    /// alternate across the active sides so each pair straddles the map in
    /// two-sided matches.
    pub fn spawn_initial_population<H: HostEngine>(
        &mut self,
        ctx: &mut SpawnCtx<'_, H>,
        animal_types: &[AnimalTypeConfig],
        mode: MatchMode,
    ) -> usize {
        let sides = mode.active_sides();
        let mut spawned = 0;
        for animal_type in animal_types {
            let count = animal_type.pairs_required as usize * 2;
            spawned += self.spawn_batch(ctx, animal_type, &sides, count);
        }
        log::info!(
            "[Population] Initial population seeded: {} animals across {} types ({} zones)",
            spawned,
            animal_types.len(),
            ctx.zones.len()
        );
        spawned
    }

    /// Replaces a collected pair with two fresh animals of the same type.
    pub fn respawn_after_pair_collected<H: HostEngine>(
        &mut self,
        ctx: &mut SpawnCtx<'_, H>,
        animal_type: &AnimalTypeConfig,
        mode: MatchMode,
    ) -> usize {
        if !ctx.spawn.respawn_on_pair_collected {
            return 0;
        }
        let sides = mode.active_sides();
        let spawned = self.spawn_batch(ctx, animal_type, &sides, 2);
        log::debug!("[Population] Respawned {} {} after pair collection", spawned, animal_type.type_id);
        spawned
    }

    fn spawn_batch<H: HostEngine>(
        &mut self,
        ctx: &mut SpawnCtx<'_, H>,
        animal_type: &AnimalTypeConfig,
        sides: &[MapSide],
        count: usize,
    ) -> usize {
        let mut spawned = 0;
        for i in 0..count {
            let side = if sides.is_empty() { None } else { Some(sides[i % sides.len()]) };
            if self
                .spawn_one(ctx, &animal_type.type_id, &animal_type.spawn_tags, &animal_type.preferred_tiers, side)
                .is_none()
            {
                log::warn!("[Population] Stopped spawning {} after {} of {}", animal_type.type_id, i, count);
                break;
            }
            spawned += 1;
        }
        spawned
    }
}

/// Ground height at (x, z) plus the configured offset, clamped into the
/// spawn band. A probe miss falls back to the zone's own height.
fn resolve_spawn_height<H: HostEngine>(host: &mut H, spawn: &SpawnConfig, x: f32, z: f32, zone_y: f32) -> f32 {
    let raw = match host.probe_ground(x, z, spawn.probe_start_height) {
        Some(ground) => ground + spawn.ground_offset,
        None => {
            log::warn!("[Population] Ground probe missed at ({:.1}, {:.1}); using zone height {:.1}", x, z, zone_y);
            zone_y
        }
    };
    spawn.clamp_spawn_height(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use crate::spawn_zones::SpawnZone;
    use rand::SeedableRng;

    struct Fixture {
        host: RecordingHost,
        zones: SpawnZoneIndex,
        clock: MatchClock,
        rng: StdRng,
        spawn: SpawnConfig,
        behavior: BehaviorConfig,
        population: AnimalPopulation,
    }

    impl Fixture {
        fn new(ground: Option<f32>, mode: MatchMode) -> Self {
            let spawn = SpawnConfig::default();
            let zones = vec![
                SpawnZone::new(Vec3::new(-20.0, 12.0, 0.0), 1, &["meadow"], MapSide::West),
                SpawnZone::new(Vec3::new(-10.0, 25.0, 5.0), 2, &["forest"], MapSide::West),
                SpawnZone::new(Vec3::new(20.0, 12.0, 0.0), 1, &["meadow"], MapSide::East),
                SpawnZone::new(Vec3::new(10.0, 40.0, -5.0), 3, &["mountain"], MapSide::East),
            ];
            Self {
                host: RecordingHost { ground_height: ground, ..Default::default() },
                zones: SpawnZoneIndex::new(zones, &spawn, mode).unwrap(),
                clock: MatchClock::new(),
                rng: StdRng::seed_from_u64(11),
                spawn,
                behavior: BehaviorConfig::default(),
                population: AnimalPopulation::new(),
            }
        }

        fn split(&mut self) -> (&mut AnimalPopulation, SpawnCtx<'_, RecordingHost>) {
            (
                &mut self.population,
                SpawnCtx {
                    host: &mut self.host,
                    zones: &mut self.zones,
                    clock: &mut self.clock,
                    rng: &mut self.rng,
                    spawn: &self.spawn,
                    behavior: &self.behavior,
                },
            )
        }
    }

    fn sheep() -> AnimalTypeConfig {
        AnimalTypeConfig {
            type_id: "sheep".to_string(),
            pairs_required: 2,
            spawn_tags: vec!["meadow".to_string()],
            preferred_tiers: vec![1],
        }
    }

    #[test]
    fn spawned_heights_stay_inside_band() {
        // Deep pit and sky-high ground both end up clamped.
        for ground in [Some(-30.0), Some(200.0), Some(20.0), None] {
            let mut f = Fixture::new(ground, MatchMode::BothSides);
            let (population, mut ctx) = f.split();
            population.spawn_initial_population(&mut ctx, &[sheep()], MatchMode::BothSides);
            assert_eq!(f.population.len(), 4);
            for animal in f.population.iter() {
                assert!(animal.position.y >= f.spawn.min_spawn_height, "ground {:?}", ground);
                assert!(animal.position.y <= f.spawn.spawn_ceiling(), "ground {:?}", ground);
            }
        }
    }

    #[test]
    fn probe_hit_places_animal_above_ground() {
        let mut f = Fixture::new(Some(20.0), MatchMode::BothSides);
        let (population, mut ctx) = f.split();
        let id = population.spawn_one(&mut ctx, "sheep", &[], &[], None).unwrap();
        let animal = f.population.get(id).unwrap();
        assert_eq!(animal.position.y, 20.0 + f.spawn.ground_offset);
        assert_eq!(f.host.animals.get(&id).map(|(t, _)| t.as_str()), Some("sheep"));
    }

    #[test]
    fn probe_miss_falls_back_to_zone_height() {
        let mut f = Fixture::new(None, MatchMode::SingleSide(MapSide::West));
        let (population, mut ctx) = f.split();
        let id = population.spawn_one(&mut ctx, "fox", &["forest".to_string()], &[2], None).unwrap();
        assert_eq!(f.population.get(id).unwrap().position.y, 25.0);
    }

    #[test]
    fn pairs_straddle_both_sides() {
        let mut f = Fixture::new(Some(15.0), MatchMode::BothSides);
        let (population, mut ctx) = f.split();
        population.spawn_initial_population(&mut ctx, &[sheep()], MatchMode::BothSides);
        let west = f.population.iter().filter(|a| a.side == MapSide::West).count();
        let east = f.population.iter().filter(|a| a.side == MapSide::East).count();
        assert_eq!((west, east), (2, 2));
        assert!(f.population.iter().all(|a| a.wander_job.is_some()));
    }

    #[test]
    fn cap_stops_spawning() {
        let mut f = Fixture::new(Some(15.0), MatchMode::BothSides);
        f.spawn.population_cap = 3;
        let (population, mut ctx) = f.split();
        let spawned = population.spawn_initial_population(&mut ctx, &[sheep()], MatchMode::BothSides);
        assert_eq!(spawned, 3);
        let (population, mut ctx) = f.split();
        assert_eq!(population.len(), 3);
        assert!(population.spawn_one(&mut ctx, "sheep", &[], &[], None).is_none());
    }

    #[test]
    fn respawn_respects_config_flag() {
        let mut f = Fixture::new(Some(15.0), MatchMode::BothSides);
        let (population, mut ctx) = f.split();
        assert_eq!(population.respawn_after_pair_collected(&mut ctx, &sheep(), MatchMode::BothSides), 2);

        f.spawn.respawn_on_pair_collected = false;
        let (population, mut ctx) = f.split();
        assert_eq!(population.respawn_after_pair_collected(&mut ctx, &sheep(), MatchMode::BothSides), 0);
        assert_eq!(f.population.len(), 2);
    }

    #[test]
    fn empty_map_spawns_nothing() {
        let mut f = Fixture::new(Some(15.0), MatchMode::BothSides);
        f.zones = SpawnZoneIndex::new(Vec::new(), &f.spawn, MatchMode::BothSides).unwrap();
        let (population, mut ctx) = f.split();
        assert_eq!(population.spawn_initial_population(&mut ctx, &[sheep()], MatchMode::BothSides), 0);
        assert!(f.population.is_empty());
    }
}
