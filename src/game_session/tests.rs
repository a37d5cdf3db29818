use super::*;
use crate::config::AnimalTypeConfig;
use crate::host::testing::RecordingHost;
use crate::models::MapSide;
use crate::wild_animal_npc::AnimalState;
use crate::utils::Vec3;

fn animal_type(type_id: &str, tags: &[&str], tiers: &[u8]) -> AnimalTypeConfig {
    AnimalTypeConfig {
        type_id: type_id.to_string(),
        pairs_required: 1,
        spawn_tags: tags.iter().map(|t| t.to_string()).collect(),
        preferred_tiers: tiers.to_vec(),
    }
}

fn test_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.rng_seed = Some(42);
    config.animal_types = vec![
        animal_type("sheep", &["meadow"], &[1]),
        animal_type("goat", &["mountain"], &[3]),
    ];
    config
}

fn test_zones() -> Vec<SpawnZone> {
    vec![
        SpawnZone::new(Vec3::new(-30.0, 12.0, -10.0), 1, &["meadow"], MapSide::West),
        SpawnZone::new(Vec3::new(-20.0, 25.0, 10.0), 2, &["forest"], MapSide::West),
        SpawnZone::new(Vec3::new(-10.0, 45.0, 0.0), 3, &["mountain"], MapSide::West),
        SpawnZone::new(Vec3::new(30.0, 12.0, -10.0), 1, &["meadow"], MapSide::East),
        SpawnZone::new(Vec3::new(20.0, 25.0, 10.0), 2, &["forest"], MapSide::East),
        SpawnZone::new(Vec3::new(10.0, 45.0, 0.0), 3, &["mountain"], MapSide::East),
    ]
}

fn started(config: GameConfig) -> (MatchSession, RecordingHost) {
    let mut session = MatchSession::new(config, test_zones()).unwrap();
    let mut host = RecordingHost::with_ground(14.0);
    session.start_match(&mut host);
    (session, host)
}

fn ids_of(session: &MatchSession, type_id: &str) -> Vec<AnimalId> {
    session.population().iter().filter(|a| a.type_id == type_id).map(|a| a.id).collect()
}

fn secs(s: f32) -> Timestamp {
    Timestamp::from_secs_f32(s)
}

#[test]
fn start_match_seeds_two_per_required_pair() {
    let (mut session, host) = started(test_config());
    assert!(session.is_started());
    assert_eq!(ids_of(&session, "sheep").len(), 2);
    assert_eq!(ids_of(&session, "goat").len(), 2);
    assert_eq!(host.animals.len(), 4);
    assert!(session.flood().is_counting_down());
    assert_eq!(session.drain_events(), vec![GameEvent::MatchStarted]);
    assert!(session.drain_events().is_empty());
}

#[test]
fn start_match_twice_is_ignored() {
    let (mut session, mut host) = started(test_config());
    session.start_match(&mut host);
    assert_eq!(session.population().len(), 4);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = test_config();
    config.flood.max_height = 0.5;
    assert!(MatchSession::new(config, test_zones()).is_err());
    assert!(MatchSession::from_json("{}", "not json").is_err());
}

#[test]
fn configs_that_would_crash_a_match_are_rejected_up_front() {
    let inverted_bounds = r#"{ "spawn": { "map_bounds": {
        "min": { "x": 64.0, "y": 0.0, "z": -64.0 },
        "max": { "x": -64.0, "y": 96.0, "z": 64.0 } } } }"#;
    assert!(MatchSession::from_json(inverted_bounds, "[]").is_err());

    let endless_countdown = r#"{ "flood": { "start_delay_secs": 1e30 } }"#;
    assert!(MatchSession::from_json(endless_countdown, "[]").is_err());

    let endless_freeze = r#"{ "power_ups": { "kinds": { "flood_freeze": { "duration_secs": 1e30 } } } }"#;
    assert!(MatchSession::from_json(endless_freeze, "[]").is_err());
}

#[test]
fn zones_with_bad_tiers_are_rejected_by_new() {
    let mut zones = test_zones();
    zones.push(SpawnZone::new(Vec3::new(0.0, 20.0, 0.0), 9, &["meadow"], MapSide::West));
    let err = MatchSession::new(test_config(), zones).err().unwrap();
    assert!(err.contains("tier"), "unexpected error: {}", err);
}

#[test]
fn flood_rises_to_twelve_after_ten_seconds() {
    let (mut session, mut host) = started(test_config());
    session.tick(&mut host, secs(20.0), &WorldSnapshot::default());

    let height = session.flood().current_height();
    assert!((height - 12.0).abs() < 1e-3, "height {}", height);
    let events = session.drain_events();
    assert!(events.contains(&GameEvent::FloodStarted));
    assert!(events.iter().any(|e| matches!(e, GameEvent::FloodHeightChanged { .. })));
}

#[test]
fn flood_peaks_once() {
    let mut config = test_config();
    config.flood.max_height = 3.0;
    config.flood.start_delay_secs = 0.0;
    let (mut session, mut host) = started(config);
    session.tick(&mut host, secs(5.0), &WorldSnapshot::default());
    session.tick(&mut host, secs(10.0), &WorldSnapshot::default());

    assert_eq!(session.flood().current_height(), 3.0);
    let peaks = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, GameEvent::FloodPeaked { .. }))
        .count();
    assert_eq!(peaks, 1);
}

#[test]
fn flood_freeze_pickup_holds_water_until_expiry() {
    let mut config = test_config();
    config.flood.start_delay_secs = 0.0;
    let (mut session, mut host) = started(config);
    let player = PlayerId(1);

    session.tick(&mut host, secs(1.0), &WorldSnapshot::default());
    session.collect_power_up(&mut host, player, PowerUpType::FloodFreeze);
    assert!(session.flood().is_frozen());
    let frozen_at = session.flood().current_height();

    session.tick(&mut host, secs(5.0), &WorldSnapshot::default());
    assert_eq!(session.flood().current_height(), frozen_at);

    session.tick(&mut host, secs(8.0), &WorldSnapshot::default());
    assert!(!session.flood().is_frozen());
    assert!(session.flood().current_height() > frozen_at);
    let events = session.drain_events();
    assert!(events.contains(&GameEvent::PowerUpExpired { player, power_up: PowerUpType::FloodFreeze }));
}

#[test]
fn walking_into_a_pickup_applies_it() {
    let mut config = test_config();
    config.power_ups.spawn_interval_ms = 1_000;
    config.power_ups.kinds.animal_magnet.spawn_weight = 0;
    config.power_ups.kinds.flood_freeze.spawn_weight = 0;
    let (mut session, mut host) = started(config);

    session.tick(&mut host, secs(1.0), &WorldSnapshot::default());
    assert_eq!(session.pickups().len(), 1);
    let pickup = session.pickups().iter().next().cloned().unwrap();
    assert_eq!(pickup.power_up, PowerUpType::SpeedBoots);
    session.drain_events();

    let player = PlayerId(7);
    let snapshot = WorldSnapshot::default().with_player(player, pickup.position);
    session.tick(&mut host, secs(1.1), &snapshot);

    assert!(session.pickups().is_empty());
    assert!(session.effects().is_active(player, PowerUpType::SpeedBoots));
    assert_eq!(host.speed_multipliers.get(&player), Some(&1.5));
    assert!(session.drain_events().contains(&GameEvent::PowerUpCollected {
        player,
        power_up: PowerUpType::SpeedBoots,
        refreshed: false,
    }));
}

#[test]
fn pickups_stay_capped_over_time() {
    let mut config = test_config();
    config.power_ups.spawn_interval_ms = 500;
    let (mut session, mut host) = started(config);
    session.tick(&mut host, secs(9.0), &WorldSnapshot::default());
    assert_eq!(session.pickups().len(), session.config().power_ups.max_active_pickups);
    assert_eq!(host.pickups.len(), session.config().power_ups.max_active_pickups);
}

#[test]
fn follow_cap_holds_through_session() {
    let (mut session, mut host) = started(test_config());
    let player = PlayerId(3);
    let ids: Vec<AnimalId> = session.population().iter().map(|a| a.id).collect();

    assert!(session.try_follow(&mut host, ids[0], player));
    assert!(session.try_follow(&mut host, ids[1], player));
    assert!(!session.try_follow(&mut host, ids[2], player));
    assert_ne!(session.population().get(ids[2]).unwrap().state, AnimalState::Following);

    assert!(session.release_animal(&mut host, ids[0]));
    assert!(session.try_follow(&mut host, ids[2], player));
    assert_eq!(session.population().following_count(player), 2);
}

#[test]
fn disconnect_releases_followers_and_buffs() {
    let (mut session, mut host) = started(test_config());
    let player = PlayerId(4);
    let first = session.population().iter().next().map(|a| a.id).unwrap();
    session.try_follow(&mut host, first, player);
    session.collect_power_up(&mut host, player, PowerUpType::SpeedBoots);

    session.player_disconnected(&mut host, player);
    assert_eq!(session.population().following_count(player), 0);
    assert_eq!(session.population().get(first).unwrap().state, AnimalState::Idle);
    assert!(session.effects().is_empty());
    assert_eq!(host.speed_multipliers.get(&player), Some(&1.0));
}

#[test]
fn two_deliveries_complete_a_pair_and_respawn() {
    let (mut session, mut host) = started(test_config());
    let sheep = ids_of(&session, "sheep");

    assert_eq!(session.deliver_to_goal(&mut host, sheep[0]), DeliveryResult::AwaitingPartner);
    assert_eq!(
        session.deliver_to_goal(&mut host, sheep[1]),
        DeliveryResult::PairCompleted { pairs_collected: 1 }
    );
    assert_eq!(session.population().pairs().get("sheep"), 1);
    assert_eq!(ids_of(&session, "sheep").len(), 2, "replacement pair spawned");
    assert!(!sheep.iter().any(|id| session.population().get(*id).is_some()));
    assert!(!session.all_pairs_collected());

    let events = session.drain_events();
    assert!(events.contains(&GameEvent::PairCollected { type_id: "sheep".to_string(), pairs_collected: 1 }));
    assert!(!events.contains(&GameEvent::AllPairsCollected));
    assert_eq!(session.deliver_to_goal(&mut host, AnimalId(9_999)), DeliveryResult::NotFound);
}

#[test]
fn all_pairs_collected_is_announced_once() {
    let (mut session, mut host) = started(test_config());
    for type_id in ["sheep", "goat"] {
        for id in ids_of(&session, type_id) {
            session.deliver_to_goal(&mut host, id);
        }
    }
    assert!(session.all_pairs_collected());

    // An extra pair after the win does not re-announce it.
    for id in ids_of(&session, "sheep") {
        session.deliver_to_goal(&mut host, id);
    }
    let announcements = session
        .drain_events()
        .into_iter()
        .filter(|e| *e == GameEvent::AllPairsCollected)
        .count();
    assert_eq!(announcements, 1);
}

#[test]
fn movement_results_for_old_requests_are_ignored() {
    let (mut session, mut host) = started(test_config());
    session.tick(&mut host, secs(9.0), &WorldSnapshot::default());

    let (id, request) = session
        .population()
        .iter()
        .find(|a| a.state == AnimalState::Wandering)
        .and_then(|a| a.pending_move.map(|r| (a.id, r)))
        .unwrap();

    session.on_movement_finished(&mut host, id, MoveRequestId(u64::MAX), MovementOutcome::Completed);
    assert_eq!(session.population().get(id).unwrap().state, AnimalState::Wandering);

    session.on_movement_finished(&mut host, id, request, MovementOutcome::Completed);
    assert_eq!(session.population().get(id).unwrap().state, AnimalState::Idle);
}

#[test]
fn results_and_timers_for_despawned_animals_are_no_ops() {
    let (mut session, mut host) = started(test_config());
    let id = ids_of(&session, "goat")[0];
    let pending_before = session.clock().pending_jobs();
    session.deliver_to_goal(&mut host, id);
    assert_eq!(session.clock().pending_jobs(), pending_before - 1, "wander timer cancelled");

    session.on_movement_finished(&mut host, id, MoveRequestId(1), MovementOutcome::Aborted);
    session.tick(&mut host, secs(9.0), &WorldSnapshot::default());
    assert!(session.population().get(id).is_none());
}

fn submersion_events(session: &mut MatchSession) -> Vec<GameEvent> {
    session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, GameEvent::PlayerSubmerged(_) | GameEvent::PlayerSurfaced(_)))
        .collect()
}

#[test]
fn submersion_is_reported_on_change_only() {
    let (mut session, mut host) = started(test_config());
    let player = PlayerId(5);
    session.tick(&mut host, secs(10.5), &WorldSnapshot::default());
    assert!(session.flood().is_started());
    session.drain_events();

    let low = WorldSnapshot::default().with_player(player, Vec3::new(0.0, 0.5, 0.0));
    session.tick(&mut host, secs(10.6), &low);
    session.tick(&mut host, secs(10.7), &low);
    let high = WorldSnapshot::default().with_player(player, Vec3::new(0.0, 20.0, 0.0));
    session.tick(&mut host, secs(10.8), &high);

    assert_eq!(
        submersion_events(&mut session),
        vec![GameEvent::PlayerSubmerged(player), GameEvent::PlayerSurfaced(player)]
    );
}

#[test]
fn no_submersion_during_the_countdown() {
    let (mut session, mut host) = started(test_config());
    let player = PlayerId(5);
    let low = WorldSnapshot::default().with_player(player, Vec3::new(0.0, 0.5, 0.0));
    session.tick(&mut host, secs(1.0), &low);
    session.tick(&mut host, secs(5.0), &low);
    assert!(!session.flood().is_started());
    assert!(submersion_events(&mut session).is_empty());

    session.tick(&mut host, secs(10.5), &low);
    assert_eq!(submersion_events(&mut session), vec![GameEvent::PlayerSubmerged(player)]);
}

#[test]
fn snapshot_positions_feed_behaviour() {
    let (mut session, mut host) = started(test_config());
    let id = ids_of(&session, "sheep")[0];
    let mut snapshot = WorldSnapshot::default();
    snapshot.animal_positions.insert(id, Vec3::new(1.0, 33.0, 2.0));
    session.tick(&mut host, secs(0.1), &snapshot);
    assert_eq!(session.population().get(id).unwrap().position, Vec3::new(1.0, 33.0, 2.0));
}

#[test]
fn reset_returns_to_pre_start_state() {
    let mut config = test_config();
    config.power_ups.spawn_interval_ms = 1_000;
    let (mut session, mut host) = started(config);
    session.tick(&mut host, secs(15.0), &WorldSnapshot::default());
    session.collect_power_up(&mut host, PlayerId(1), PowerUpType::FloodFreeze);
    let sheep = ids_of(&session, "sheep");
    for id in sheep {
        session.deliver_to_goal(&mut host, id);
    }
    assert!(!session.population().pairs().is_empty());

    session.reset_match(&mut host);

    assert!(!session.is_started());
    assert!(session.population().is_empty());
    assert!(session.population().pairs().is_empty());
    assert!(session.effects().is_empty());
    assert!(session.pickups().is_empty());
    assert!(host.animals.is_empty());
    assert!(host.pickups.is_empty());
    assert_eq!(session.flood().current_height(), session.config().flood.start_height);
    assert!(!session.flood().is_started());
    assert!(!session.flood().is_frozen());
    assert_eq!(session.clock().pending_jobs(), 0);
    assert!(session.drain_events().is_empty());

    session.start_match(&mut host);
    assert_eq!(session.population().len(), 4);
    assert!(session.flood().is_counting_down());
}
