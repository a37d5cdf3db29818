/******************************************************************************
 *                                                                            *
 * Flood Height Controller                                                    *
 *                                                                            *
 * One shared water level per match. After a countdown it rises on a fixed   *
 * cadence until it reaches max height. Power-ups may freeze it; subscribers  *
 * are still notified on every rise tick while frozen.                        *
 *                                                                            *
 ******************************************************************************/

use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::FloodConfig;
use crate::host::PlayerSnapshot;
use crate::models::PlayerId;
use crate::schedule::{JobId, JobKind, MatchClock, ScheduleAt};
use crate::utils::duration_from_secs;

#[derive(Clone, Debug, PartialEq)]
pub struct FloodState {
    pub current_height: f32,
    pub max_height: f32,
    pub rise_rate: f32, // units per second
    pub started: bool,
    pub frozen: bool,
}

/// Broadcast after every rise tick, frozen or not.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FloodUpdate {
    pub current_height: f32,
    pub max_height: f32,
    pub peaked_now: bool, // True only on the tick that first reached max_height
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubmersionChange {
    Submerged(PlayerId),
    Surfaced(PlayerId),
}

#[derive(Debug)]
pub struct FloodController {
    state: FloodState,
    start_height: f32,
    start_delay: Duration,
    tick_interval: Duration,
    countdown_job: Option<JobId>,
    rise_job: Option<JobId>,
    submerged_players: BTreeSet<PlayerId>,
    peaked: bool,
}

impl FloodController {
    pub fn new(config: &FloodConfig, rise_rate: f32) -> Self {
        Self {
            state: FloodState {
                current_height: config.start_height,
                max_height: config.max_height,
                rise_rate,
                started: false,
                frozen: false,
            },
            start_height: config.start_height,
            start_delay: duration_from_secs(config.start_delay_secs),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            countdown_job: None,
            rise_job: None,
            submerged_players: BTreeSet::new(),
            peaked: false,
        }
    }

    pub fn state(&self) -> &FloodState {
        &self.state
    }

    pub fn current_height(&self) -> f32 {
        self.state.current_height
    }

    pub fn is_started(&self) -> bool {
        self.state.started
    }

    pub fn is_frozen(&self) -> bool {
        self.state.frozen
    }

    pub fn is_counting_down(&self) -> bool {
        self.countdown_job.is_some()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn is_submerged(&self, player: PlayerId) -> bool {
        self.submerged_players.contains(&player)
    }

    /// Begins the start countdown. No-op if already counting down or rising.
    pub fn start(&mut self, clock: &mut MatchClock) {
        if self.countdown_job.is_some() || self.state.started {
            log::trace!("[Flood] start() ignored - flood already active");
            return;
        }
        log::info!("[Flood] Countdown started: water begins rising in {:.1}s", self.start_delay.as_secs_f32());
        self.countdown_job = Some(clock.schedule_in("flood_countdown", JobKind::FloodStart, self.start_delay));
    }

    /// Countdown expiry. Arms the periodic rise job.
    pub fn on_countdown_elapsed(&mut self, clock: &mut MatchClock) {
        if self.countdown_job.take().is_none() {
            log::trace!("[Flood] Stale countdown job ignored");
            return;
        }
        self.state.started = true;
        self.rise_job = Some(clock.schedule(
            "flood_rise",
            JobKind::FloodRise,
            ScheduleAt::Interval(self.tick_interval),
        ));
        log::info!(
            "[Flood] Water is rising from {:.2} at {:.2}/s (max {:.2})",
            self.state.current_height, self.state.rise_rate, self.state.max_height
        );
    }

    /// One rise step. Returns the update to broadcast, or `None` while inactive.
    pub fn tick(&mut self) -> Option<FloodUpdate> {
        if !self.state.started {
            return None;
        }
        if !self.state.frozen {
            let step = self.state.rise_rate * self.tick_interval.as_secs_f32();
            self.state.current_height = (self.state.current_height + step).min(self.state.max_height);
        }
        let peaked_now = !self.peaked && self.state.current_height >= self.state.max_height;
        if peaked_now {
            self.peaked = true;
            log::info!("[Flood] Water reached max height {:.2}", self.state.max_height);
        }
        Some(FloodUpdate {
            current_height: self.state.current_height,
            max_height: self.state.max_height,
            peaked_now,
        })
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        if self.state.frozen != frozen {
            log::info!("[Flood] Flood {} at {:.2}", if frozen { "frozen" } else { "thawed" }, self.state.current_height);
        }
        self.state.frozen = frozen;
    }

    /// Cancels the countdown and rise timers. Height is kept.
    pub fn stop(&mut self, clock: &mut MatchClock) {
        if let Some(job) = self.countdown_job.take() {
            clock.cancel(job);
        }
        if let Some(job) = self.rise_job.take() {
            clock.cancel(job);
        }
        if self.state.started {
            log::info!("[Flood] Stopped at {:.2}", self.state.current_height);
        }
        self.state.started = false;
    }

    pub fn reset(&mut self, clock: &mut MatchClock) {
        self.stop(clock);
        self.state.current_height = self.start_height;
        self.state.frozen = false;
        self.submerged_players.clear();
        self.peaked = false;
        log::debug!("[Flood] Reset to start height {:.2}", self.start_height);
    }

    /// Recomputes who is below the water line from this tick's snapshot.
    /// Players missing from the snapshot are forgotten without an event.
    pub fn update_submersion(&mut self, players: &[PlayerSnapshot]) -> Vec<SubmersionChange> {
        let mut changes = Vec::new();
        self.submerged_players.retain(|id| players.iter().any(|p| p.id == *id));

        for player in players {
            let below = player.position.y < self.state.current_height;
            let was_below = self.submerged_players.contains(&player.id);
            if below && !was_below {
                self.submerged_players.insert(player.id);
                changes.push(SubmersionChange::Submerged(player.id));
            } else if !below && was_below {
                self.submerged_players.remove(&player.id);
                changes.push(SubmersionChange::Surfaced(player.id));
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Timestamp;
    use crate::utils::Vec3;

    fn config(start: f32, max: f32) -> FloodConfig {
        FloodConfig {
            start_height: start,
            max_height: max,
            start_delay_secs: 3.0,
            tick_interval_ms: 200,
            ..Default::default()
        }
    }

    fn started(start: f32, max: f32, rate: f32, clock: &mut MatchClock) -> FloodController {
        let mut flood = FloodController::new(&config(start, max), rate);
        flood.start(clock);
        let job = clock.pop_due(Timestamp::from_millis(3_000)).unwrap();
        assert_eq!(job.kind, JobKind::FloodStart);
        flood.on_countdown_elapsed(clock);
        flood
    }

    #[test]
    fn ten_seconds_of_rise_adds_rate_times_time() {
        let mut clock = MatchClock::new();
        let mut flood = started(2.0, 100.0, 1.0, &mut clock);
        for _ in 0..50 {
            flood.tick();
        }
        assert!((flood.current_height() - 12.0).abs() < 1e-3, "got {}", flood.current_height());
    }

    #[test]
    fn rise_is_monotonic_and_clamped() {
        let mut clock = MatchClock::new();
        let mut flood = started(2.0, 5.0, 4.0, &mut clock);
        let mut last = flood.current_height();
        let mut peaks = 0;
        for _ in 0..40 {
            let update = flood.tick().unwrap();
            assert!(update.current_height >= last);
            assert!(update.current_height <= 5.0);
            if update.peaked_now {
                peaks += 1;
            }
            last = update.current_height;
        }
        assert_eq!(last, 5.0);
        assert_eq!(peaks, 1);
    }

    #[test]
    fn frozen_flood_holds_height_but_still_notifies() {
        let mut clock = MatchClock::new();
        let mut flood = started(2.0, 50.0, 1.0, &mut clock);
        flood.tick();
        let held = flood.current_height();
        flood.set_frozen(true);
        for _ in 0..25 {
            let update = flood.tick().expect("frozen flood still broadcasts");
            assert_eq!(update.current_height, held);
        }
        flood.set_frozen(false);
        flood.tick();
        assert!(flood.current_height() > held);
    }

    #[test]
    fn tick_before_start_is_a_no_op() {
        let mut flood = FloodController::new(&config(2.0, 10.0), 1.0);
        assert!(flood.tick().is_none());
        assert_eq!(flood.current_height(), 2.0);
    }

    #[test]
    fn start_twice_only_arms_one_countdown() {
        let mut clock = MatchClock::new();
        let mut flood = FloodController::new(&config(2.0, 10.0), 1.0);
        flood.start(&mut clock);
        flood.start(&mut clock);
        assert_eq!(clock.pending_jobs(), 1);
    }

    #[test]
    fn reset_restores_start_height_and_cancels_timers() {
        let mut clock = MatchClock::new();
        let mut flood = started(2.0, 50.0, 1.0, &mut clock);
        for _ in 0..10 {
            flood.tick();
        }
        flood.set_frozen(true);
        flood.update_submersion(&[PlayerSnapshot { id: PlayerId(1), position: Vec3::new(0.0, 0.0, 0.0) }]);
        assert!(flood.is_submerged(PlayerId(1)));

        flood.reset(&mut clock);
        assert_eq!(flood.current_height(), 2.0);
        assert!(!flood.is_started());
        assert!(!flood.is_frozen());
        assert!(!flood.is_submerged(PlayerId(1)));
        assert_eq!(clock.pending_jobs(), 0);
        assert!(flood.tick().is_none());
    }

    #[test]
    fn stop_while_inactive_is_harmless() {
        let mut clock = MatchClock::new();
        let mut flood = FloodController::new(&config(2.0, 10.0), 1.0);
        flood.stop(&mut clock);
        flood.reset(&mut clock);
        assert_eq!(flood.current_height(), 2.0);
    }

    #[test]
    fn submersion_reports_edges_only() {
        let mut clock = MatchClock::new();
        let mut flood = started(5.0, 50.0, 1.0, &mut clock);
        let low = PlayerSnapshot { id: PlayerId(7), position: Vec3::new(0.0, 3.0, 0.0) };
        assert_eq!(flood.update_submersion(&[low]), vec![SubmersionChange::Submerged(PlayerId(7))]);
        assert!(flood.update_submersion(&[low]).is_empty());

        let high = PlayerSnapshot { id: PlayerId(7), position: Vec3::new(0.0, 9.0, 0.0) };
        assert_eq!(flood.update_submersion(&[high]), vec![SubmersionChange::Surfaced(PlayerId(7))]);
    }
}
