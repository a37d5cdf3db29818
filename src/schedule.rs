/******************************************************************************
 *                                                                            *
 * Match Clock - virtual time and scheduled jobs                              *
 *                                                                            *
 * Every delayed or repeating action in a match (flood countdown, flood rise, *
 * wander/flee timers, effect expiry sweeps, magnet pulses, pickup spawns) is *
 * a ScheduledJob registered here. The session drains due jobs each tick, so  *
 * tests can advance time deterministically.                                  *
 *                                                                            *
 ******************************************************************************/

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::models::AnimalId;

// --- Time ---

/// Match-relative virtual time in microseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis as i64 * 1_000)
    }

    pub fn from_secs_f32(secs: f32) -> Self {
        Timestamp((secs as f64 * 1_000_000.0) as i64)
    }

    pub fn to_micros(self) -> i64 {
        self.0
    }

    pub fn plus(self, duration: Duration) -> Self {
        Timestamp(self.0 + duration.as_micros() as i64)
    }

    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        (self.0 - earlier.0) / 1_000
    }
}

// --- Jobs ---

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScheduleAt {
    Time(Timestamp),
    Interval(Duration),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobKind {
    FloodStart,
    FloodRise,
    AnimalWander(AnimalId),
    AnimalFlee(AnimalId),
    EffectExpirySweep,
    MagnetPulse,
    PowerUpSpawn,
}

#[derive(Clone, Debug)]
pub struct ScheduledJob {
    pub job_id: JobId,
    pub job_name: &'static str,
    pub kind: JobKind,
    pub due_at: Timestamp,
    pub interval: Option<Duration>,
}

// Repeating jobs shorter than this would spin the drain loop.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Single per-match clock all components register delayed actions against.
#[derive(Debug, Default)]
pub struct MatchClock {
    now: Timestamp,
    next_job_id: u64,
    queue: BTreeMap<(Timestamp, JobId), ScheduledJob>,
    due_by_id: HashMap<JobId, Timestamp>,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Moves virtual time forward. Never moves backwards.
    pub fn advance_to(&mut self, t: Timestamp) {
        if t > self.now {
            self.now = t;
        }
    }

    pub fn schedule(&mut self, job_name: &'static str, kind: JobKind, at: ScheduleAt) -> JobId {
        self.next_job_id += 1;
        let job_id = JobId(self.next_job_id);
        let (due_at, interval) = match at {
            ScheduleAt::Time(t) => (t.max(self.now), None),
            ScheduleAt::Interval(d) => {
                let d = d.max(MIN_INTERVAL);
                (self.now.plus(d), Some(d))
            }
        };
        log::trace!("[Clock] Scheduled {} ({:?}) as {:?} due at {:?}", job_name, kind, job_id, due_at);
        self.insert(ScheduledJob { job_id, job_name, kind, due_at, interval });
        job_id
    }

    pub fn schedule_in(&mut self, job_name: &'static str, kind: JobKind, delay: Duration) -> JobId {
        let at = self.now.plus(delay);
        self.schedule(job_name, kind, ScheduleAt::Time(at))
    }

    /// Returns true if the job was still pending.
    pub fn cancel(&mut self, job_id: JobId) -> bool {
        match self.due_by_id.remove(&job_id) {
            Some(due_at) => {
                self.queue.remove(&(due_at, job_id));
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, job_id: JobId) -> bool {
        self.due_by_id.contains_key(&job_id)
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Pops the earliest job due at or before `until`, moving the clock to its
    /// due time. Interval jobs are re-armed before being returned.
    pub fn pop_due(&mut self, until: Timestamp) -> Option<ScheduledJob> {
        let key = *self.queue.keys().next()?;
        if key.0 > until {
            return None;
        }
        let job = self.queue.remove(&key)?;
        self.due_by_id.remove(&job.job_id);
        self.advance_to(job.due_at);

        if let Some(interval) = job.interval {
            let mut rearmed = job.clone();
            rearmed.due_at = job.due_at.plus(interval);
            self.insert(rearmed);
        }
        Some(job)
    }

    /// Drops every pending job. Used on match reset.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.due_by_id.clear();
    }

    fn insert(&mut self, job: ScheduledJob) {
        self.due_by_id.insert(job.job_id, job.due_at);
        self.queue.insert((job.due_at, job.job_id), job);
    }
}
