use super::{tick_count, Scheduler, StopReason};
use crate::error::SimError;
use crate::simulation::Simulation;
use crate::VehicleId;
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Event timestamps are counted in microseconds.
const TICKS_PER_SEC: f64 = 1e6;

/// The interval between collision checks, in microseconds.
const COLLISION_CHECK_INTERVAL: u64 = 100_000;

/// Contacts further ahead than this in s are not predicted.
const PREDICTION_HORIZON: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Advance every active vehicle by one tick.
    Update,
    /// Scan every pair of vehicles for collisions and near misses.
    CollisionCheck,
    /// A contact between two vehicles predicted by an earlier check.
    PredictedContact(VehicleId, VehicleId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    /// The event time in microseconds.
    pub timestamp: u64,
    /// Events at the same time are processed in order of scheduling.
    seq: u64,
    pub kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed to make the BinaryHeap a min-heap
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A time-ordered queue of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: u64,
    seq: u64,
    events: BinaryHeap<Event>,
}

impl EventQueue {
    /// The time of the last event popped, in microseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Adds an event, which must not be in the past.
    pub fn schedule(&mut self, timestamp: u64, kind: EventKind) {
        debug_assert!(timestamp >= self.now, "event timestamp must be >= current time");
        self.events.push(Event {
            timestamp,
            seq: self.seq,
            kind,
        });
        self.seq += 1;
    }

    /// The time of the next event, if there is one.
    pub fn peek_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.timestamp)
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Advances the simulation through a queue of discrete events.
///
/// Vehicle updates are scheduled every `dt` and collision checks every 0.1 s.
/// Each check also predicts upcoming contacts between closing pairs and
/// schedules an event to confirm them after the first update at or past the
/// predicted time. A confirmed contact may also be found by a periodic check
/// at the same instant, in which case it is recorded twice.
#[derive(Debug, Default)]
pub struct EventDriven {
    queue: EventQueue,
    /// Pairs with a predicted contact still queued.
    predicted: HashSet<(VehicleId, VehicleId)>,
    /// The update interval in s.
    dt: f64,
    /// The number of updates in the horizon.
    ticks: usize,
}

impl EventDriven {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the queue with the periodic events over the whole horizon.
    ///
    /// Update `k` falls at `k * dt` rounded to the microsecond, so the number
    /// of updates matches the fixed-step tick count for any `dt`.
    fn prime(&mut self, sim: &Simulation) {
        let run = &sim.config().simulation;
        let start = to_ticks(sim.time());
        let limit = to_ticks(run.time_limit);
        self.dt = run.dt;
        self.ticks = tick_count(run.time_limit, run.dt);

        for k in sim.cycle()..self.ticks {
            self.queue.schedule(self.update_time(k), EventKind::Update);
        }
        for timestamp in (start..limit).step_by(COLLISION_CHECK_INTERVAL as usize) {
            self.queue.schedule(timestamp, EventKind::CollisionCheck);
        }
    }

    /// Schedules a contact event for each closing pair expected to touch
    /// within the prediction horizon.
    fn predict(&mut self, sim: &Simulation) {
        let engine = sim.collision_engine();
        let active = sim.vehicles().iter().filter(|v| v.is_active());
        for (a, b) in active.tuple_combinations() {
            let pair = (a.id(), b.id());
            if self.predicted.contains(&pair) {
                continue;
            }
            let Some(ttc) = engine.time_to_contact(a, b) else {
                continue;
            };
            if ttc >= PREDICTION_HORIZON {
                continue;
            }
            let k = self.next_update_at(to_secs(self.queue.now()) + ttc);
            if k < self.ticks {
                let timestamp = self.update_time(k);
                self.queue.schedule(timestamp, EventKind::PredictedContact(pair.0, pair.1));
                self.predicted.insert(pair);
            }
        }
    }

    /// The time of update `k` in microseconds.
    fn update_time(&self, k: usize) -> u64 {
        to_ticks(k as f64 * self.dt)
    }

    /// The index of the first update strictly after now and at or after `secs`.
    fn next_update_at(&self, secs: f64) -> usize {
        let mut k = (secs / self.dt - 1e-9).ceil().max(0.0) as usize;
        while self.update_time(k) <= self.queue.now() {
            k += 1;
        }
        k
    }
}

impl Scheduler for EventDriven {
    fn run(&mut self, sim: &mut Simulation) -> Result<StopReason, SimError> {
        self.prime(sim);
        loop {
            let next = self.queue.peek_time();
            let next_time = next.map_or(sim.time(), to_secs);
            if let Some(reason) = sim.stop_reason(next.is_none(), next_time) {
                return Ok(reason);
            }
            let Some(event) = self.queue.pop_next() else {
                return Ok(StopReason::Exhausted);
            };
            sim.set_time(to_secs(event.timestamp));

            match event.kind {
                EventKind::Update => {
                    let updated = sim.update_vehicles()?;
                    sim.record(&updated);
                    sim.update_strategies();
                    sim.end_cycle();
                }
                EventKind::CollisionCheck => {
                    sim.check_collisions();
                    sim.count_near_misses();
                    self.predict(sim);
                }
                EventKind::PredictedContact(a, b) => {
                    self.predicted.remove(&(a, b));
                    sim.confirm_contact(a, b);
                }
            }
        }
    }
}

fn to_ticks(secs: f64) -> u64 {
    (secs * TICKS_PER_SEC).round() as u64
}

fn to_secs(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SEC
}
