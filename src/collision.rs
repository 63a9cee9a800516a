//! Pairwise collision detection, near misses and elimination rolls.

use crate::config::RunConfig;
use crate::math::Point2d;
use crate::vehicle::{EliminationReason, Vehicle};
use crate::VehicleId;
use cgmath::prelude::*;
use itertools::Itertools;
use rand::Rng;
use serde::Serialize;

/// Pairs farther apart than this in m are never near misses.
const NEAR_MISS_RANGE: f64 = 10.0;

/// Pairs closer than this in m are too close for a meaningful time to collision.
const NEAR_MISS_MIN_DIST: f64 = 0.1;

/// Closing speeds below this in m/s are not predicted to make contact.
const MIN_CLOSING_VEL: f64 = 0.1;

/// A collision between two vehicles.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollisionEvent {
    /// The simulation time at detection in s.
    pub time: f64,
    pub vehicles: (VehicleId, VehicleId),
    /// The midpoint between the two vehicles.
    pub position: Point2d,
    /// The lower of the two vehicles' lap counts.
    pub lap: u32,
    /// The magnitude of the relative velocity in m/s.
    pub severity: f64,
    pub source: DetectionSource,
}

/// How a collision was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// A scan over every pair of active vehicles.
    Periodic,
    /// A contact predicted by an earlier scan and confirmed when it fell due.
    Predictive,
}

/// Detects collisions and near misses and decides eliminations.
#[derive(Clone, Copy, Debug)]
pub struct CollisionEngine {
    radius: f64,
    ttc_threshold: f64,
    /// The elimination threshold, if elimination is enabled.
    elimination: Option<u32>,
}

impl CollisionEngine {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            radius: config.collision_radius,
            ttc_threshold: config.near_miss_ttc_threshold,
            elimination: config
                .elimination
                .enabled
                .then_some(config.elimination.threshold),
        }
    }

    /// The centre distance below which two vehicles collide, in m.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Finds every colliding pair of active vehicles.
    ///
    /// Each unordered pair is reported at most once per call, but a pair which
    /// stays in contact is reported again by later calls. Both vehicles of each
    /// pair have their collision count and severity updated.
    pub fn detect(&self, vehicles: &mut [Vehicle], time: f64) -> Vec<CollisionEvent> {
        let active = active_indices(vehicles);
        let events = active
            .iter()
            .tuple_combinations()
            .filter_map(|(&a, &b)| self.contact(&vehicles[a], &vehicles[b], time, DetectionSource::Periodic))
            .collect::<Vec<_>>();
        for event in &events {
            register(vehicles, event);
        }
        events
    }

    /// Confirms a predicted contact between two vehicles, if they are
    /// both active and actually within the collision radius.
    pub fn confirm(&self, vehicles: &mut [Vehicle], a: VehicleId, b: VehicleId, time: f64) -> Option<CollisionEvent> {
        let (va, vb) = (vehicles.get(a.0)?, vehicles.get(b.0)?);
        if !va.is_active() || !vb.is_active() {
            return None;
        }
        let event = self.contact(va, vb, time, DetectionSource::Predictive)?;
        register(vehicles, &event);
        Some(event)
    }

    fn contact(&self, a: &Vehicle, b: &Vehicle, time: f64, source: DetectionSource) -> Option<CollisionEvent> {
        let distance = a.position().distance(b.position());
        if distance >= self.radius {
            return None;
        }
        Some(CollisionEvent {
            time,
            vehicles: (a.id(), b.id()),
            position: a.position().midpoint(b.position()),
            lap: u32::min(a.lap_count(), b.lap_count()),
            severity: (b.velocity() - a.velocity()).magnitude(),
            source,
        })
    }

    /// Counts the pairs of active vehicles which are closing
    /// with a time to collision below the near miss threshold.
    pub fn count_near_misses(&self, vehicles: &[Vehicle]) -> u64 {
        active_indices(vehicles)
            .iter()
            .tuple_combinations()
            .filter(|&(&a, &b)| {
                let (a, b) = (&vehicles[a], &vehicles[b]);
                let offset = b.position() - a.position();
                let dist = offset.magnitude();
                if dist >= NEAR_MISS_RANGE || dist <= NEAR_MISS_MIN_DIST {
                    return false;
                }
                let closing = (b.velocity() - a.velocity()).dot(offset / dist);
                if closing >= 0.0 {
                    return false;
                }
                let ttc = dist / closing.abs();
                ttc > 0.0 && ttc < self.ttc_threshold
            })
            .count() as u64
    }

    /// Predicts when two active vehicles will come within the collision radius,
    /// given as the time from now in s, if they are closing.
    pub fn time_to_contact(&self, a: &Vehicle, b: &Vehicle) -> Option<f64> {
        let offset = b.position() - a.position();
        let dist = offset.magnitude();
        if dist < self.radius {
            return None;
        }
        let closing = -(b.velocity() - a.velocity()).dot(offset / dist);
        (closing > MIN_CLOSING_VEL).then(|| (dist - self.radius) / closing)
    }

    /// Rolls for the elimination of every vehicle involved in `events`,
    /// returning the IDs of the vehicles eliminated.
    pub fn eliminate(
        &self,
        events: &[CollisionEvent],
        vehicles: &mut [Vehicle],
        time: f64,
        rng: &mut impl Rng,
    ) -> Vec<VehicleId> {
        let Some(threshold) = self.elimination else {
            return vec![];
        };
        let mut eliminated = vec![];
        for event in events {
            for id in [event.vehicles.0, event.vehicles.1] {
                let vehicle = &mut vehicles[id.0];
                if vehicle.is_eliminated() {
                    continue;
                }
                let roll = rng.gen_range(1..=10);
                if roll < threshold {
                    log::debug!("t={:.2}s: vehicle {} eliminated (rolled {})", time, id, roll);
                    vehicle.eliminate(time, EliminationReason::Collision { roll, threshold });
                    eliminated.push(id);
                }
            }
        }
        eliminated
    }

    /// Timestamps vehicles flagged as eliminated without a time.
    pub fn stamp_pending(&self, vehicles: &mut [Vehicle], time: f64) -> usize {
        vehicles
            .iter_mut()
            .map(|vehicle| vehicle.stamp_elimination(time))
            .filter(|stamped| *stamped)
            .count()
    }
}

fn active_indices(vehicles: &[Vehicle]) -> Vec<usize> {
    vehicles
        .iter()
        .enumerate()
        .filter(|(_, vehicle)| vehicle.is_active())
        .map(|(idx, _)| idx)
        .collect()
}

fn register(vehicles: &mut [Vehicle], event: &CollisionEvent) {
    let (a, b) = event.vehicles;
    vehicles[a.0].register_collision(event.severity);
    vehicles[b.0].register_collision(event.severity);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ControllerConfig, TrackConfig};
    use crate::control::ControlPolicy;
    use crate::strategy::Strategy;
    use crate::track::Track;
    use crate::vehicle::VehicleSpawn;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn spawn(vehicles: &mut Vec<Vehicle>, track: &Track, x: f64, yaw: f64, vel: f64) {
        let spawn = VehicleSpawn {
            position: Point2d::new(x, 0.0),
            yaw,
            velocity: vel,
            lane: 0,
            strategy: Strategy::Balanced,
            desired_speed: 30.0,
        };
        let policy = ControlPolicy::new(&ControllerConfig::default(), Strategy::Balanced, 30.0);
        let id = VehicleId(vehicles.len());
        vehicles.push(Vehicle::new(id, &spawn, policy, track));
    }

    fn engine(enabled: bool) -> CollisionEngine {
        let mut config = RunConfig::default();
        config.elimination.enabled = enabled;
        CollisionEngine::new(&config)
    }

    #[test]
    fn detects_each_pair_once_per_call() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = vec![];
        spawn(&mut vehicles, &track, 0.0, 0.0, 10.0);
        spawn(&mut vehicles, &track, 1.0, 0.0, 4.0);
        spawn(&mut vehicles, &track, 50.0, 0.0, 4.0);

        let engine = engine(false);
        let events = engine.detect(&mut vehicles, 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].vehicles, (VehicleId(0), VehicleId(1)));
        assert_approx_eq!(events[0].severity, 6.0);
        assert_approx_eq!(events[0].position.x, 0.5);

        let again = engine.detect(&mut vehicles, 1.1);
        assert_eq!(again.len(), 1);
        assert_eq!(vehicles[0].collision_count(), 2);
        assert_approx_eq!(vehicles[1].collision_severity(), 12.0);
        assert_eq!(vehicles[2].collision_count(), 0);
        assert!(vehicles[0].just_collided());
    }

    #[test]
    fn near_misses() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = vec![];
        // Closing at 6 m/s from 5 m apart: ttc 0.83 s
        spawn(&mut vehicles, &track, 0.0, 0.0, 10.0);
        spawn(&mut vehicles, &track, 5.0, 0.0, 4.0);
        // Separating
        spawn(&mut vehicles, &track, 100.0, 0.0, 4.0);
        spawn(&mut vehicles, &track, 105.0, 0.0, 10.0);
        assert_eq!(engine(false).count_near_misses(&vehicles), 1);
    }

    #[test]
    fn time_to_contact() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = vec![];
        spawn(&mut vehicles, &track, 0.0, 0.0, 10.0);
        spawn(&mut vehicles, &track, 12.0, 0.0, 5.0);
        let engine = engine(false);
        let ttc = engine.time_to_contact(&vehicles[0], &vehicles[1]).unwrap();
        assert_approx_eq!(ttc, (12.0 - engine.radius()) / 5.0);
        assert_eq!(engine.time_to_contact(&vehicles[1], &vehicles[0]).map(|t| t > 0.0), Some(true));
    }

    #[test]
    fn confirm_requires_active_contact() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = vec![];
        spawn(&mut vehicles, &track, 0.0, 0.0, 10.0);
        spawn(&mut vehicles, &track, 1.0, 0.0, 4.0);
        spawn(&mut vehicles, &track, 30.0, 0.0, 4.0);
        let engine = engine(false);
        let (a, b, far) = (VehicleId(0), VehicleId(1), VehicleId(2));

        assert_eq!(engine.confirm(&mut vehicles, a, far, 0.5), None);
        assert_eq!(engine.confirm(&mut vehicles, a, VehicleId(9), 0.5), None);

        let event = engine.confirm(&mut vehicles, a, b, 0.5).unwrap();
        assert_eq!(event.source, DetectionSource::Predictive);
        assert_eq!(event.vehicles, (a, b));
        assert_eq!(vehicles[1].collision_count(), 1);

        vehicles[1].eliminate(0.6, EliminationReason::StrategyTransition);
        assert_eq!(engine.confirm(&mut vehicles, a, b, 0.7), None);
        assert_eq!(vehicles[0].collision_count(), 1);
    }

    #[test]
    fn elimination_disabled() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = vec![];
        spawn(&mut vehicles, &track, 0.0, 0.0, 10.0);
        spawn(&mut vehicles, &track, 0.0, 0.0, 0.0);
        let engine = engine(false);
        let mut rng = Pcg64::seed_from_u64(3);
        for step in 0..100 {
            let events = engine.detect(&mut vehicles, step as f64);
            assert!(engine.eliminate(&events, &mut vehicles, step as f64, &mut rng).is_empty());
        }
        assert!(vehicles.iter().all(Vehicle::is_active));
    }

    #[test]
    fn elimination_rate_matches_threshold() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = vec![];
        for i in 0..2000 {
            spawn(&mut vehicles, &track, (i / 2) as f64 * 10.0, 0.0, 5.0);
        }
        let engine = engine(true);
        let events = engine.detect(&mut vehicles, 0.0);
        assert_eq!(events.len(), 1000);

        let mut rng = Pcg64::seed_from_u64(42);
        let eliminated = engine.eliminate(&events, &mut vehicles, 0.0, &mut rng);
        let fraction = eliminated.len() as f64 / 2000.0;
        assert_approx_eq!(fraction, 0.5, 0.05);
        for id in eliminated {
            let vehicle = &vehicles[id.0];
            assert_eq!(vehicle.vel(), 0.0);
            assert_eq!(vehicle.elimination().unwrap().time, Some(0.0));
        }
    }
}
