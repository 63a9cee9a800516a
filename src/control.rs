//! Per-vehicle control: car following, pursuit steering and lane changes.

use crate::config::ControllerConfig;
use crate::math::{heading_vector, Point2d, Vector2d};
use crate::strategy::Strategy;
use crate::track::Track;
use crate::vehicle::acceleration::{AccelerationModel, ModelParams};
use crate::vehicle::steering::PursuitSteering;
use crate::vehicle::Vehicle;
use crate::VehicleId;
use cgmath::prelude::*;
use smallvec::SmallVec;

/// Vehicles whose lane coordinates differ by no more than this share a lane.
const LANE_TOLERANCE: f64 = 0.5;

/// A slow leader less than this far ahead along the heading, in m,
/// triggers a lane change.
const OVERTAKE_RANGE: f64 = 30.0;

/// A leader slower than this fraction of own speed triggers a lane change.
const OVERTAKE_SPEED_RATIO: f64 = 0.9;

/// A candidate lane is blocked by any vehicle within this
/// longitudinal distance in m, ahead or behind.
const LANE_CLEARANCE: f64 = 20.0;

/// The time in s between lane change decisions.
const LANE_CHANGE_COOLDOWN: f64 = 2.0;

/// The maximum change in lane coordinate per update, in lane units.
const LANE_CHANGE_RATE: f64 = 0.1;

/// Lane offsets tried when overtaking, in order of preference.
const LANE_CANDIDATES: [isize; 4] = [1, 2, -1, -2];

/// The state of a vehicle as seen by others during one control phase.
#[derive(Clone, Copy, Debug)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub pos: Point2d,
    pub yaw: f64,
    pub vel: f64,
    pub lane: f64,
}

impl VehicleSnapshot {
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id(),
            pos: vehicle.position(),
            yaw: vehicle.yaw(),
            vel: vehicle.vel(),
            lane: vehicle.lane(),
        }
    }

    fn velocity(&self) -> Vector2d {
        self.direction() * self.vel
    }

    fn direction(&self) -> Vector2d {
        heading_vector(self.yaw)
    }
}

/// The output of the control law for one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Command {
    /// Acceleration in m/s^2.
    pub acc: f64,
    /// Steering angle in radians.
    pub steer: f64,
    /// A newly started lane change, with its target lane and cooldown in s.
    pub lane_change: Option<(usize, f64)>,
}

/// The vehicle ahead, as perceived by the follower.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leader {
    pub id: VehicleId,
    /// Distance between the vehicles' centres in m.
    pub distance: f64,
    /// The leader's speed relative to the follower along the line of sight,
    /// positive if the leader is pulling away, in m/s.
    pub rel_vel: f64,
    /// The leader's speed in m/s.
    pub vel: f64,
}

/// The control law of a vehicle, derived from its strategy.
///
/// A policy is an immutable value; a vehicle changing strategy
/// is given a freshly built one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPolicy {
    strategy: Strategy,
    acc: AccelerationModel,
    steering: PursuitSteering,
    sensing_radius: f64,
}

impl ControlPolicy {
    /// Builds the control policy of a vehicle.
    ///
    /// # Parameters
    /// * `config` - The shared controller limits
    /// * `strategy` - The vehicle's strategy
    /// * `desired_speed` - The vehicle's desired speed before the strategy multiplier
    pub fn new(config: &ControllerConfig, strategy: Strategy, desired_speed: f64) -> Self {
        Self {
            strategy,
            acc: AccelerationModel::new(&ModelParams {
                time_headway: config.reaction_time,
                max_acceleration: config.a_max,
                max_deceleration: config.b_max,
                min_gap: config.min_gap * strategy.gap_factor(),
                desired_velocity: desired_speed * strategy.speed_multiplier(),
            }),
            steering: PursuitSteering::new(config.lookahead_distance, config.wheelbase),
            sensing_radius: config.sensing_radius,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The minimum gap to the vehicle ahead in m.
    pub fn min_gap(&self) -> f64 {
        self.acc.min_gap()
    }

    /// The free road speed in m/s.
    pub fn desired_vel(&self) -> f64 {
        self.acc.desired_vel()
    }

    /// Computes the command for `vehicle` against a snapshot of the other vehicles.
    ///
    /// The snapshot may include the vehicle itself, which is ignored.
    pub fn compute(&self, vehicle: &Vehicle, track: &Track, others: &[VehicleSnapshot]) -> Command {
        let own = VehicleSnapshot::of(vehicle);

        let lane_change = if vehicle.lane_change_cooldown() <= 0.0 {
            self.choose_lane(&own, track, others)
                .map(|lane| (lane, LANE_CHANGE_COOLDOWN))
        } else {
            None
        };

        // Follow the leader in the lane the vehicle is moving into
        let target_lane = lane_change.map_or(vehicle.target_lane(), |(lane, _)| lane);
        let lane = approach_lane(own.lane, target_lane);
        let acc = match find_leader(&own, lane, others, self.sensing_radius) {
            Some(leader) => self.acc.follow_vehicle(leader.distance, own.vel, leader.rel_vel),
            None => self.acc.free_road(own.vel),
        };

        let lane_idx = lane.round().max(0.0) as usize;
        let target = track.target_point(vehicle.s(), self.steering.lookahead(), Some(lane_idx));
        let steer = self.steering.steer(own.pos, own.yaw, target);

        Command {
            acc,
            steer,
            lane_change,
        }
    }

    /// Picks a lane to overtake a slow leader into, if one is needed and clear.
    fn choose_lane(&self, own: &VehicleSnapshot, track: &Track, others: &[VehicleSnapshot]) -> Option<usize> {
        let leader = find_overtake_target(own, others)?;
        if leader.vel >= OVERTAKE_SPEED_RATIO * own.vel {
            return None;
        }

        let current = own.lane.round() as isize;
        let candidates = LANE_CANDIDATES
            .iter()
            .map(|offset| current + offset)
            .filter(|lane| *lane >= 0 && (*lane as usize) < track.num_lanes())
            .map(|lane| lane as usize)
            .collect::<SmallVec<[usize; 4]>>();

        candidates
            .into_iter()
            .find(|lane| is_lane_clear(own, *lane, others))
    }
}

/// The lane coordinate after one step towards `target`.
pub(crate) fn approach_lane(lane: f64, target: usize) -> f64 {
    lane + (target as f64 - lane).clamp(-LANE_CHANGE_RATE, LANE_CHANGE_RATE)
}

/// Finds the nearest vehicle ahead of `own` in `lane` within `range` metres.
pub fn find_leader(
    own: &VehicleSnapshot,
    lane: f64,
    others: &[VehicleSnapshot],
    range: f64,
) -> Option<Leader> {
    let dir = own.direction();
    others
        .iter()
        .filter(|other| other.id != own.id)
        .filter(|other| (other.lane - lane).abs() <= LANE_TOLERANCE)
        .filter_map(|other| {
            let offset = other.pos - own.pos;
            let distance = offset.magnitude();
            if offset.dot(dir) <= 0.0 || distance >= range {
                return None;
            }
            let rel_vel = if distance > 0.0 {
                (other.velocity() - own.velocity()).dot(offset / distance)
            } else {
                0.0
            };
            Some(Leader {
                id: other.id,
                distance,
                rel_vel,
                vel: other.vel,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Finds the nearest vehicle in the same lane whose offset projected onto
/// the heading lies within the overtaking range.
fn find_overtake_target<'a>(own: &VehicleSnapshot, others: &'a [VehicleSnapshot]) -> Option<&'a VehicleSnapshot> {
    let dir = own.direction();
    others
        .iter()
        .filter(|other| other.id != own.id)
        .filter(|other| (other.lane - own.lane).abs() <= LANE_TOLERANCE)
        .filter(|other| {
            let ahead = (other.pos - own.pos).dot(dir);
            ahead > 0.0 && ahead < OVERTAKE_RANGE
        })
        .min_by(|a, b| {
            let (da, db) = (a.pos.distance2(own.pos), b.pos.distance2(own.pos));
            da.total_cmp(&db)
        })
}

/// Whether no other vehicle in `lane` is within the lane change clearance.
fn is_lane_clear(own: &VehicleSnapshot, lane: usize, others: &[VehicleSnapshot]) -> bool {
    let dir = own.direction();
    !others
        .iter()
        .filter(|other| other.id != own.id)
        .filter(|other| (other.lane - lane as f64).abs() <= LANE_TOLERANCE)
        .any(|other| (other.pos - own.pos).dot(dir).abs() < LANE_CLEARANCE)
}
