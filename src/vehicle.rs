use self::dynamics::BicycleState;
use crate::control::{approach_lane, Command, ControlPolicy};
use crate::error::SimError;
use crate::math::{heading_vector, Point2d, Vector2d};
use crate::strategy::Strategy;
use crate::track::Track;
use crate::util::mean;
use crate::VehicleId;
use serde::Serialize;
use std::fmt;

pub(crate) mod acceleration;
pub(crate) mod dynamics;
pub(crate) mod steering;

/// Laps are counted when the arc-length position wraps from beyond
/// this fraction of the track length...
const LAP_FROM: f64 = 0.9;
/// ...to below this fraction of it.
const LAP_TO: f64 = 0.1;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The vehicle's current driving strategy.
    strategy: Strategy,
    /// The control law derived from the strategy.
    policy: ControlPolicy,
    /// The desired speed before the strategy multiplier, in m/s.
    desired_speed: f64,
    /// Position, heading and speed.
    state: BicycleState,
    /// The last commanded acceleration in m/s^2.
    acc: f64,
    /// The continuous lane coordinate.
    lane: f64,
    /// The lane the vehicle is steering towards.
    target_lane: usize,
    /// Time until the next lane change may be started, in s.
    lane_change_cooldown: f64,
    /// The arc-length position along the centreline, in m.
    s: f64,
    /// The number of laps completed.
    lap_count: u32,
    /// The duration of every completed lap, in s.
    lap_times: Vec<f64>,
    /// Time spent on the current lap, in s.
    lap_timer: f64,
    collision_count: u32,
    collision_severity: f64,
    /// Whether the vehicle collided since the last recorded frame.
    collided: bool,
    elimination: Option<Elimination>,
    trajectory: Vec<TrajectorySample>,
}

/// The initial attributes of a vehicle.
#[derive(Clone, Copy, Debug)]
pub struct VehicleSpawn {
    /// The world position of the vehicle's centre.
    pub position: Point2d,
    /// The initial heading in radians.
    pub yaw: f64,
    /// The initial speed in m/s, clamped to the vehicle's top speed.
    pub velocity: f64,
    /// The starting lane.
    pub lane: usize,
    pub strategy: Strategy,
    /// The desired speed before the strategy multiplier, in m/s.
    pub desired_speed: f64,
}

impl VehicleSpawn {
    /// Checks the attributes can seed a vehicle.
    pub(crate) fn validate(&self) -> Result<(), SimError> {
        let finite = [
            ("position.x", self.position.x),
            ("position.y", self.position.y),
            ("yaw", self.yaw),
            ("velocity", self.velocity),
        ];
        if let Some((field, value)) = finite.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::InvalidSpawn(field, value));
        }
        if !(self.desired_speed.is_finite() && self.desired_speed > 0.0) {
            return Err(SimError::InvalidSpawn("desired_speed", self.desired_speed));
        }
        Ok(())
    }
}

/// The state of a vehicle at one recorded instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrajectorySample {
    pub time: f64,
    pub position: Point2d,
    pub yaw: f64,
    pub vel: f64,
    pub acc: f64,
    pub s: f64,
    pub lap: u32,
    pub collided: bool,
}

/// Why and when a vehicle left the race.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Elimination {
    /// The time of elimination. Unset for a vehicle flagged by a
    /// strategy transition until the next elimination phase.
    pub time: Option<f64>,
    pub reason: EliminationReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationReason {
    /// Lost an elimination roll after a collision.
    Collision { roll: u32, threshold: u32 },
    /// Moved to the eliminated state by the strategy transition layer.
    StrategyTransition,
}

impl fmt::Display for EliminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collision { roll, threshold } => {
                write!(f, "collision (roll {} < {})", roll, threshold)
            }
            Self::StrategyTransition => f.write_str("strategy transition"),
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(id: VehicleId, spawn: &VehicleSpawn, policy: ControlPolicy, track: &Track) -> Self {
        let max_vel = spawn.desired_speed * spawn.strategy.speed_multiplier();
        let lane = track.lane_bounds().clamp(spawn.lane as f64);
        Self {
            id,
            strategy: spawn.strategy,
            policy,
            desired_speed: spawn.desired_speed,
            state: BicycleState {
                pos: spawn.position,
                yaw: spawn.yaw,
                vel: spawn.velocity.clamp(0.0, max_vel),
            },
            acc: 0.0,
            lane,
            target_lane: lane as usize,
            lane_change_cooldown: 0.0,
            s: track.project(spawn.position),
            lap_count: 0,
            lap_times: vec![],
            lap_timer: 0.0,
            collision_count: 0,
            collision_severity: 0.0,
            collided: false,
            elimination: None,
            trajectory: vec![],
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Gets the vehicle's current strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Gets the vehicle's control policy.
    pub fn policy(&self) -> &ControlPolicy {
        &self.policy
    }

    /// The desired speed before the strategy multiplier, in m/s.
    pub fn desired_speed(&self) -> f64 {
        self.desired_speed
    }

    /// The vehicle's top speed in m/s.
    pub fn max_vel(&self) -> f64 {
        self.desired_speed * self.strategy.speed_multiplier()
    }

    /// Gets the world position of the vehicle's centre.
    pub fn position(&self) -> Point2d {
        self.state.pos
    }

    /// Gets the vehicle's heading in radians.
    pub fn yaw(&self) -> f64 {
        self.state.yaw
    }

    /// Gets a unit vector along the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        heading_vector(self.state.yaw)
    }

    /// Gets the vehicle's speed in m/s.
    pub fn vel(&self) -> f64 {
        self.state.vel
    }

    /// Gets the vehicle's velocity vector.
    pub fn velocity(&self) -> Vector2d {
        self.direction() * self.state.vel
    }

    /// Gets the vehicle's last commanded acceleration in m/s^2.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    /// Gets the continuous lane coordinate.
    pub fn lane(&self) -> f64 {
        self.lane
    }

    pub fn target_lane(&self) -> usize {
        self.target_lane
    }

    /// Time until the vehicle may start another lane change, in s.
    pub fn lane_change_cooldown(&self) -> f64 {
        self.lane_change_cooldown
    }

    /// The arc-length position along the centreline in m.
    pub fn s(&self) -> f64 {
        self.s
    }

    pub fn lap_count(&self) -> u32 {
        self.lap_count
    }

    /// The duration of each completed lap in s.
    pub fn lap_times(&self) -> &[f64] {
        &self.lap_times
    }

    pub fn collision_count(&self) -> u32 {
        self.collision_count
    }

    /// The summed severity of all of the vehicle's collisions.
    pub fn collision_severity(&self) -> f64 {
        self.collision_severity
    }

    /// Whether the vehicle collided since the last recorded frame.
    pub fn just_collided(&self) -> bool {
        self.collided
    }

    /// Whether the vehicle has left the race.
    pub fn is_eliminated(&self) -> bool {
        self.elimination.is_some()
    }

    /// Whether the vehicle still takes part in the race.
    pub fn is_active(&self) -> bool {
        self.elimination.is_none()
    }

    pub fn elimination(&self) -> Option<&Elimination> {
        self.elimination.as_ref()
    }

    /// The recorded trajectory.
    pub fn trajectory(&self) -> &[TrajectorySample] {
        &self.trajectory
    }

    /// The mean of the recorded speeds, or zero if nothing has been recorded.
    pub fn mean_speed(&self) -> f64 {
        mean(self.trajectory.iter().map(|sample| sample.vel))
    }

    /// Whether every coordinate of the vehicle's state is finite.
    pub(crate) fn is_finite(&self) -> bool {
        let BicycleState { pos, yaw, vel } = self.state;
        [pos.x, pos.y, yaw, vel, self.acc, self.s]
            .iter()
            .all(|x| x.is_finite())
    }

    /// Counts down the lane change cooldown.
    pub(crate) fn tick_cooldown(&mut self, dt: f64) {
        if self.lane_change_cooldown > 0.0 {
            self.lane_change_cooldown -= dt;
        }
    }

    /// Applies a control command and integrates the vehicle's motion.
    pub(crate) fn apply(&mut self, cmd: &Command, dt: f64, wheel_base: f64) {
        if let Some((target_lane, cooldown)) = cmd.lane_change {
            self.target_lane = target_lane;
            self.lane_change_cooldown = cooldown;
        }
        self.lane = approach_lane(self.lane, self.target_lane);

        self.state = self
            .state
            .advance(cmd.acc, cmd.steer, dt, self.max_vel(), wheel_base);
        self.acc = cmd.acc;
    }

    /// Re-projects the vehicle onto the track and counts completed laps.
    pub(crate) fn update_progress(&mut self, track: &Track, dt: f64) {
        let old_s = self.s;
        self.s = track.project(self.state.pos);
        self.lap_timer += dt;
        let length = track.length();
        if old_s > LAP_FROM * length && self.s < LAP_TO * length {
            self.lap_count += 1;
            self.lap_times.push(self.lap_timer);
            self.lap_timer = 0.0;
        }
    }

    /// Appends the current state to the trajectory.
    pub(crate) fn record(&mut self, time: f64) {
        self.trajectory.push(TrajectorySample {
            time,
            position: self.state.pos,
            yaw: self.state.yaw,
            vel: self.state.vel,
            acc: self.acc,
            s: self.s,
            lap: self.lap_count,
            collided: self.collided,
        });
    }

    pub(crate) fn clear_collided(&mut self) {
        self.collided = false;
    }

    pub(crate) fn register_collision(&mut self, severity: f64) {
        self.collision_count += 1;
        self.collision_severity += severity;
        self.collided = true;
    }

    /// Removes the vehicle from the race.
    pub(crate) fn eliminate(&mut self, time: f64, reason: EliminationReason) {
        self.state.vel = 0.0;
        self.elimination = Some(Elimination {
            time: Some(time),
            reason,
        });
    }

    /// Marks the vehicle as eliminated without a time,
    /// which is filled in by [Vehicle::stamp_elimination].
    pub(crate) fn flag_eliminated(&mut self, reason: EliminationReason) {
        self.state.vel = 0.0;
        self.elimination = Some(Elimination { time: None, reason });
    }

    /// Sets the elimination time of a flagged vehicle,
    /// returning `true` if it had none.
    pub(crate) fn stamp_elimination(&mut self, time: f64) -> bool {
        match &mut self.elimination {
            Some(elim) if elim.time.is_none() => {
                elim.time = Some(time);
                true
            }
            _ => false,
        }
    }

    /// Switches to a new strategy and its control policy.
    pub(crate) fn set_strategy(&mut self, strategy: Strategy, policy: ControlPolicy) {
        self.strategy = strategy;
        self.policy = policy;
        self.state.vel = f64::min(self.state.vel, self.max_vel());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ControllerConfig, TrackConfig};
    use assert_approx_eq::assert_approx_eq;

    fn vehicle(track: &Track) -> Vehicle {
        let spawn = VehicleSpawn {
            position: track.position_at(track.length() - 5.0, Some(1)),
            yaw: track.heading_at(track.length() - 5.0),
            velocity: 20.0,
            lane: 1,
            strategy: Strategy::Balanced,
            desired_speed: 20.0,
        };
        let policy = ControlPolicy::new(&ControllerConfig::default(), Strategy::Balanced, 20.0);
        Vehicle::new(VehicleId(0), &spawn, policy, track)
    }

    #[test]
    fn counts_laps_on_wraparound() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut veh = vehicle(&track);
        assert!(veh.s() > 0.9 * track.length());

        let cmd = Command {
            acc: 0.0,
            steer: 0.0,
            lane_change: None,
        };
        for _ in 0..5 {
            veh.apply(&cmd, 0.1, 2.5);
            veh.update_progress(&track, 0.1);
        }
        assert_eq!(veh.lap_count(), 1);
        assert_eq!(veh.lap_times().len(), 1);
    }

    #[test]
    fn lane_coordinate_moves_gradually() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut veh = vehicle(&track);
        let cmd = Command {
            acc: 0.0,
            steer: 0.0,
            lane_change: Some((3, 2.0)),
        };
        veh.apply(&cmd, 0.1, 2.5);
        assert_approx_eq!(veh.lane(), 1.1);
        assert_eq!(veh.target_lane(), 3);
        assert_approx_eq!(veh.lane_change_cooldown(), 2.0);

        let hold = Command {
            lane_change: None,
            ..cmd
        };
        for _ in 0..30 {
            veh.apply(&hold, 0.1, 2.5);
        }
        assert_approx_eq!(veh.lane(), 3.0);
    }

    #[test]
    fn two_phase_elimination() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut veh = vehicle(&track);
        veh.flag_eliminated(EliminationReason::StrategyTransition);
        assert!(veh.is_eliminated());
        assert_eq!(veh.vel(), 0.0);
        assert_eq!(veh.elimination().unwrap().time, None);
        assert!(veh.stamp_elimination(4.0));
        assert!(!veh.stamp_elimination(5.0));
        assert_eq!(veh.elimination().unwrap().time, Some(4.0));
    }
}
