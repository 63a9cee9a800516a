use crate::math::{normalize_angle, Point2d};
use cgmath::MetricSpace;

/// The largest steering angle the vehicle can command, in radians.
const MAX_STEER: f64 = 30.0 * std::f64::consts::PI / 180.0;

/// Targets closer than this distance in m produce no steering.
const MIN_TARGET_DIST: f64 = 0.1;

/// Geometric pursuit steering towards a look-ahead point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PursuitSteering {
    lookahead: f64,
    wheel_base: f64,
}

impl PursuitSteering {
    pub fn new(lookahead: f64, wheel_base: f64) -> Self {
        Self {
            lookahead,
            wheel_base,
        }
    }

    /// The look-ahead distance in m.
    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// Computes the steering angle which aims the vehicle at `target`.
    pub fn steer(&self, pos: Point2d, yaw: f64, target: Point2d) -> f64 {
        let dist = pos.distance(target);
        if dist < MIN_TARGET_DIST {
            return 0.0;
        }
        let alpha = normalize_angle((target.y - pos.y).atan2(target.x - pos.x) - yaw);
        let reach = f64::min(dist, self.lookahead);
        let steer = (2.0 * self.wheel_base * alpha.sin()).atan2(reach);
        steer.clamp(-MAX_STEER, MAX_STEER)
    }
}
