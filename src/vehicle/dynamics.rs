use crate::math::{heading_vector, wrap_angle, Point2d};

/// Below this speed in m/s the heading is not updated.
const MIN_TURNING_VEL: f64 = 0.01;

/// The kinematic state advanced by the bicycle model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BicycleState {
    /// Position of the vehicle's centre.
    pub pos: Point2d,
    /// Heading in radians, within `[0, 2pi)`.
    pub yaw: f64,
    /// Speed in m/s.
    pub vel: f64,
}

impl BicycleState {
    /// Advances the state by one tick of the kinematic bicycle model.
    ///
    /// # Parameters
    /// * `acc` - The commanded acceleration in m/s^2
    /// * `steer` - The steering angle in radians
    /// * `dt` - The time step in seconds
    /// * `max_vel` - The vehicle's top speed in m/s
    /// * `wheel_base` - The distance between the axles in m
    pub fn advance(self, acc: f64, steer: f64, dt: f64, max_vel: f64, wheel_base: f64) -> Self {
        let vel = (self.vel + acc * dt).clamp(0.0, max_vel);
        let pos = self.pos + heading_vector(self.yaw) * (vel * dt);
        let yaw = if vel > MIN_TURNING_VEL {
            wrap_angle(self.yaw + (vel / wheel_base) * steer.tan() * dt)
        } else {
            self.yaw
        };
        Self { pos, yaw, vel }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::FRAC_PI_2;

    fn at_rest() -> BicycleState {
        BicycleState {
            pos: Point2d::new(0.0, 0.0),
            yaw: 0.0,
            vel: 0.0,
        }
    }

    #[test]
    fn speed_is_clamped() {
        let mut state = at_rest();
        for _ in 0..100 {
            state = state.advance(50.0, 0.0, 0.1, 20.0, 2.5);
            assert!(state.vel <= 20.0);
        }
        assert_approx_eq!(state.vel, 20.0);
        for _ in 0..100 {
            state = state.advance(-50.0, 0.0, 0.1, 20.0, 2.5);
            assert!(state.vel >= 0.0);
        }
        assert_eq!(state.vel, 0.0);
    }

    #[test]
    fn moves_along_heading_with_new_speed() {
        let state = BicycleState {
            yaw: FRAC_PI_2,
            vel: 10.0,
            ..at_rest()
        };
        let next = state.advance(2.0, 0.0, 0.5, 30.0, 2.5);
        assert_approx_eq!(next.vel, 11.0);
        assert_approx_eq!(next.pos.x, 0.0);
        assert_approx_eq!(next.pos.y, 5.5);
        assert_approx_eq!(next.yaw, FRAC_PI_2);
    }

    #[test]
    fn stationary_vehicle_does_not_turn() {
        let next = at_rest().advance(0.0, 0.4, 0.1, 20.0, 2.5);
        assert_eq!(next.yaw, 0.0);
    }

    #[test]
    fn heading_wraps() {
        let state = BicycleState {
            yaw: 6.2,
            vel: 10.0,
            ..at_rest()
        };
        let next = state.advance(0.0, 0.5, 0.1, 20.0, 2.5);
        assert!(next.yaw >= 0.0 && next.yaw < 0.3);
    }
}
