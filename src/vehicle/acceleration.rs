/// The exponent of the free road term of the intelligent driver model.
const FREE_ROAD_EXPONENT: i32 = 4;

/// Leader distances are floored at this value in m.
const MIN_DISTANCE: f64 = 0.1;

/// The longitudinal acceleration model of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelerationModel {
    headway: f64,
    max_acc: f64,
    max_dec: f64,
    min_gap: f64,
    desired_vel: f64,
}

/// The parameters of the acceleration model.
pub struct ModelParams {
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The vehicle's maximum braking deceleration, a positive number in m/s<sup>2</sup>.
    pub max_deceleration: f64,
    /// The minimum gap to keep to the vehicle ahead in m.
    pub min_gap: f64,
    /// The speed the vehicle tries to reach on a free road in m/s.
    pub desired_velocity: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &ModelParams) -> Self {
        AccelerationModel {
            headway: params.time_headway,
            max_acc: params.max_acceleration,
            max_dec: params.max_deceleration,
            min_gap: params.min_gap,
            desired_vel: params.desired_velocity,
        }
    }

    /// The speed the vehicle tries to reach on a free road in m/s.
    pub fn desired_vel(&self) -> f64 {
        self.desired_vel
    }

    /// The minimum gap kept to the vehicle ahead in m.
    pub fn min_gap(&self) -> f64 {
        self.min_gap
    }

    /// Calculates the acceleration of a vehicle on a free road.
    pub fn free_road(&self, my_vel: f64) -> f64 {
        self.clamp(self.max_acc * self.free_term(my_vel))
    }

    /// Calculates the acceleration needed to follow the vehicle ahead.
    ///
    /// # Arguments
    /// * `distance` - The distance to the vehicle ahead in metres.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `rel_vel` - The leader's velocity relative to this vehicle along
    ///   the line of sight, positive if the leader is pulling away (m/s).
    pub fn follow_vehicle(&self, distance: f64, my_vel: f64, rel_vel: f64) -> f64 {
        let appr = -rel_vel;
        let factor = 1. / (2. * (self.max_acc * self.max_dec).sqrt());
        let ss = self.min_gap + (my_vel * self.headway) + (my_vel * appr * factor);
        let term = ss / f64::max(distance, MIN_DISTANCE);
        self.clamp(self.max_acc * (self.free_term(my_vel) - term * term))
    }

    fn free_term(&self, my_vel: f64) -> f64 {
        1. - (my_vel / self.desired_vel).powi(FREE_ROAD_EXPONENT)
    }

    fn clamp(&self, acc: f64) -> f64 {
        acc.clamp(-self.max_dec, self.max_acc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn model() -> AccelerationModel {
        AccelerationModel::new(&ModelParams {
            time_headway: 1.5,
            max_acceleration: 3.0,
            max_deceleration: 6.0,
            min_gap: 2.0,
            desired_velocity: 20.0,
        })
    }

    #[test]
    fn free_road() {
        let acc = model();
        assert_approx_eq!(acc.free_road(0.0), 3.0);
        assert_approx_eq!(acc.free_road(10.0), 3.0 * (1.0 - 0.0625));
        assert_approx_eq!(acc.free_road(20.0), 0.0);
        assert!(acc.free_road(25.0) < 0.0);
    }

    #[test]
    fn follow_vehicle() {
        let acc = model();
        // 2 + 15 + 10 * 2 / (2 * sqrt(18)) = 19.357...
        let ss: f64 = 2.0 + 15.0 + 20.0 / (2.0 * 18f64.sqrt());
        let expected = 3.0 * (1.0 - 0.0625 - (ss / 40.0).powi(2));
        assert_approx_eq!(acc.follow_vehicle(40.0, 10.0, -2.0), expected);
    }

    #[test]
    fn braking_is_limited() {
        let acc = model();
        assert_approx_eq!(acc.follow_vehicle(0.0, 15.0, -15.0), -6.0);
        assert_approx_eq!(acc.follow_vehicle(-3.0, 0.0, 0.0), -6.0);
    }

    #[test]
    fn distant_leader_barely_matters() {
        let acc = model();
        let free = acc.free_road(5.0);
        let follow = acc.follow_vehicle(1000.0, 5.0, 0.0);
        assert!(follow < free);
        assert_approx_eq!(follow, free, 0.01);
    }
}
