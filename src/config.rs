//! Run configuration.

use crate::error::ConfigError;
use crate::strategy::PerStrategy;
use serde::{Deserialize, Serialize};

/// The complete configuration of a simulation run.
///
/// Every field has a default, so a JSON document only needs
/// to name the values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The number of vehicles on the grid.
    pub num_vehicles: usize,
    /// How many vehicles start with each strategy; must sum to `num_vehicles`.
    pub strategy_distribution: PerStrategy<usize>,
    /// A global factor applied to every vehicle's desired speed.
    pub speed_multiplier: f64,
    /// Seed of the random source driving spawning, elimination and transitions.
    pub seed: u64,
    pub controller: ControllerConfig,
    pub track: TrackConfig,
    pub simulation: RunConfig,
}

/// Physical limits and control parameters shared by all vehicles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// The desired speed for each strategy in m/s.
    pub desired_speed: PerStrategy<f64>,
    /// Maximum acceleration in m/s^2.
    pub a_max: f64,
    /// Maximum braking deceleration in m/s^2, a positive number.
    pub b_max: f64,
    /// Minimum gap to the vehicle ahead in m, before strategy adjustment.
    pub min_gap: f64,
    /// Desired time headway in s.
    pub reaction_time: f64,
    /// Wheel base in m.
    pub wheelbase: f64,
    /// Distance ahead of the vehicle of the steering target point, in m.
    pub lookahead_distance: f64,
    /// Radius within which a leader is detected, in m.
    pub sensing_radius: f64,
}

/// Shape of the circuit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Horizontal scale of the circuit in m.
    pub radius_x: f64,
    /// Vertical scale of the circuit in m.
    pub radius_y: f64,
    /// Total track width in m.
    pub width: f64,
    pub num_lanes: usize,
    /// Sampling resolution of the centreline.
    pub num_points: usize,
}

/// Parameters of the run itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Tick size in s.
    pub dt: f64,
    /// Target number of laps.
    pub laps: u32,
    /// Maximum simulated time in s.
    pub time_limit: f64,
    /// Centre distance below which two vehicles collide, in m.
    pub collision_radius: f64,
    /// Time-to-collision below which an approach counts as a near miss, in s.
    pub near_miss_ttc_threshold: f64,
    pub elimination: EliminationConfig,
    pub scheduler: SchedulerKind,
    pub transitions: TransitionConfig,
}

/// Post-collision elimination rolls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EliminationConfig {
    pub enabled: bool,
    /// A vehicle is eliminated when its 1-10 roll is below this value.
    pub threshold: u32,
}

/// Periodic strategy reclassification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub enabled: bool,
    /// Number of update cycles between evaluations.
    pub interval: usize,
}

/// The discipline used to advance the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    #[default]
    FixedStep,
    EventDriven,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_vehicles: 10,
            strategy_distribution: PerStrategy {
                aggressive: 3,
                balanced: 4,
                cautious: 3,
            },
            speed_multiplier: 1.0,
            seed: 0,
            controller: Default::default(),
            track: Default::default(),
            simulation: Default::default(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            desired_speed: PerStrategy {
                aggressive: 28.0,
                balanced: 24.0,
                cautious: 20.0,
            },
            a_max: 3.0,
            b_max: 6.0,
            min_gap: 2.0,
            reaction_time: 1.5,
            wheelbase: 2.5,
            lookahead_distance: 10.0,
            sensing_radius: 50.0,
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            radius_x: 60.0,
            radius_y: 40.0,
            width: 12.0,
            num_lanes: 5,
            num_points: 1000,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            laps: 3,
            time_limit: 300.0,
            collision_radius: 2.0,
            near_miss_ttc_threshold: 2.0,
            elimination: Default::default(),
            scheduler: SchedulerKind::FixedStep,
            transitions: Default::default(),
        }
    }
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 6,
        }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 20,
        }
    }
}

impl Config {
    /// Parses and validates a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every parameter, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let assigned: usize = self.strategy_distribution.iter().map(|(_, n)| n).sum();
        if assigned != self.num_vehicles {
            return Err(ConfigError::DistributionMismatch {
                assigned,
                expected: self.num_vehicles,
            });
        }
        positive("speed_multiplier", self.speed_multiplier)?;
        self.controller.validate()?;
        self.track.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

impl ControllerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let speeds = &self.desired_speed;
        positive("controller.desired_speed.aggressive", speeds.aggressive)?;
        positive("controller.desired_speed.balanced", speeds.balanced)?;
        positive("controller.desired_speed.cautious", speeds.cautious)?;
        positive("controller.a_max", self.a_max)?;
        positive("controller.b_max", self.b_max)?;
        in_range("controller.min_gap", self.min_gap, 0.0, 100.0)?;
        in_range("controller.reaction_time", self.reaction_time, 0.0, 10.0)?;
        positive("controller.wheelbase", self.wheelbase)?;
        positive("controller.lookahead_distance", self.lookahead_distance)?;
        positive("controller.sensing_radius", self.sensing_radius)?;
        Ok(())
    }
}

impl TrackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("track.radius_x", self.radius_x)?;
        positive("track.radius_y", self.radius_y)?;
        positive("track.width", self.width)?;
        in_range("track.num_lanes", self.num_lanes as f64, 1.0, 16.0)?;
        in_range("track.num_points", self.num_points as f64, 16.0, 1e6)?;
        Ok(())
    }
}

impl RunConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("simulation.dt", self.dt)?;
        in_range("simulation.dt", self.dt, 0.0, 1.0)?;
        in_range("simulation.laps", self.laps as f64, 1.0, 1000.0)?;
        positive("simulation.time_limit", self.time_limit)?;
        positive("simulation.collision_radius", self.collision_radius)?;
        positive(
            "simulation.near_miss_ttc_threshold",
            self.near_miss_ttc_threshold,
        )?;
        in_range(
            "simulation.elimination.threshold",
            self.elimination.threshold as f64,
            1.0,
            11.0,
        )?;
        in_range(
            "simulation.transitions.interval",
            self.transitions.interval as f64,
            1.0,
            1e6,
        )?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = Config::from_json(
            r#"{
                "num_vehicles": 2,
                "strategy_distribution": { "aggressive": 1, "balanced": 1, "cautious": 0 },
                "simulation": { "dt": 0.1, "scheduler": "event_driven" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.num_vehicles, 2);
        assert_eq!(config.simulation.dt, 0.1);
        assert_eq!(config.simulation.scheduler, SchedulerKind::EventDriven);
        assert_eq!(config.simulation.laps, 3);
        assert_eq!(config.track.num_lanes, 5);
    }

    #[test]
    fn mismatched_distribution_is_rejected() {
        let config = Config {
            num_vehicles: 4,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DistributionMismatch {
                assigned: 10,
                expected: 4
            })
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = Config::default();
        config.simulation.dt = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "simulation.dt",
                ..
            })
        ));

        let mut config = Config::default();
        config.simulation.elimination.threshold = 12;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RangeViolation {
                field: "simulation.elimination.threshold",
                ..
            })
        ));

        let mut config = Config::default();
        config.track.num_lanes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            Config::from_json("{ num_vehicles: }"),
            Err(ConfigError::Parse(_))
        ));
    }
}
