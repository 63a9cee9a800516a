//! Error types.

use crate::VehicleId;
use thiserror::Error;

/// Errors raised when a [Config](crate::Config) violates its invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("strategy distribution assigns {assigned} vehicles but num_vehicles is {expected}")]
    DistributionMismatch { assigned: usize, expected: usize },
    #[error("invalid configuration JSON: {0}")]
    Parse(String),
}

/// Errors which abort a simulation run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("track waypoints do not form a valid closed loop")]
    DegenerateTrack,
    #[error("vehicle spawn {0} must be finite and in range (got {1})")]
    InvalidSpawn(&'static str, f64),
    #[error("vehicle {vehicle} reached a non-finite state at t={time:.3}s")]
    NonFinite { vehicle: VehicleId, time: f64 },
}

/// Raised by a [FrameSink](crate::FrameSink) which cannot start.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("frame sink unavailable: {0}")]
pub struct SinkError(pub String);
