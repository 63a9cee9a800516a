//! A multi-vehicle racing circuit simulation.
//!
//! Vehicles drive a closed multi-lane circuit under a car-following and
//! pursuit-steering control law, change lanes to overtake, collide and may be
//! eliminated. Runs are advanced by a fixed-step or a discrete-event
//! [Scheduler](scheduler::Scheduler).

use serde::Serialize;
use std::fmt;

pub use cgmath;
pub use collision::{CollisionEvent, DetectionSource};
pub use config::{Config, SchedulerKind};
pub use error::{ConfigError, SimError, SinkError};
pub use result::{SimulationResult, VehicleReport};
pub use scheduler::StopReason;
pub use simulation::Simulation;
pub use sink::{Frame, FrameSink, LogSink};
pub use strategy::{PerStrategy, Strategy};
pub use track::Track;
pub use transition::{StrategyChange, StrategyState};
pub use util::Interval;
pub use vehicle::{Elimination, EliminationReason, TrajectorySample, Vehicle, VehicleSpawn};

pub mod collision;
pub mod config;
pub mod control;
mod error;
pub mod math;
mod result;
pub mod scheduler;
mod simulation;
mod sink;
mod strategy;
pub mod track;
pub mod transition;
mod util;
mod vehicle;

/// Unique ID of a [Vehicle], its index in the simulation's roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VehicleId(pub usize);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
