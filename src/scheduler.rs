//! Disciplines for advancing a [Simulation] through time.

use crate::error::SimError;
use crate::simulation::Simulation;
use serde::Serialize;
use std::fmt;

mod event;
mod fixed;

pub use event::{Event, EventDriven, EventKind, EventQueue};
pub use fixed::FixedStep;

/// Absorbs rounding when counting the ticks that fit in the time limit.
const TICK_EPS: f64 = 1e-9;

/// The number of whole `dt` ticks within the time limit.
fn tick_count(time_limit: f64, dt: f64) -> usize {
    (time_limit / dt + TICK_EPS).floor() as usize
}

/// Drives a simulation until a stop condition is met.
pub trait Scheduler {
    /// Runs the simulation, returning why it stopped.
    fn run(&mut self, sim: &mut Simulation) -> Result<StopReason, SimError>;
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every tick or queued event was processed.
    Exhausted,
    /// The simulated time reached the time limit.
    TimeLimit,
    /// No active vehicle remains.
    AllEliminated,
    /// Every active vehicle completed the target number of laps.
    TargetLapsReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhausted => "schedule exhausted",
            Self::TimeLimit => "time limit reached",
            Self::AllEliminated => "all vehicles eliminated",
            Self::TargetLapsReached => "target laps reached",
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ticks_within_limit() {
        assert_eq!(tick_count(5.0, 0.05), 100);
        assert_eq!(tick_count(10.0, 1.0 / 30.0), 300);
        assert_eq!(tick_count(1.0, 0.3), 3);
        assert_eq!(tick_count(0.0, 0.05), 0);
    }
}
