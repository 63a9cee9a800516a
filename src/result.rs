//! The outcome of a simulation run.

use crate::collision::CollisionEvent;
use crate::scheduler::StopReason;
use crate::strategy::Strategy;
use crate::transition::StrategyChange;
use crate::vehicle::{Elimination, TrajectorySample, Vehicle};
use crate::VehicleId;
use serde::Serialize;
use std::fmt;

/// Everything recorded during a run.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationResult {
    pub vehicles: Vec<VehicleReport>,
    pub collisions: Vec<CollisionEvent>,
    pub near_misses: u64,
    /// The simulated time at which the run stopped, in s.
    pub elapsed: f64,
    pub stop_reason: StopReason,
    pub strategy_changes: Vec<StrategyChange>,
}

/// The record of a single vehicle.
#[derive(Clone, Debug, Serialize)]
pub struct VehicleReport {
    pub id: VehicleId,
    /// The strategy held at the end of the run.
    pub strategy: Strategy,
    pub laps: u32,
    pub lap_times: Vec<f64>,
    /// The mean recorded speed in m/s.
    pub mean_speed: f64,
    pub collision_count: u32,
    pub collision_severity: f64,
    pub elimination: Option<Elimination>,
    pub trajectory: Vec<TrajectorySample>,
}

impl VehicleReport {
    pub fn new(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id(),
            strategy: vehicle.strategy(),
            laps: vehicle.lap_count(),
            lap_times: vehicle.lap_times().to_vec(),
            mean_speed: vehicle.mean_speed(),
            collision_count: vehicle.collision_count(),
            collision_severity: vehicle.collision_severity(),
            elimination: vehicle.elimination().cloned(),
            trajectory: vehicle.trajectory().to_vec(),
        }
    }

    /// The fastest completed lap in s.
    pub fn best_lap(&self) -> Option<f64> {
        self.lap_times.iter().copied().min_by(f64::total_cmp)
    }
}

impl SimulationResult {
    /// The vehicles which did not finish.
    pub fn eliminated(&self) -> impl Iterator<Item = &VehicleReport> {
        self.vehicles.iter().filter(|v| v.elimination.is_some())
    }

    /// The surviving vehicles, most laps first.
    pub fn standings(&self) -> Vec<&VehicleReport> {
        let mut standings = self
            .vehicles
            .iter()
            .filter(|v| v.elimination.is_none())
            .collect::<Vec<_>>();
        standings.sort_by(|a, b| {
            b.laps.cmp(&a.laps).then_with(|| {
                let total = |v: &VehicleReport| v.lap_times.iter().sum::<f64>();
                total(a).total_cmp(&total(b))
            })
        });
        standings
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stopped after {:.2}s: {}", self.elapsed, self.stop_reason)?;
        writeln!(
            f,
            "{} collisions, {} near misses, {} eliminated, {} strategy changes",
            self.collisions.len(),
            self.near_misses,
            self.eliminated().count(),
            self.strategy_changes.len()
        )?;
        for (pos, v) in self.standings().iter().enumerate() {
            write!(
                f,
                "{:>3}. vehicle {:<3} {:<10} {} laps, mean {:.1} m/s",
                pos + 1,
                v.id,
                v.strategy,
                v.laps,
                v.mean_speed
            )?;
            if let Some(best) = v.best_lap() {
                write!(f, ", best lap {:.2}s", best)?;
            }
            writeln!(f)?;
        }
        for v in self.eliminated() {
            if let Some(elim) = &v.elimination {
                let time = elim.time.map_or("-".to_string(), |t| format!("{:.2}s", t));
                writeln!(f, "  out: vehicle {} at {} ({})", v.id, time, elim.reason)?;
            }
        }
        Ok(())
    }
}
