//! Periodic Markov reclassification of vehicle strategies.

use crate::config::{ControllerConfig, TransitionConfig};
use crate::control::ControlPolicy;
use crate::strategy::Strategy;
use crate::vehicle::{EliminationReason, Vehicle};
use crate::VehicleId;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;
use std::fmt;

/// Transition probabilities from each strategy, in the column
/// order aggressive, balanced, cautious, eliminated.
const BASE_MATRIX: [[f64; 4]; 3] = [
    [0.70, 0.20, 0.05, 0.05],
    [0.10, 0.80, 0.08, 0.02],
    [0.05, 0.15, 0.75, 0.05],
];

const AGGRESSIVE: usize = 0;
const CAUTIOUS: usize = 2;
const ELIMINATED: usize = 3;

/// Collisions per lap above which a vehicle is pushed towards caution.
const HIGH_COLLISION_RATE: f64 = 0.5;
/// Collisions per lap below which a fast vehicle is pushed towards aggression.
const LOW_COLLISION_RATE: f64 = 0.1;
/// A vehicle is fast if its mean speed exceeds this fraction of its desired speed.
const FAST_RATIO: f64 = 0.9;

/// A state of the strategy Markov chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyState {
    Live(Strategy),
    Eliminated,
}

impl StrategyState {
    fn from_index(idx: usize) -> Self {
        Strategy::ALL
            .get(idx)
            .copied()
            .map_or(Self::Eliminated, Self::Live)
    }
}

impl fmt::Display for StrategyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(strategy) => write!(f, "{}", strategy),
            Self::Eliminated => f.write_str("eliminated"),
        }
    }
}

/// A recorded change of a vehicle's strategy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StrategyChange {
    pub time: f64,
    pub vehicle: VehicleId,
    pub from: Strategy,
    pub to: StrategyState,
}

/// The strategy transition layer.
#[derive(Clone, Copy, Debug)]
pub struct StrategyTransition {
    interval: usize,
    allow_elimination: bool,
}

impl StrategyTransition {
    /// Creates the transition layer, or `None` if transitions are disabled.
    pub fn new(config: &TransitionConfig, allow_elimination: bool) -> Option<Self> {
        config.enabled.then_some(Self {
            interval: usize::max(config.interval, 1),
            allow_elimination,
        })
    }

    /// Whether transitions run on the given cycle.
    pub fn is_due(&self, cycle: usize) -> bool {
        cycle % self.interval == 0
    }

    /// The transition probabilities of a vehicle, adjusted for its record.
    pub fn probabilities(&self, vehicle: &Vehicle) -> [f64; 4] {
        let from = Strategy::ALL
            .iter()
            .position(|s| *s == vehicle.strategy())
            .unwrap_or(1);
        let mut probs = BASE_MATRIX[from];

        let rate = vehicle.collision_count() as f64 / f64::max(vehicle.lap_count() as f64, 1.0);
        if rate > HIGH_COLLISION_RATE {
            probs[ELIMINATED] = f64::min(0.3, probs[ELIMINATED] * 2.0);
            probs[CAUTIOUS] = f64::min(0.4, probs[CAUTIOUS] * 2.0);
            probs[AGGRESSIVE] *= 0.5;
        } else if rate < LOW_COLLISION_RATE
            && vehicle.mean_speed() > FAST_RATIO * vehicle.desired_speed()
        {
            probs[AGGRESSIVE] = f64::min(0.3, probs[AGGRESSIVE] * 1.5);
            probs[ELIMINATED] *= 0.5;
        }
        if !self.allow_elimination {
            probs[ELIMINATED] = 0.0;
        }

        let total: f64 = probs.iter().sum();
        probs.iter_mut().for_each(|p| *p /= total);
        probs
    }

    /// Samples the next state of every active vehicle, applying and
    /// returning the changes.
    pub fn apply(
        &self,
        vehicles: &mut [Vehicle],
        controller: &ControllerConfig,
        time: f64,
        rng: &mut impl Rng,
    ) -> Vec<StrategyChange> {
        let mut changes = vec![];
        for vehicle in vehicles.iter_mut().filter(|v| v.is_active()) {
            let Ok(dist) = WeightedIndex::<f64>::new(self.probabilities(vehicle)) else {
                continue;
            };
            let from = vehicle.strategy();
            let to = StrategyState::from_index(dist.sample(rng));
            match to {
                StrategyState::Live(strategy) if strategy == from => continue,
                StrategyState::Live(strategy) => {
                    let policy = ControlPolicy::new(controller, strategy, vehicle.desired_speed());
                    vehicle.set_strategy(strategy, policy);
                }
                StrategyState::Eliminated => {
                    vehicle.flag_eliminated(EliminationReason::StrategyTransition);
                }
            }
            log::debug!("t={:.2}s: vehicle {} changed from {} to {}", time, vehicle.id(), from, to);
            changes.push(StrategyChange {
                time,
                vehicle: vehicle.id(),
                from,
                to,
            });
        }
        changes
    }
}
