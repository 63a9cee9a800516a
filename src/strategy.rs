//! Behavioural profiles of the simulated vehicles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named behavioural profile, setting how fast a vehicle
/// wants to drive and how closely it follows others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Aggressive,
    Balanced,
    Cautious,
}

impl Strategy {
    /// All strategies, in a fixed order.
    pub const ALL: [Strategy; 3] = [Strategy::Aggressive, Strategy::Balanced, Strategy::Cautious];

    /// The factor applied to the desired speed to obtain the maximum speed.
    pub fn speed_multiplier(self) -> f64 {
        match self {
            Strategy::Aggressive => 1.2,
            Strategy::Balanced => 1.0,
            Strategy::Cautious => 0.9,
        }
    }

    /// The factor applied to the base minimum gap.
    pub fn gap_factor(self) -> f64 {
        match self {
            Strategy::Aggressive => 0.8,
            Strategy::Balanced => 1.0,
            Strategy::Cautious => 1.2,
        }
    }

    /// The lowercase name of the strategy.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Aggressive => "aggressive",
            Strategy::Balanced => "balanced",
            Strategy::Cautious => "cautious",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// One value for each [Strategy].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerStrategy<T> {
    pub aggressive: T,
    pub balanced: T,
    pub cautious: T,
}

impl<T: Copy> PerStrategy<T> {
    /// Gets the value for the given strategy.
    pub fn get(&self, strategy: Strategy) -> T {
        match strategy {
            Strategy::Aggressive => self.aggressive,
            Strategy::Balanced => self.balanced,
            Strategy::Cautious => self.cautious,
        }
    }

    /// Iterates over the strategies paired with their values.
    pub fn iter(&self) -> impl Iterator<Item = (Strategy, T)> + '_ {
        Strategy::ALL.into_iter().map(|s| (s, self.get(s)))
    }
}
