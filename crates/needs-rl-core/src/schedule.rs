//! Exploration-rate annealing

use serde::{Deserialize, Serialize};

use crate::config::LearningParams;

/// Trait for schedules evaluated at a step count
pub trait Schedule: Send + Sync {
    /// Value after `t` steps
    fn value(&self, t: u64) -> f64;
}

/// Multiplicative decay toward a floor, advanced once per learning update.
///
/// The rate never increases and never drops below the floor once it has
/// reached it. A rate configured below the floor is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    initial: f64,
    current: f64,
    decay: f64,
    floor: f64,
    steps: u64,
}

impl ExplorationSchedule {
    /// Create a new schedule
    #[must_use]
    pub fn new(initial: f64, decay: f64, floor: f64) -> Self {
        Self {
            initial,
            current: initial,
            decay,
            floor,
            steps: 0,
        }
    }

    /// Schedule described by learning parameters
    #[must_use]
    pub fn from_params(params: &LearningParams) -> Self {
        Self::new(
            params.exploration_rate,
            params.exploration_decay,
            params.min_exploration_rate,
        )
    }

    /// Current exploration rate
    #[must_use]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Configured floor
    #[must_use]
    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Number of decay steps applied so far
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Apply one decay step and return the new rate
    pub fn advance(&mut self) -> f64 {
        self.steps += 1;
        if self.current > self.floor {
            self.current = (self.current * self.decay).max(self.floor);
        }
        self.current
    }

    /// Restart from the initial rate
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.steps = 0;
    }
}

impl Schedule for ExplorationSchedule {
    fn value(&self, t: u64) -> f64 {
        if self.initial <= self.floor {
            return self.initial;
        }
        let exponent = i32::try_from(t).unwrap_or(i32::MAX);
        (self.initial * self.decay.powi(exponent)).max(self.floor)
    }
}
