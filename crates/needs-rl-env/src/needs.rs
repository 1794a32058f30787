//! Need dynamics with a generation-dependent difficulty curve

use serde::{Deserialize, Serialize};

use needs_rl_agent::NeedProvider;
use needs_rl_core::{NeedType, NeedVector};

/// Value at or below which a need counts as critical
pub const CRITICAL_VALUE: f64 = 20.0;

/// Piecewise-linear curve over generations: `(generation, value)` knots,
/// flat before the first and after the last.
fn curve(knots: &[(u32, f64)], generation: u32) -> f64 {
    let Some(&(first_gen, first_value)) = knots.first() else {
        return 0.0;
    };
    if generation <= first_gen {
        return first_value;
    }
    for pair in knots.windows(2) {
        let (from_gen, from_value) = pair[0];
        let (to_gen, to_value) = pair[1];
        if generation <= to_gen {
            let progress = f64::from(generation - from_gen) / f64::from(to_gen - from_gen);
            return from_value + (to_value - from_value) * progress;
        }
    }
    knots.last().map_or(first_value, |&(_, value)| value)
}

/// Initial value of every need for a generation
pub fn start_value(generation: u32) -> f64 {
    curve(&[(20, 80.0), (50, 70.0), (100, 60.0), (200, 50.0)], generation)
}

/// Decay multiplier for a generation
pub fn difficulty(generation: u32) -> f64 {
    curve(
        &[(20, 0.25), (50, 0.4), (100, 0.6), (200, 0.8), (350, 1.0)],
        generation,
    )
}

/// Needs of one living agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedsModel {
    values: NeedVector,
    generation: u32,
    decay_per_second: f64,
    cause_of_death: Option<NeedType>,
}

impl NeedsModel {
    /// Needs of a freshly spawned agent
    pub fn spawn(generation: u32, base_decay_rate: f64) -> Self {
        Self {
            values: NeedVector::uniform(start_value(generation)),
            generation,
            decay_per_second: base_decay_rate * difficulty(generation),
            cause_of_death: None,
        }
    }

    /// Start from explicit values
    pub fn with_values(values: NeedVector, generation: u32, base_decay_rate: f64) -> Self {
        Self {
            values,
            generation,
            decay_per_second: base_decay_rate * difficulty(generation),
            cause_of_death: values.first_depleted(),
        }
    }

    /// Generation the needs were spawned for
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Decay applied to every need per second
    pub fn decay_per_second(&self) -> f64 {
        self.decay_per_second
    }

    /// Current values
    pub fn values(&self) -> &NeedVector {
        &self.values
    }

    /// Decay every need by `dt` seconds. Returns the cause when this tick kills the agent.
    pub fn tick(&mut self, dt: f64) -> Option<NeedType> {
        if self.cause_of_death.is_some() {
            return None;
        }
        let amount = -self.decay_per_second * dt;
        for need in NeedType::ALL {
            self.values.modify(need, amount);
        }
        self.cause_of_death = self.values.first_depleted();
        self.cause_of_death
    }

    /// Add `amount` to a need, clamping into range. Dead agents are unaffected.
    pub fn modify(&mut self, need: NeedType, amount: f64) {
        if self.cause_of_death.is_none() {
            self.values.modify(need, amount);
        }
    }

    /// Lowest need
    pub fn most_critical(&self) -> NeedType {
        self.values.lowest().map_or(NeedType::Hunger, |(need, _)| need)
    }

    /// Whether a need is at or below [`CRITICAL_VALUE`]
    pub fn is_critical(&self, need: NeedType) -> bool {
        self.values.value_or(need, 0.0) <= CRITICAL_VALUE
    }

    /// Need that reached zero first, once dead
    pub fn cause_of_death(&self) -> Option<NeedType> {
        self.cause_of_death
    }
}

impl NeedProvider for NeedsModel {
    fn need_value(&self, need: NeedType) -> f64 {
        self.values.value_or(need, 0.0)
    }

    fn is_alive(&self) -> bool {
        self.cause_of_death.is_none()
    }

    fn snapshot(&self) -> NeedVector {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_start_value_curve() {
        assert_relative_eq!(start_value(1), 80.0);
        assert_relative_eq!(start_value(20), 80.0);
        assert_relative_eq!(start_value(35), 75.0);
        assert_relative_eq!(start_value(75), 65.0);
        assert_relative_eq!(start_value(150), 55.0);
        assert_relative_eq!(start_value(500), 50.0);
    }

    #[test]
    fn test_difficulty_curve() {
        assert_relative_eq!(difficulty(0), 0.25);
        assert_relative_eq!(difficulty(50), 0.4);
        assert_relative_eq!(difficulty(75), 0.5);
        assert_relative_eq!(difficulty(275), 0.9);
        assert_relative_eq!(difficulty(1000), 1.0);
    }

    #[test]
    fn test_decay_and_death() {
        let mut needs = NeedsModel::spawn(1, 1.0);
        assert!(needs.tick(100.0).is_none());
        assert_relative_eq!(needs.need_value(NeedType::Fun), 55.0);

        needs.modify(NeedType::Hygiene, -50.0);
        assert_eq!(needs.most_critical(), NeedType::Hygiene);
        assert!(needs.is_critical(NeedType::Hygiene));
        assert!(!needs.is_critical(NeedType::Hunger));

        assert_eq!(needs.tick(20.0), Some(NeedType::Hygiene));
        assert!(!needs.is_alive());
        assert_eq!(needs.tick(1.0), None);
        assert_eq!(needs.cause_of_death(), Some(NeedType::Hygiene));
    }

    #[test]
    fn test_cause_is_first_in_order() {
        let mut needs = NeedsModel::with_values(
            NeedVector::from_values([50.0, 50.0, 50.0, 1.0, 50.0, 1.0]),
            1,
            4.0,
        );
        assert_eq!(needs.tick(1.0), Some(NeedType::Social));
    }

    #[test]
    fn test_modify_clamps() {
        let mut needs = NeedsModel::spawn(1, 1.0);
        needs.modify(NeedType::Energy, 500.0);
        assert_relative_eq!(needs.need_value(NeedType::Energy), 100.0);
    }
}
