//! Discrete states and their canonical keys

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Debug};

use crate::need::{NeedLevel, NeedType, NeedVector};

/// Order in which needs are written into a state key.
///
/// Every learner tier builds and parses keys through this one function.
#[must_use]
pub fn key_order() -> &'static [NeedType; NeedType::COUNT] {
    &NeedType::ALL
}

/// Trait for states a tabular learner can index by
pub trait DiscreteState: Clone + Debug + Send + Sync {
    /// Canonical key. Two states are equal iff their keys are equal.
    fn key(&self) -> StateKey;
}

/// Canonical encoding of a discrete state, the first-level table key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Wrap a raw key string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StateKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl DiscreteState for StateKey {
    fn key(&self) -> StateKey {
        self.clone()
    }
}

/// Discretized need state: one [`NeedLevel`] per need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeedState {
    levels: [NeedLevel; NeedType::COUNT],
}

impl Default for NeedState {
    fn default() -> Self {
        Self {
            levels: [NeedLevel::Medium; NeedType::COUNT],
        }
    }
}

impl NeedState {
    /// Discretize a need vector. Absent needs are treated as Medium.
    #[must_use]
    pub fn discretize(needs: &NeedVector) -> Self {
        let mut state = Self::default();
        for &need in key_order() {
            if let Some(value) = needs.get(need) {
                state.levels[need.index()] = NeedLevel::from_value(value);
            }
        }
        state
    }

    /// Build a state from explicit levels in canonical order
    #[must_use]
    pub fn from_levels(levels: [NeedLevel; NeedType::COUNT]) -> Self {
        Self { levels }
    }

    /// Parse a canonical key back into a state
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        if key.chars().count() != NeedType::COUNT {
            return None;
        }
        let mut state = Self::default();
        for (&need, digit) in key_order().iter().zip(key.chars()) {
            state.levels[need.index()] = NeedLevel::from_digit(digit)?;
        }
        Some(state)
    }

    /// Level of one need
    #[must_use]
    pub fn level(&self, need: NeedType) -> NeedLevel {
        self.levels[need.index()]
    }

    /// All levels in canonical order
    #[must_use]
    pub fn levels(&self) -> &[NeedLevel; NeedType::COUNT] {
        &self.levels
    }

    /// Whether every need is High
    #[must_use]
    pub fn all_high(&self) -> bool {
        self.levels.iter().all(|&level| level == NeedLevel::High)
    }

    /// Number of Critical needs
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.levels
            .iter()
            .filter(|&&level| level == NeedLevel::Critical)
            .count()
    }
}

impl DiscreteState for NeedState {
    fn key(&self) -> StateKey {
        StateKey(
            key_order()
                .iter()
                .map(|&need| self.level(need).digit())
                .collect(),
        )
    }
}

impl fmt::Display for NeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Discretize a need vector into a [`NeedState`]
#[must_use]
pub fn discretize(needs: &NeedVector) -> NeedState {
    NeedState::discretize(needs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_critical_key() {
        let state = discretize(&NeedVector::uniform(30.0));
        assert_eq!(state.key().as_str(), "000000");
        assert_eq!(state.critical_count(), 6);
    }

    #[test]
    fn test_key_ignores_insertion_order() {
        let forward: NeedVector = NeedType::ALL.iter().map(|&n| (n, 30.0)).collect();
        let reverse: NeedVector = NeedType::ALL.iter().rev().map(|&n| (n, 30.0)).collect();
        assert_eq!(discretize(&forward).key(), discretize(&reverse).key());
    }

    #[test]
    fn test_key_follows_need_order() {
        let needs = NeedVector::from_values([10.0, 50.0, 90.0, 10.0, 50.0, 90.0]);
        assert_eq!(discretize(&needs).key().as_str(), "012012");
    }

    #[test]
    fn test_missing_need_defaults_to_medium() {
        let needs: NeedVector = [(NeedType::Hunger, 5.0), (NeedType::Fun, 95.0)]
            .into_iter()
            .collect();
        assert_eq!(discretize(&needs).key().as_str(), "011112");
        assert_eq!(discretize(&NeedVector::new()).key().as_str(), "111111");
    }

    #[test]
    fn test_all_high_at_75() {
        assert!(discretize(&NeedVector::uniform(75.0)).all_high());
        assert!(!discretize(&NeedVector::uniform(70.0)).all_high());
    }

    #[test]
    fn test_key_parses_back() {
        let state = discretize(&NeedVector::from_values([80.0, 20.0, 45.0, 71.0, 0.0, 100.0]));
        assert_eq!(NeedState::from_key(state.key().as_str()), Some(state));
        assert_eq!(NeedState::from_key("01201"), None);
        assert_eq!(NeedState::from_key("01201x"), None);
    }

    proptest! {
        #[test]
        fn prop_key_has_one_digit_per_need(values in proptest::array::uniform6(0.0f64..=100.0)) {
            let state = discretize(&NeedVector::from_values(values));
            let key = state.key();
            prop_assert_eq!(key.as_str().len(), NeedType::COUNT);
            for (need, digit) in NeedType::ALL.iter().zip(key.as_str().chars()) {
                let expected = NeedLevel::from_value(values[need.index()]).digit();
                prop_assert_eq!(digit, expected);
            }
        }
    }
}
