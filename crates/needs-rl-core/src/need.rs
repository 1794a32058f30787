//! Needs, need levels and need vectors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest value a need can hold
pub const NEED_MIN: f64 = 0.0;

/// Highest value a need can hold
pub const NEED_MAX: f64 = 100.0;

/// A decaying survival pressure tracked for every agent.
///
/// Declaration order is the canonical layout of state keys and persisted
/// tables. Reordering the variants invalidates every saved table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NeedType {
    /// Food intake
    Hunger,
    /// Toilet pressure
    Bladder,
    /// Rest
    Energy,
    /// Company
    Social,
    /// Cleanliness
    Hygiene,
    /// Entertainment
    Fun,
}

impl NeedType {
    /// Number of needs
    pub const COUNT: usize = 6;

    /// All needs in canonical order
    pub const ALL: [NeedType; Self::COUNT] = [
        NeedType::Hunger,
        NeedType::Bladder,
        NeedType::Energy,
        NeedType::Social,
        NeedType::Hygiene,
        NeedType::Fun,
    ];

    /// Position of this need in the canonical order
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Need at a canonical position
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human readable name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            NeedType::Hunger => "Hunger",
            NeedType::Bladder => "Bladder",
            NeedType::Energy => "Energy",
            NeedType::Social => "Social",
            NeedType::Hygiene => "Hygiene",
            NeedType::Fun => "Fun",
        }
    }
}

impl fmt::Display for NeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Three-valued discretization of a need value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NeedLevel {
    /// Value at or below 40
    Critical = 0,
    /// Value above 40 and at or below 70
    Medium = 1,
    /// Value above 70
    High = 2,
}

impl NeedLevel {
    /// Upper bound (inclusive) of the critical band
    pub const CRITICAL_MAX: f64 = 40.0;

    /// Upper bound (inclusive) of the medium band
    pub const MEDIUM_MAX: f64 = 70.0;

    /// Classify a need value
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        if value <= Self::CRITICAL_MAX {
            NeedLevel::Critical
        } else if value <= Self::MEDIUM_MAX {
            NeedLevel::Medium
        } else {
            NeedLevel::High
        }
    }

    /// Ordinal used in state keys
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Key digit for this level
    #[must_use]
    pub fn digit(self) -> char {
        char::from(b'0' + self.ordinal())
    }

    /// Parse a key digit
    #[must_use]
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(NeedLevel::Critical),
            '1' => Some(NeedLevel::Medium),
            '2' => Some(NeedLevel::High),
            _ => None,
        }
    }

    /// Representative value of the band, used when the exact value was not tracked
    #[must_use]
    pub fn midpoint(self) -> f64 {
        match self {
            NeedLevel::Critical => Self::CRITICAL_MAX / 2.0,
            NeedLevel::Medium => (Self::CRITICAL_MAX + Self::MEDIUM_MAX) / 2.0,
            NeedLevel::High => (Self::MEDIUM_MAX + NEED_MAX) / 2.0,
        }
    }
}

impl fmt::Display for NeedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeedLevel::Critical => "Critical",
            NeedLevel::Medium => "Medium",
            NeedLevel::High => "High",
        };
        f.write_str(name)
    }
}

/// Need values indexed by [`NeedType`]. Entries may be absent.
///
/// Stored values are always clamped to `[NEED_MIN, NEED_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NeedVector {
    values: [Option<f64>; NeedType::COUNT],
}

impl NeedVector {
    /// Create an empty vector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vector with every need at the same value
    #[must_use]
    pub fn uniform(value: f64) -> Self {
        let mut needs = Self::new();
        for need in NeedType::ALL {
            needs.set(need, value);
        }
        needs
    }

    /// Create a complete vector from values in canonical order
    #[must_use]
    pub fn from_values(values: [f64; NeedType::COUNT]) -> Self {
        NeedType::ALL.into_iter().zip(values).collect()
    }

    /// Value of a need, if present
    #[must_use]
    pub fn get(&self, need: NeedType) -> Option<f64> {
        self.values[need.index()]
    }

    /// Value of a need, or `default` when absent
    #[must_use]
    pub fn value_or(&self, need: NeedType, default: f64) -> f64 {
        self.get(need).unwrap_or(default)
    }

    /// Set a need, clamping into range
    pub fn set(&mut self, need: NeedType, value: f64) {
        self.values[need.index()] = Some(value.clamp(NEED_MIN, NEED_MAX));
    }

    /// Remove a need entry
    pub fn remove(&mut self, need: NeedType) {
        self.values[need.index()] = None;
    }

    /// Add `amount` to a present need, clamping into range. Absent needs stay absent.
    pub fn modify(&mut self, need: NeedType, amount: f64) {
        if let Some(value) = self.get(need) {
            self.set(need, value + amount);
        }
    }

    /// Whether every need has a value
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// Present entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (NeedType, f64)> + '_ {
        NeedType::ALL
            .into_iter()
            .filter_map(move |need| self.get(need).map(|value| (need, value)))
    }

    /// Lowest present need. Ties resolve to the earlier need.
    #[must_use]
    pub fn lowest(&self) -> Option<(NeedType, f64)> {
        self.iter().fold(None, |lowest, (need, value)| match lowest {
            Some((_, best)) if best <= value => lowest,
            _ => Some((need, value)),
        })
    }

    /// First need (canonical order) at or below the minimum
    #[must_use]
    pub fn first_depleted(&self) -> Option<NeedType> {
        self.iter()
            .find(|&(_, value)| value <= NEED_MIN)
            .map(|(need, _)| need)
    }

    /// Whether every need is present and strictly above `threshold`
    #[must_use]
    pub fn all_above(&self, threshold: f64) -> bool {
        self.is_complete() && self.iter().all(|(_, value)| value > threshold)
    }

    /// Mean of the present values, 0 when empty
    #[must_use]
    pub fn average(&self) -> f64 {
        let (sum, count) = self
            .iter()
            .fold((0.0, 0_u32), |(sum, count), (_, value)| (sum + value, count + 1));
        if count == 0 {
            0.0
        } else {
            sum / f64::from(count)
        }
    }

    /// Values in canonical order, absent entries as `None`
    #[must_use]
    pub fn as_array(&self) -> [Option<f64>; NeedType::COUNT] {
        self.values
    }
}

impl FromIterator<(NeedType, f64)> for NeedVector {
    fn from_iter<I: IntoIterator<Item = (NeedType, f64)>>(iter: I) -> Self {
        let mut needs = Self::new();
        for (need, value) in iter {
            needs.set(need, value);
        }
        needs
    }
}
