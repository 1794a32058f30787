//! Sparse tabular action values

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::action::DiscreteAction;
use crate::state::{DiscreteState, StateKey};

/// One learned action value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QValue {
    /// Expected discounted return
    pub value: f64,
    /// Number of updates after the first write
    pub visits: u32,
}

impl QValue {
    /// Create a new entry
    #[must_use]
    pub fn new(value: f64, visits: u32) -> Self {
        Self { value, visits }
    }
}

/// Summary figures for a table
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TableStats {
    /// Distinct states with at least one entry
    pub states: usize,
    /// Total state-action entries
    pub entries: usize,
    /// Sum of visit counts
    pub total_visits: u64,
    /// Smallest value, 0 for an empty table
    pub min_value: f64,
    /// Largest value, 0 for an empty table
    pub max_value: f64,
    /// Mean value, 0 for an empty table
    pub mean_value: f64,
}

/// Sparse mapping state key -> action -> [`QValue`].
///
/// Absent entries read as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable<A: DiscreteAction> {
    states: HashMap<StateKey, HashMap<A, QValue>>,
}

impl<A: DiscreteAction> Default for QTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: DiscreteAction> QTable<A> {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Number of states with entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the table has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Value of an action in a state, 0 when absent
    pub fn get<S: DiscreteState>(&self, state: &S, action: A) -> f64 {
        self.entry_by_key(&state.key(), action)
            .map_or(0.0, |entry| entry.value)
    }

    /// Stored entry, if any
    pub fn entry<S: DiscreteState>(&self, state: &S, action: A) -> Option<QValue> {
        self.entry_by_key(&state.key(), action)
    }

    fn entry_by_key(&self, key: &StateKey, action: A) -> Option<QValue> {
        self.states
            .get(key)
            .and_then(|actions| actions.get(&action))
            .copied()
    }

    /// Write a value. New entries start with zero visits, updates add one.
    pub fn set<S: DiscreteState>(&mut self, state: &S, action: A, value: f64) {
        self.states
            .entry(state.key())
            .or_default()
            .entry(action)
            .and_modify(|entry| {
                entry.value = value;
                entry.visits = entry.visits.saturating_add(1);
            })
            .or_insert(QValue::new(value, 0));
    }

    /// Store an entry verbatim
    pub fn insert(&mut self, key: StateKey, action: A, entry: QValue) {
        self.states.entry(key).or_default().insert(action, entry);
    }

    /// Highest value among `actions`, 0 when `actions` is empty.
    ///
    /// Absent entries count as 0.
    pub fn max_over<S: DiscreteState>(&self, state: &S, actions: &[A]) -> f64 {
        let key = state.key();
        let Some(row) = self.states.get(&key) else {
            return 0.0;
        };
        actions
            .iter()
            .map(|action| row.get(action).map_or(0.0, |entry| entry.value))
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Highest valued action in `actions`. Ties go to the earliest action.
    pub fn best_action<S: DiscreteState>(&self, state: &S, actions: &[A]) -> Option<A> {
        let key = state.key();
        let row = self.states.get(&key);
        let value_of = |action: &A| {
            row.and_then(|r| r.get(action))
                .map_or(0.0, |entry| entry.value)
        };

        let mut iter = actions.iter();
        let first = *iter.next()?;
        let mut best = (first, value_of(&first));
        for action in iter {
            let value = value_of(action);
            if value > best.1 {
                best = (*action, value);
            }
        }
        Some(best.0)
    }

    /// Entries of one state
    #[must_use]
    pub fn row(&self, key: &StateKey) -> Option<&HashMap<A, QValue>> {
        self.states.get(key)
    }

    /// Iterate over every state row
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &HashMap<A, QValue>)> {
        self.states.iter()
    }

    /// Iterate over every entry
    pub fn entries(&self) -> impl Iterator<Item = (&StateKey, A, QValue)> {
        self.states
            .iter()
            .flat_map(|(key, row)| row.iter().map(move |(&action, &entry)| (key, action, entry)))
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Fold `other` into this table, keeping the entry with more visits.
    ///
    /// On equal visit counts this table's entry is kept. Returns the number
    /// of entries taken from `other`.
    pub fn merge_from(&mut self, other: &QTable<A>) -> usize {
        let mut taken = 0;
        for (key, action, theirs) in other.entries() {
            let row = self.states.entry(key.clone()).or_default();
            let keep_ours = row
                .get(&action)
                .is_some_and(|ours| ours.visits >= theirs.visits);
            if !keep_ours {
                row.insert(action, theirs);
                taken += 1;
            }
        }
        taken
    }

    /// Summary figures
    #[must_use]
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            states: self.states.len(),
            ..TableStats::default()
        };
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (_, _, entry) in self.entries() {
            stats.entries += 1;
            stats.total_visits += u64::from(entry.visits);
            sum += entry.value;
            min = min.min(entry.value);
            max = max.max(entry.value);
        }
        if stats.entries > 0 {
            stats.min_value = min;
            stats.max_value = max;
            #[allow(clippy::cast_precision_loss)]
            let count = stats.entries as f64;
            stats.mean_value = sum / count;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PrimitiveAction;
    use crate::need::NeedVector;
    use crate::state::{discretize, NeedState};
    use approx::assert_relative_eq;

    fn state(value: f64) -> NeedState {
        discretize(&NeedVector::uniform(value))
    }

    #[test]
    fn test_empty_table_reads_zero() {
        let table: QTable<PrimitiveAction> = QTable::new();
        for value in [10.0, 55.0, 90.0] {
            for &action in PrimitiveAction::all() {
                assert_eq!(table.get(&state(value), action), 0.0);
            }
        }
    }

    #[test]
    fn test_set_counts_visits_after_insert() {
        let mut table = QTable::new();
        let s = state(30.0);
        table.set(&s, PrimitiveAction::UseBed, 1.5);
        assert_eq!(table.entry(&s, PrimitiveAction::UseBed), Some(QValue::new(1.5, 0)));
        table.set(&s, PrimitiveAction::UseBed, 2.5);
        table.set(&s, PrimitiveAction::UseBed, -4.0);
        assert_eq!(table.entry(&s, PrimitiveAction::UseBed), Some(QValue::new(-4.0, 2)));
    }

    #[test]
    fn test_max_over_empty_set_is_zero() {
        let mut table = QTable::new();
        let s = state(30.0);
        table.set(&s, PrimitiveAction::UseGym, -7.0);
        assert_eq!(table.max_over(&s, &[]), 0.0);
        assert_eq!(table.max_over(&state(90.0), PrimitiveAction::all()), 0.0);
    }

    #[test]
    fn test_max_over_treats_absent_as_zero() {
        let mut table = QTable::new();
        let s = state(30.0);
        table.set(&s, PrimitiveAction::UseGym, -7.0);
        table.set(&s, PrimitiveAction::UseBed, -2.0);
        assert_eq!(table.max_over(&s, PrimitiveAction::all()), 0.0);
        assert_eq!(
            table.max_over(&s, &[PrimitiveAction::UseGym, PrimitiveAction::UseBed]),
            -2.0
        );
    }

    #[test]
    fn test_best_action_breaks_ties_by_order() {
        let mut table = QTable::new();
        let s = state(50.0);
        assert_eq!(
            table.best_action(&s, &[PrimitiveAction::UseSink, PrimitiveAction::UseGym]),
            Some(PrimitiveAction::UseSink)
        );
        table.set(&s, PrimitiveAction::UseGym, 3.0);
        table.set(&s, PrimitiveAction::UseSofa, 3.0);
        assert_eq!(
            table.best_action(&s, &[PrimitiveAction::UseSofa, PrimitiveAction::UseGym]),
            Some(PrimitiveAction::UseSofa)
        );
        assert_eq!(table.best_action(&s, &[]), None);
    }

    #[test]
    fn test_merge_keeps_more_visited_entry() {
        let s = state(50.0);
        let mut ours = QTable::new();
        ours.insert(s.key(), PrimitiveAction::UseBed, QValue::new(1.0, 3));
        ours.insert(s.key(), PrimitiveAction::UseSofa, QValue::new(2.0, 5));

        let mut theirs = QTable::new();
        theirs.insert(s.key(), PrimitiveAction::UseBed, QValue::new(9.0, 7));
        theirs.insert(s.key(), PrimitiveAction::UseSofa, QValue::new(8.0, 5));
        theirs.insert(s.key(), PrimitiveAction::UsePhone, QValue::new(4.0, 0));

        assert_eq!(ours.merge_from(&theirs), 2);
        assert_eq!(ours.entry(&s, PrimitiveAction::UseBed), Some(QValue::new(9.0, 7)));
        assert_eq!(ours.entry(&s, PrimitiveAction::UseSofa), Some(QValue::new(2.0, 5)));
        assert_eq!(ours.entry(&s, PrimitiveAction::UsePhone), Some(QValue::new(4.0, 0)));
    }

    #[test]
    fn test_stats() {
        let mut table = QTable::new();
        assert_eq!(table.stats(), TableStats::default());
        table.insert(state(10.0).key(), PrimitiveAction::UseBed, QValue::new(-2.0, 1));
        table.insert(state(90.0).key(), PrimitiveAction::Idle, QValue::new(4.0, 3));
        let stats = table.stats();
        assert_eq!(stats.states, 2);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_visits, 4);
        assert_relative_eq!(stats.mean_value, 1.0);
        assert_relative_eq!(stats.min_value, -2.0);
        assert_relative_eq!(stats.max_value, 4.0);
    }
}
