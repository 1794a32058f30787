//! Action selection over a Q-table

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use needs_rl_core::{DiscreteAction, DiscreteState, QTable};

/// Trait for action selectors
pub trait Policy<A: DiscreteAction> {
    /// Pick one of `available`. An empty set yields [`DiscreteAction::no_op`].
    fn choose_action<S: DiscreteState>(
        &mut self,
        table: &QTable<A>,
        state: &S,
        available: &[A],
        exploration_rate: f64,
    ) -> A;
}

/// Always exploits; ignores the exploration rate
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl<A: DiscreteAction> Policy<A> for Greedy {
    fn choose_action<S: DiscreteState>(
        &mut self,
        table: &QTable<A>,
        state: &S,
        available: &[A],
        _exploration_rate: f64,
    ) -> A {
        table
            .best_action(state, available)
            .unwrap_or_else(A::no_op)
    }
}

/// Epsilon-greedy selection with an injectable random source
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<G = StdRng> {
    rng: G,
}

impl EpsilonGreedy<StdRng> {
    /// Seed from system entropy
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic selector for reproducible runs
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<G: Rng> EpsilonGreedy<G> {
    /// Create a new epsilon-greedy policy
    pub fn new(rng: G) -> Self {
        Self { rng }
    }

    /// Mutable access to the random source
    pub fn rng_mut(&mut self) -> &mut G {
        &mut self.rng
    }
}

impl<A: DiscreteAction, G: Rng> Policy<A> for EpsilonGreedy<G> {
    fn choose_action<S: DiscreteState>(
        &mut self,
        table: &QTable<A>,
        state: &S,
        available: &[A],
        exploration_rate: f64,
    ) -> A {
        if available.is_empty() {
            return A::no_op();
        }
        // One draw per decision, explore or exploit.
        if self.rng.gen::<f64>() < exploration_rate {
            available[self.rng.gen_range(0..available.len())]
        } else {
            table
                .best_action(state, available)
                .unwrap_or_else(A::no_op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use needs_rl_core::{discretize, MacroAction, NeedVector, PrimitiveAction};

    #[test]
    fn test_empty_set_returns_no_op() {
        let table: QTable<PrimitiveAction> = QTable::new();
        let state = discretize(&NeedVector::uniform(50.0));
        let mut policy = EpsilonGreedy::seeded(7);
        assert_eq!(
            policy.choose_action(&table, &state, &[], 1.0),
            PrimitiveAction::Idle
        );
        let table: QTable<MacroAction> = QTable::new();
        assert_eq!(
            policy.choose_action(&table, &state, &[], 0.0),
            MacroAction::SatisfyHunger
        );
    }

    #[test]
    fn test_zero_exploration_exploits() {
        let mut table = QTable::new();
        let state = discretize(&NeedVector::uniform(50.0));
        table.set(&state, PrimitiveAction::UseGym, 4.0);
        let mut policy = EpsilonGreedy::seeded(1);
        for _ in 0..50 {
            assert_eq!(
                policy.choose_action(&table, &state, PrimitiveAction::all(), 0.0),
                PrimitiveAction::UseGym
            );
        }
    }

    #[test]
    fn test_full_exploration_stays_in_available_set() {
        let table: QTable<PrimitiveAction> = QTable::new();
        let state = discretize(&NeedVector::uniform(50.0));
        let available = [PrimitiveAction::UseBed, PrimitiveAction::UseSink];
        let mut policy = EpsilonGreedy::seeded(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let action = policy.choose_action(&table, &state, &available, 1.0);
            assert!(available.contains(&action));
            seen.insert(action);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let table: QTable<PrimitiveAction> = QTable::new();
        let state = discretize(&NeedVector::uniform(20.0));
        let mut a = EpsilonGreedy::seeded(42);
        let mut b = EpsilonGreedy::seeded(42);
        for _ in 0..100 {
            assert_eq!(
                a.choose_action(&table, &state, PrimitiveAction::all(), 0.5),
                b.choose_action(&table, &state, PrimitiveAction::all(), 0.5)
            );
        }
    }

    #[test]
    fn test_greedy_prefers_first_on_ties() {
        let table: QTable<PrimitiveAction> = QTable::new();
        let state = discretize(&NeedVector::uniform(75.0));
        assert_eq!(
            Greedy.choose_action(&table, &state, PrimitiveAction::all(), 1.0),
            PrimitiveAction::Idle
        );
    }
}
