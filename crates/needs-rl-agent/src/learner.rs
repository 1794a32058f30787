//! Generic one-step tabular Q-learner
//!
//! One learner type serves both tiers; only the state type, the action
//! enumeration and the reward function differ.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;

use needs_rl_core::persistence;
use needs_rl_core::{
    ConfigFile, DiscreteAction, DiscreteState, ExplorationSchedule, IdleAccumulator,
    LearningParams, LoadStatus, QTable, Result, Reward, RewardFunction, StateKey,
    TransitionContext,
};

use crate::policy::{EpsilonGreedy, Policy};

/// Outcome of one learning update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateReport {
    /// Key of the state that was updated
    pub state_key: StateKey,
    /// Ordinal of the updated action
    pub action: usize,
    /// Reward that drove the update
    pub reward: f64,
    /// Value before the update
    pub old_q: f64,
    /// Best value reachable from the next state
    pub max_next_q: f64,
    /// Value after the update
    pub new_q: f64,
    /// Exploration rate after decay
    pub exploration_rate: f64,
}

/// Tabular Q-learner parameterized by state, action and reward types
pub struct QLearner<S, A, R, G = StdRng>
where
    A: DiscreteAction,
{
    table: QTable<A>,
    params: LearningParams,
    schedule: ExplorationSchedule,
    policy: EpsilonGreedy<G>,
    reward_fn: R,
    updates: u64,
    _state: PhantomData<fn(&S)>,
}

impl<S, A, R> QLearner<S, A, R, StdRng>
where
    S: DiscreteState,
    A: DiscreteAction,
    R: RewardFunction<State = S>,
{
    /// Create a learner seeded from system entropy
    pub fn new(params: LearningParams, reward_fn: R) -> Result<Self> {
        Self::with_policy(params, reward_fn, EpsilonGreedy::from_entropy())
    }

    /// Create a learner with a deterministic random source
    pub fn seeded(params: LearningParams, reward_fn: R, seed: u64) -> Result<Self> {
        Self::with_policy(params, reward_fn, EpsilonGreedy::seeded(seed))
    }
}

impl<S, A, R, G> QLearner<S, A, R, G>
where
    S: DiscreteState,
    A: DiscreteAction,
    R: RewardFunction<State = S>,
    G: Rng,
{
    /// Create a learner with an explicit selector
    pub fn with_policy(params: LearningParams, reward_fn: R, policy: EpsilonGreedy<G>) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            table: QTable::new(),
            params,
            schedule: ExplorationSchedule::from_params(&params),
            policy,
            reward_fn,
            updates: 0,
            _state: PhantomData,
        })
    }

    /// Epsilon-greedy choice among `available` at the current exploration rate
    pub fn choose_action(&mut self, state: &S, available: &[A]) -> A {
        let rate = self.schedule.current();
        self.policy
            .choose_action(&self.table, state, available, rate)
    }

    /// Best known action over the whole enumeration
    pub fn best_action(&self, state: &S) -> A {
        self.table
            .best_action(state, A::all())
            .unwrap_or_else(A::no_op)
    }

    /// Learned value of an action
    pub fn q_value(&self, state: &S, action: A) -> f64 {
        self.table.get(state, action)
    }

    /// Score a transition with this learner's reward function
    pub fn score(&self, ctx: &TransitionContext<'_, S>, idle: &mut IdleAccumulator) -> Reward {
        self.reward_fn.reward(ctx, idle)
    }

    /// Fixed terminal reward of this learner's reward function
    pub fn terminal_penalty(&self) -> Reward {
        self.reward_fn.terminal_penalty()
    }

    /// Apply one TD(0) update for `(old_state, action)` and decay exploration
    pub fn update(&mut self, old_state: &S, action: A, reward: Reward, new_state: &S) -> UpdateReport {
        let old_q = self.table.get(old_state, action);
        let max_next_q = self.table.max_over(new_state, A::all());
        let target = reward.value() + self.params.discount_factor * max_next_q;
        let new_q = old_q + self.params.learning_rate * (target - old_q);
        self.table.set(old_state, action, new_q);

        let exploration_rate = self.schedule.advance();
        self.updates += 1;

        let report = UpdateReport {
            state_key: old_state.key(),
            action: action.ordinal(),
            reward: reward.value(),
            old_q,
            max_next_q,
            new_q,
            exploration_rate,
        };
        debug!(
            state = %report.state_key,
            action = %action,
            reward = report.reward,
            old_q,
            new_q,
            exploration_rate,
            "Q-update"
        );
        report
    }

    /// Score a transition and apply the update in one step
    pub fn learn(
        &mut self,
        action: A,
        ctx: &TransitionContext<'_, S>,
        idle: &mut IdleAccumulator,
    ) -> UpdateReport {
        let reward = self.score(ctx, idle);
        self.update(ctx.old_state, action, reward, ctx.new_state)
    }

    /// Current exploration rate
    pub fn exploration_rate(&self) -> f64 {
        self.schedule.current()
    }

    /// Number of updates applied
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Learning parameters
    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    /// The learned table
    pub fn table(&self) -> &QTable<A> {
        &self.table
    }

    /// Replace the table wholesale
    pub fn replace_table(&mut self, table: QTable<A>) {
        self.table = table;
    }

    /// Forget all learning and restart exploration
    pub fn reset(&mut self) {
        self.table.clear();
        self.schedule.reset();
        self.updates = 0;
    }

    /// Persist the table
    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save(&self.table, path)
    }

    /// Replace the table with the one stored at `path`
    pub fn load(&mut self, path: &Path) -> LoadStatus {
        let (table, status) = persistence::load(path);
        self.table = table;
        status
    }
}

impl<S, A, R, G> std::fmt::Debug for QLearner<S, A, R, G>
where
    A: DiscreteAction,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QLearner")
            .field("states", &self.table.len())
            .field("params", &self.params)
            .field("exploration_rate", &self.schedule.current())
            .field("updates", &self.updates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use needs_rl_core::{
        discretize, MacroAction, MacroReward, NeedReward, NeedState, NeedVector, PrimitiveAction,
    };
    use proptest::prelude::*;
    use tempfile::tempdir;

    type FlatLearner = QLearner<NeedState, PrimitiveAction, NeedReward>;

    fn flat(seed: u64) -> FlatLearner {
        QLearner::seeded(LearningParams::micro(), NeedReward::default(), seed).unwrap()
    }

    #[test]
    fn test_update_follows_td_rule() {
        let mut learner = flat(0);
        let old = discretize(&NeedVector::uniform(30.0));
        let new = discretize(&NeedVector::uniform(60.0));
        learner.table.set(&old, PrimitiveAction::UseBed, 2.0);
        learner.table.set(&new, PrimitiveAction::UseSofa, 10.0);
        learner.table.set(&new, PrimitiveAction::UseGym, -4.0);

        let report = learner.update(&old, PrimitiveAction::UseBed, Reward(5.0), &new);
        let expected = 2.0 + 0.1 * (5.0 + 0.9 * 10.0 - 2.0);
        assert_eq!(report.old_q, 2.0);
        assert_eq!(report.max_next_q, 10.0);
        assert_eq!(report.new_q, expected);
        assert_eq!(learner.q_value(&old, PrimitiveAction::UseBed), expected);
        assert_relative_eq!(report.exploration_rate, 0.8 * 0.998);
    }

    #[test]
    fn test_first_update_from_empty_table() {
        let mut learner = flat(0);
        let s = discretize(&NeedVector::uniform(50.0));
        let report = learner.update(&s, PrimitiveAction::UsePhone, Reward(-20.0), &s);
        assert_relative_eq!(report.new_q, -2.0);
        assert_eq!(learner.table().entry(&s, PrimitiveAction::UsePhone).unwrap().visits, 0);
        learner.update(&s, PrimitiveAction::UsePhone, Reward(-20.0), &s);
        assert_eq!(learner.table().entry(&s, PrimitiveAction::UsePhone).unwrap().visits, 1);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = LearningParams {
            discount_factor: 1.5,
            ..LearningParams::micro()
        };
        assert!(FlatLearner::seeded(params, NeedReward::default(), 0).is_err());
    }

    #[test]
    fn test_save_load_and_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("HighLevelQTable.json");
        let mut learner: QLearner<NeedState, MacroAction, MacroReward> =
            QLearner::seeded(LearningParams::macro_tier(), MacroReward::default(), 5).unwrap();
        let s = discretize(&NeedVector::uniform(10.0));
        learner.update(&s, MacroAction::SatisfyEnergy, Reward(100.0), &s);
        learner.save(&path).unwrap();

        let mut other: QLearner<NeedState, MacroAction, MacroReward> =
            QLearner::seeded(LearningParams::macro_tier(), MacroReward::default(), 6).unwrap();
        assert_eq!(other.load(&path), LoadStatus::Loaded { states: 1 });
        assert_eq!(other.table(), learner.table());
        assert_eq!(other.best_action(&s), MacroAction::SatisfyEnergy);

        learner.reset();
        assert!(learner.table().is_empty());
        assert_relative_eq!(learner.exploration_rate(), 0.8);
        assert_eq!(learner.updates(), 0);
    }

    proptest! {
        #[test]
        fn prop_exploration_never_increases(
            rewards in prop::collection::vec(-1000.0f64..1000.0, 1..300),
        ) {
            let mut learner = flat(9);
            let s = discretize(&NeedVector::uniform(50.0));
            let mut previous = learner.exploration_rate();
            for reward in rewards {
                let report = learner.update(&s, PrimitiveAction::UseSink, Reward(reward), &s);
                prop_assert!(report.exploration_rate <= previous);
                prop_assert!(report.exploration_rate >= learner.params().min_exploration_rate);
                previous = report.exploration_rate;
            }
        }
    }
}
