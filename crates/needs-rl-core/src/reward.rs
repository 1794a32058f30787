//! Reward signals and reward functions

use serde::{Deserialize, Serialize};

use crate::config::{MacroRewardConfig, NeedRewardConfig};
use crate::need::{NeedType, NeedVector};
use crate::state::{DiscreteState, NeedState};

/// Scalar reward for one transition
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Reward(pub f64);

impl Reward {
    /// Create a new reward
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the reward value
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Reward {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<Reward> for f64 {
    fn from(reward: Reward) -> Self {
        reward.0
    }
}

impl std::ops::Add for Reward {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl std::ops::AddAssign<f64> for Reward {
    fn add_assign(&mut self, value: f64) {
        self.0 += value;
    }
}

impl std::ops::Mul<f64> for Reward {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self(self.0 * scalar)
    }
}

/// Idle-time penalty charged between decisions and drained when a reward is scored
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IdleAccumulator {
    accumulated: f64,
}

impl IdleAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge `rate * dt` of idle penalty
    pub fn charge(&mut self, rate: f64, dt: f64) {
        self.accumulated -= rate * dt;
    }

    /// Current accumulated penalty (zero or negative)
    #[must_use]
    pub fn value(&self) -> f64 {
        self.accumulated
    }

    /// Take the accumulated penalty and reset to zero
    pub fn drain(&mut self) -> f64 {
        std::mem::take(&mut self.accumulated)
    }
}

/// How an executed action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether the environment reported success
    pub succeeded: bool,
    /// Need the action was meant to address
    pub target_need: Option<NeedType>,
}

/// Everything a reward function may look at for one transition
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a, S> {
    /// State before the action
    pub old_state: &'a S,
    /// State after the action
    pub new_state: &'a S,
    /// Whether the agent died
    pub died: bool,
    /// Need values after the action
    pub live: &'a NeedVector,
    /// Need values captured before the action, when tracked
    pub prior: Option<&'a NeedVector>,
    /// Outcome reported by the environment
    pub outcome: Option<ActionOutcome>,
}

/// Trait for reward functions
pub trait RewardFunction: Send + Sync {
    /// State type
    type State: DiscreteState;

    /// Score a transition. May drain `idle`.
    fn reward(&self, ctx: &TransitionContext<'_, Self::State>, idle: &mut IdleAccumulator) -> Reward;

    /// Fixed reward for a terminal transition
    fn terminal_penalty(&self) -> Reward;
}

/// Need-improvement shaping used by the flat learner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NeedReward {
    config: NeedRewardConfig,
}

impl NeedReward {
    /// Create a new reward function
    #[must_use]
    pub fn new(config: NeedRewardConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &NeedRewardConfig {
        &self.config
    }
}

impl RewardFunction for NeedReward {
    type State = NeedState;

    fn reward(&self, ctx: &TransitionContext<'_, NeedState>, idle: &mut IdleAccumulator) -> Reward {
        let cfg = &self.config;
        if ctx.died {
            return self.terminal_penalty();
        }

        let mut reward = Reward::default();
        let mut improved = 0;
        let mut critical = 0_u32;

        for need in NeedType::ALL {
            let before = ctx
                .prior
                .and_then(|prior| prior.get(need))
                .unwrap_or_else(|| ctx.old_state.level(need).midpoint());
            let after = ctx
                .live
                .get(need)
                .unwrap_or_else(|| ctx.new_state.level(need).midpoint());

            let improvement = after - before;
            if improvement > 0.0 {
                reward += improvement * cfg.improvement_weight;
                improved += 1;
            }
            if after >= cfg.satisfied_threshold && before < cfg.satisfied_threshold {
                reward += cfg.satisfied_bonus;
            }
            if after <= cfg.critical_threshold {
                critical += 1;
            }
        }

        reward += -cfg.critical_penalty * f64::from(critical);
        if improved >= cfg.quorum {
            reward += cfg.quorum_bonus;
        }
        reward += cfg.step_bonus;
        reward += idle.drain() * cfg.idle_fraction;
        reward
    }

    fn terminal_penalty(&self) -> Reward {
        Reward(self.config.death_penalty)
    }
}

/// Outcome-based reward used by the macro-action learner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacroReward {
    config: MacroRewardConfig,
}

impl MacroReward {
    /// Create a new reward function
    #[must_use]
    pub fn new(config: MacroRewardConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &MacroRewardConfig {
        &self.config
    }
}

impl RewardFunction for MacroReward {
    type State = NeedState;

    fn reward(&self, ctx: &TransitionContext<'_, NeedState>, _idle: &mut IdleAccumulator) -> Reward {
        let cfg = &self.config;
        if ctx.died {
            return self.terminal_penalty();
        }
        let Some(outcome) = ctx.outcome.filter(|outcome| outcome.succeeded) else {
            return Reward(cfg.failure_penalty);
        };

        let mut reward = Reward(cfg.success_reward);
        if let Some(need) = outcome.target_need {
            if ctx.live.value_or(need, 0.0) >= cfg.target_threshold {
                reward += cfg.target_bonus;
            }
        }
        let critical = ctx
            .live
            .iter()
            .filter(|&(_, value)| value < cfg.critical_threshold)
            .count();
        reward += -cfg.critical_penalty * f64::from(u32::try_from(critical).unwrap_or(u32::MAX));
        reward
    }

    fn terminal_penalty(&self) -> Reward {
        Reward(self.config.death_penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::discretize;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn score(
        reward_fn: &impl RewardFunction<State = NeedState>,
        prior: &NeedVector,
        live: &NeedVector,
        died: bool,
        outcome: Option<ActionOutcome>,
        idle: &mut IdleAccumulator,
    ) -> f64 {
        let old_state = discretize(prior);
        let new_state = discretize(live);
        let ctx = TransitionContext {
            old_state: &old_state,
            new_state: &new_state,
            died,
            live,
            prior: Some(prior),
            outcome,
        };
        reward_fn.reward(&ctx, idle).value()
    }

    #[test]
    fn test_idle_accumulator_drains() {
        let mut idle = IdleAccumulator::new();
        idle.charge(0.1, 2.0);
        idle.charge(0.1, 3.0);
        assert_relative_eq!(idle.value(), -0.5);
        assert_relative_eq!(idle.drain(), -0.5);
        assert_eq!(idle.value(), 0.0);
    }

    #[test]
    fn test_single_improvement() {
        let reward_fn = NeedReward::default();
        let prior = NeedVector::uniform(50.0);
        let mut live = prior;
        live.set(NeedType::Hunger, 80.0);
        let mut idle = IdleAccumulator::new();
        // 30 * 0.8 + step bonus
        assert_relative_eq!(score(&reward_fn, &prior, &live, false, None, &mut idle), 26.0);
    }

    #[test]
    fn test_decline_is_not_penalized() {
        let reward_fn = NeedReward::default();
        let prior = NeedVector::uniform(50.0);
        let live = NeedVector::uniform(45.0);
        let mut idle = IdleAccumulator::new();
        assert_relative_eq!(score(&reward_fn, &prior, &live, false, None, &mut idle), 2.0);
    }

    #[test]
    fn test_satisfied_bonus_quorum_and_critical_penalty() {
        let reward_fn = NeedReward::default();
        let prior = NeedVector::from_values([85.0, 50.0, 50.0, 50.0, 30.0, 10.0]);
        let live = NeedVector::from_values([95.0, 55.0, 55.0, 50.0, 30.0, 10.0]);
        let mut idle = IdleAccumulator::new();
        idle.charge(0.1, 100.0);
        let expected = (10.0 + 5.0 + 5.0) * 0.8 // improvements
            + 25.0 // hunger crossed 90
            - 15.0 // fun at 10
            + 10.0 // three needs improved
            + 2.0
            - 10.0 * 0.01;
        assert_relative_eq!(
            score(&reward_fn, &prior, &live, false, None, &mut idle),
            expected,
            epsilon = 1e-9
        );
        assert_eq!(idle.value(), 0.0);
    }

    #[test]
    fn test_missing_prior_uses_level_midpoint() {
        let reward_fn = NeedReward::default();
        let old_state = discretize(&NeedVector::uniform(30.0));
        let live = NeedVector::uniform(30.0);
        let new_state = discretize(&live);
        let ctx = TransitionContext {
            old_state: &old_state,
            new_state: &new_state,
            died: false,
            live: &live,
            prior: None,
            outcome: None,
        };
        let mut idle = IdleAccumulator::new();
        // each need rose from the Critical midpoint (20) to 30
        let expected = 6.0 * 10.0 * 0.8 + 10.0 + 2.0;
        assert_relative_eq!(reward_fn.reward(&ctx, &mut idle).value(), expected);
    }

    #[test]
    fn test_macro_reward_outcomes() {
        let reward_fn = MacroReward::default();
        let prior = NeedVector::uniform(50.0);
        let mut live = NeedVector::uniform(50.0);
        live.set(NeedType::Energy, 85.0);
        live.set(NeedType::Fun, 15.0);
        let mut idle = IdleAccumulator::new();

        let success = Some(ActionOutcome {
            succeeded: true,
            target_need: Some(NeedType::Energy),
        });
        assert_relative_eq!(
            score(&reward_fn, &prior, &live, false, success, &mut idle),
            100.0 + 50.0 - 30.0
        );

        let failure = Some(ActionOutcome {
            succeeded: false,
            target_need: Some(NeedType::Energy),
        });
        assert_relative_eq!(score(&reward_fn, &prior, &live, false, failure, &mut idle), -50.0);
        assert_relative_eq!(score(&reward_fn, &prior, &live, true, success, &mut idle), -1000.0);
    }

    proptest! {
        #[test]
        fn prop_death_returns_terminal_penalty(
            prior in proptest::array::uniform6(0.0f64..=100.0),
            live in proptest::array::uniform6(0.0f64..=100.0),
        ) {
            let mut idle = IdleAccumulator::new();
            let prior = NeedVector::from_values(prior);
            let live = NeedVector::from_values(live);
            let standard = NeedReward::default();
            let strict = NeedReward::new(NeedRewardConfig::strict());
            prop_assert_eq!(score(&standard, &prior, &live, true, None, &mut idle), -500.0);
            prop_assert_eq!(score(&strict, &prior, &live, true, None, &mut idle), -1000.0);
        }

        #[test]
        fn prop_reward_is_finite(
            prior in proptest::array::uniform6(0.0f64..=100.0),
            live in proptest::array::uniform6(0.0f64..=100.0),
        ) {
            let mut idle = IdleAccumulator::new();
            let value = score(
                &NeedReward::default(),
                &NeedVector::from_values(prior),
                &NeedVector::from_values(live),
                false,
                None,
                &mut idle,
            );
            prop_assert!(value.is_finite());
        }
    }
}
