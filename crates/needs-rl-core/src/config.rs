//! Learning and reward configuration

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, RlError};

/// TOML load/render helpers shared by every configuration struct
pub trait ConfigFile: Serialize + DeserializeOwned {
    /// Check value ranges
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Parse and validate TOML text
    fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Learning rate, discount and exploration settings of one learner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningParams {
    /// Step size (alpha)
    pub learning_rate: f64,
    /// Discount factor (gamma)
    pub discount_factor: f64,
    /// Initial exploration rate (epsilon)
    pub exploration_rate: f64,
    /// Multiplicative decay applied after every update
    pub exploration_decay: f64,
    /// Floor for the exploration rate
    pub min_exploration_rate: f64,
}

impl LearningParams {
    /// Settings for the flat, primitive-action learner
    #[must_use]
    pub fn micro() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.8,
            exploration_decay: 0.998,
            min_exploration_rate: 0.05,
        }
    }

    /// Settings for the high-level macro-action learner
    #[must_use]
    pub fn macro_tier() -> Self {
        Self {
            learning_rate: 0.4,
            discount_factor: 0.95,
            exploration_rate: 0.8,
            exploration_decay: 0.998,
            min_exploration_rate: 0.1,
        }
    }
}

impl Default for LearningParams {
    fn default() -> Self {
        Self::micro()
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(RlError::InvalidConfig(message()))
    }
}

impl ConfigFile for LearningParams {
    fn validate(&self) -> Result<()> {
        check(self.learning_rate > 0.0 && self.learning_rate <= 1.0, || {
            format!("learning_rate must be in (0, 1], got {}", self.learning_rate)
        })?;
        check((0.0..=1.0).contains(&self.discount_factor), || {
            format!("discount_factor must be in [0, 1], got {}", self.discount_factor)
        })?;
        check(
            self.exploration_decay > 0.0 && self.exploration_decay <= 1.0,
            || format!("exploration_decay must be in (0, 1], got {}", self.exploration_decay),
        )?;
        check(
            0.0 <= self.min_exploration_rate
                && self.min_exploration_rate <= self.exploration_rate
                && self.exploration_rate <= 1.0,
            || {
                format!(
                    "expected 0 <= min_exploration_rate ({}) <= exploration_rate ({}) <= 1",
                    self.min_exploration_rate, self.exploration_rate
                )
            },
        )
    }
}

/// Reward shaping for the flat learner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedRewardConfig {
    /// Reward returned on death
    pub death_penalty: f64,
    /// Weight applied to each positive need improvement
    pub improvement_weight: f64,
    /// Level at which a need counts as satisfied
    pub satisfied_threshold: f64,
    /// Bonus for crossing into the satisfied band
    pub satisfied_bonus: f64,
    /// Level at or below which a need counts as critical
    pub critical_threshold: f64,
    /// Penalty per critical need
    pub critical_penalty: f64,
    /// Improved needs required for the holistic bonus
    pub quorum: usize,
    /// Holistic bonus
    pub quorum_bonus: f64,
    /// Constant added on every scored step
    pub step_bonus: f64,
    /// Share of the idle accumulator folded into the reward
    pub idle_fraction: f64,
}

impl NeedRewardConfig {
    /// Canonical parameter set
    #[must_use]
    pub fn standard() -> Self {
        Self {
            death_penalty: -500.0,
            improvement_weight: 0.8,
            satisfied_threshold: 90.0,
            satisfied_bonus: 25.0,
            critical_threshold: 20.0,
            critical_penalty: 15.0,
            quorum: 3,
            quorum_bonus: 10.0,
            step_bonus: 2.0,
            idle_fraction: 0.01,
        }
    }

    /// Harsher variant with doubled critical penalty and a larger death penalty
    #[must_use]
    pub fn strict() -> Self {
        Self {
            death_penalty: -1000.0,
            critical_penalty: 30.0,
            ..Self::standard()
        }
    }

    /// Look up a named preset
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }
}

impl Default for NeedRewardConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConfigFile for NeedRewardConfig {
    fn validate(&self) -> Result<()> {
        check(self.death_penalty < 0.0, || {
            format!("death_penalty must be negative, got {}", self.death_penalty)
        })?;
        check(self.improvement_weight >= 0.0, || {
            format!("improvement_weight must be >= 0, got {}", self.improvement_weight)
        })?;
        check(self.critical_threshold < self.satisfied_threshold, || {
            format!(
                "critical_threshold ({}) must be below satisfied_threshold ({})",
                self.critical_threshold, self.satisfied_threshold
            )
        })
    }
}

/// Reward shaping for the macro-action learner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroRewardConfig {
    /// Reward for a completed macro action
    pub success_reward: f64,
    /// Level the targeted need must reach for the bonus
    pub target_threshold: f64,
    /// Bonus when the targeted need reaches the threshold
    pub target_bonus: f64,
    /// Level below which a need counts as critical
    pub critical_threshold: f64,
    /// Penalty per critical need after success
    pub critical_penalty: f64,
    /// Reward for a failed macro action
    pub failure_penalty: f64,
    /// Reward returned on death
    pub death_penalty: f64,
}

impl Default for MacroRewardConfig {
    fn default() -> Self {
        Self {
            success_reward: 100.0,
            target_threshold: 80.0,
            target_bonus: 50.0,
            critical_threshold: 20.0,
            critical_penalty: 30.0,
            failure_penalty: -50.0,
            death_penalty: -1000.0,
        }
    }
}

impl ConfigFile for MacroRewardConfig {
    fn validate(&self) -> Result<()> {
        check(self.death_penalty < self.failure_penalty, || {
            format!(
                "death_penalty ({}) must be below failure_penalty ({})",
                self.death_penalty, self.failure_penalty
            )
        })
    }
}
