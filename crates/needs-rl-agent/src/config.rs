//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use needs_rl_core::{
    ConfigFile, LearningParams, MacroRewardConfig, NeedRewardConfig, Result, RlError,
};

use crate::controller::ControllerSettings;
use crate::shared::WriteMode;

/// Which learner tiers drive an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerMode {
    /// One learner over primitive actions
    Flat,
    /// Macro learner over needs plus a micro learner over affordances
    #[default]
    Hierarchical,
}

/// File names of the persisted tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFiles {
    /// Primitive-action table
    pub micro: String,
    /// Macro-action table
    pub macro_tier: String,
}

impl Default for TableFiles {
    fn default() -> Self {
        Self {
            micro: "QTable.json".to_string(),
            macro_tier: "HighLevelQTable.json".to_string(),
        }
    }
}

/// Per-agent learning and decision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learner tiers
    pub mode: ControllerMode,
    /// Seconds between decision requests
    pub decision_interval: f64,
    /// Directory holding persisted tables
    pub save_dir: PathBuf,
    /// Concurrent save discipline
    pub write_mode: WriteMode,
    /// Decision-cycle tunables
    pub controller: ControllerSettings,
    /// Primitive-action learner parameters
    pub micro: LearningParams,
    /// Macro-action learner parameters. Keys left out of a `[macro_tier]`
    /// table take the flat learner's defaults.
    pub macro_tier: LearningParams,
    /// Primitive-action reward shaping
    pub need_reward: NeedRewardConfig,
    /// Macro-action reward shaping
    pub macro_reward: MacroRewardConfig,
    /// Table file names
    pub tables: TableFiles,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: ControllerMode::default(),
            decision_interval: 2.0,
            save_dir: PathBuf::from("saved").join("qlearning"),
            write_mode: WriteMode::default(),
            controller: ControllerSettings::default(),
            micro: LearningParams::micro(),
            macro_tier: LearningParams::macro_tier(),
            need_reward: NeedRewardConfig::standard(),
            macro_reward: MacroRewardConfig::default(),
            tables: TableFiles::default(),
        }
    }
}

impl AgentConfig {
    /// Terminal penalty of the tier that makes decisions in this mode
    pub fn death_penalty(&self) -> f64 {
        match self.mode {
            ControllerMode::Flat => self.need_reward.death_penalty,
            ControllerMode::Hierarchical => self.macro_reward.death_penalty,
        }
    }
}

impl ConfigFile for AgentConfig {
    fn validate(&self) -> Result<()> {
        if self.decision_interval.is_nan() || self.decision_interval <= 0.0 {
            return Err(RlError::InvalidConfig(format!(
                "decision_interval must be positive, got {}",
                self.decision_interval
            )));
        }
        if self.controller.idle_charge_rate < 0.0 {
            return Err(RlError::InvalidConfig(format!(
                "idle_charge_rate must be >= 0, got {}",
                self.controller.idle_charge_rate
            )));
        }
        self.micro.validate()?;
        self.macro_tier.validate()?;
        self.need_reward.validate()?;
        self.macro_reward.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tables.micro, "QTable.json");
        assert_eq!(config.controller.emergency_threshold, Some(25.0));
        assert_eq!(config.death_penalty(), -1000.0);
    }

    #[test]
    fn test_toml_overrides() {
        let config = AgentConfig::from_toml_str(
            r#"
mode = "flat"
decision_interval = 1.5
write_mode = "last_write_wins"

[micro]
learning_rate = 0.3
"#,
        )
        .unwrap();
        assert_eq!(config.mode, ControllerMode::Flat);
        assert_eq!(config.write_mode, WriteMode::LastWriteWins);
        assert_eq!(config.micro.learning_rate, 0.3);
        assert_eq!(config.micro.discount_factor, 0.9);
        assert_eq!(config.macro_tier, LearningParams::macro_tier());
    }

    #[test]
    fn test_invalid_interval() {
        assert!(AgentConfig::from_toml_str("decision_interval = 0.0\n").is_err());
    }
}
