//! World, run and engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use needs_rl_agent::AgentConfig;
use needs_rl_core::{ConfigFile, Result, RlError};

use crate::navigation::StraightLineNavigator;
use crate::objects::{default_layout, ObjectSpec};

/// Household world settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Need decay per second before the difficulty multiplier
    pub base_decay_rate: f64,
    /// Default seconds per interaction
    pub interaction_duration: f64,
    /// Walking speed in units per second
    pub walk_speed: f64,
    /// Distance at which a move counts as arrived
    pub acceptance_radius: f64,
    /// Distance under which an object can be used
    pub reach_distance: f64,
    /// Seconds before a move is abandoned
    pub move_timeout: f64,
    /// Half-width of the square agents spawn in
    pub spawn_extent: f64,
    /// Seed for spawn positions and action selection
    pub seed: Option<u64>,
    /// Placed objects
    pub objects: Vec<ObjectSpec>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let nav = StraightLineNavigator::default();
        Self {
            base_decay_rate: 1.0,
            interaction_duration: 10.0,
            walk_speed: nav.speed,
            acceptance_radius: nav.acceptance_radius,
            reach_distance: nav.reach_distance,
            move_timeout: nav.timeout,
            spawn_extent: 600.0,
            seed: None,
            objects: default_layout(),
        }
    }
}

impl WorldConfig {
    /// Navigator matching these settings
    pub fn navigator(&self) -> StraightLineNavigator {
        StraightLineNavigator {
            speed: self.walk_speed,
            acceptance_radius: self.acceptance_radius,
            reach_distance: self.reach_distance,
            timeout: self.move_timeout,
        }
    }
}

impl ConfigFile for WorldConfig {
    fn validate(&self) -> Result<()> {
        let positive = [
            ("base_decay_rate", self.base_decay_rate),
            ("interaction_duration", self.interaction_duration),
            ("walk_speed", self.walk_speed),
            ("move_timeout", self.move_timeout),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(RlError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        if self.acceptance_radius > self.reach_distance {
            return Err(RlError::InvalidConfig(format!(
                "acceptance_radius {} exceeds reach_distance {}",
                self.acceptance_radius, self.reach_distance
            )));
        }
        Ok(())
    }
}

/// Generation runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Agents alive at once
    pub agents: u32,
    /// Stop after this many lifetimes end
    pub max_generations: Option<u32>,
    /// Stop after this many seconds of simulated (or wall-clock, in real time) running
    pub max_seconds: Option<f64>,
    /// Seconds between a death and the respawn
    pub respawn_delay: f64,
    /// Simulation step in seconds
    pub tick_seconds: f64,
    /// Directory for decision and generation logs; no logs when absent
    pub log_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            agents: 3,
            max_generations: Some(20),
            max_seconds: None,
            respawn_delay: 2.0,
            tick_seconds: 0.1,
            log_dir: None,
        }
    }
}

impl ConfigFile for RunConfig {
    fn validate(&self) -> Result<()> {
        if self.agents == 0 {
            return Err(RlError::InvalidConfig("agents must be at least 1".to_string()));
        }
        if self.max_generations.is_none() && self.max_seconds.is_none() {
            return Err(RlError::InvalidConfig(
                "set max_generations or max_seconds to bound the run".to_string(),
            ));
        }
        if self.tick_seconds.is_nan() || self.tick_seconds <= 0.0 {
            return Err(RlError::InvalidConfig(format!(
                "tick_seconds must be positive, got {}",
                self.tick_seconds
            )));
        }
        if self.respawn_delay < 0.0 {
            return Err(RlError::InvalidConfig(format!(
                "respawn_delay must be >= 0, got {}",
                self.respawn_delay
            )));
        }
        Ok(())
    }
}

/// Everything a training run needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Learning and decision settings
    pub agent: AgentConfig,
    /// Household settings
    pub world: WorldConfig,
    /// Runner settings
    pub run: RunConfig,
}

impl ConfigFile for EngineConfig {
    fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        self.world.validate()?;
        self.run.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
[agent]
mode = "flat"

[run]
agents = 5
max_generations = 100
"#,
        )
        .unwrap();
        assert_eq!(config.run.agents, 5);
        assert_eq!(config.run.max_generations, Some(100));
        assert_eq!(config.world.objects.len(), default_layout().len());
        assert_eq!(config.agent.decision_interval, 2.0);
    }

    #[test]
    fn test_unbounded_run_rejected() {
        let config = RunConfig {
            max_generations: None,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_acceptance_beyond_reach_rejected() {
        let config = WorldConfig {
            acceptance_radius: 400.0,
            ..WorldConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
