//! Core tabular reinforcement learning types for needs-driven agents
//!
//! This crate holds the data model and the pure algorithms: needs and their
//! discretization into state keys, the sparse Q-table, reward shaping, the
//! exploration schedule and table persistence.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod error;
pub mod need;
pub mod persistence;
pub mod reward;
pub mod schedule;
pub mod state;
pub mod value;

// Re-export core traits and types
pub use action::{capability_for, DiscreteAction, MacroAction, PrimitiveAction};
pub use config::{ConfigFile, LearningParams, MacroRewardConfig, NeedRewardConfig};
pub use error::{Result, RlError};
pub use need::{NeedLevel, NeedType, NeedVector, NEED_MAX, NEED_MIN};
pub use persistence::LoadStatus;
pub use reward::{
    ActionOutcome, IdleAccumulator, MacroReward, NeedReward, Reward, RewardFunction,
    TransitionContext,
};
pub use schedule::{ExplorationSchedule, Schedule};
pub use state::{discretize, key_order, DiscreteState, NeedState, StateKey};
pub use value::{QTable, QValue, TableStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        discretize, DiscreteAction, DiscreteState, LearningParams, MacroAction, NeedState,
        NeedType, NeedVector, PrimitiveAction, QTable, Result, Reward, RewardFunction, StateKey,
    };
}
