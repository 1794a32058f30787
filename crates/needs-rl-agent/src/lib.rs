//! Q-learning agents for needs-driven simulations
//!
//! This crate wires the core table, schedule and reward types into agents:
//! - [`QLearner`], the generic one-step learner
//! - [`DecisionController`], the busy-guarded decision cycle with safety net
//! - [`AgentBrain`], flat or two-tier (need, then affordance) composition
//! - [`SharedTableStore`], table files shared by a population of agents
//! - Record sinks and per-generation statistics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod hierarchy;
pub mod learner;
pub mod policy;
pub mod provider;
pub mod shared;
pub mod sink;
pub mod stats;

// Re-export agents
pub use controller::{
    ControllerSettings, Decision, DecisionController, DecisionReason, LearnedStep,
    TransitionEvent, TransitionResult,
};
pub use hierarchy::{
    AgentBrain, BrainDecision, BrainOutcome, FlatController, HierarchicalCoordinator,
    HierarchicalDecision, HierarchicalResult, MacroController,
};
pub use learner::{QLearner, UpdateReport};

// Re-export configuration and persistence
pub use config::{AgentConfig, ControllerMode, TableFiles};
pub use shared::{SaveReport, SharedTableStore, WriteMode};

// Re-export policy components
pub use policy::{EpsilonGreedy, Greedy, Policy};
pub use provider::NeedProvider;

// Re-export record keeping
pub use sink::{
    AgentId, CsvSink, DeathRecord, DecisionRecord, JsonlSink, LogSink, MemorySink, NullSink,
    SinkRecord, CSV_HEADER,
};
pub use stats::{GenerationLog, GenerationStats, GenerationTracker, RunSummary, GENERATION_HEADER};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentBrain, AgentConfig, ControllerMode, ControllerSettings, DecisionController,
        EpsilonGreedy, LogSink, NeedProvider, QLearner, SharedTableStore, TransitionEvent,
        WriteMode,
    };
    pub use needs_rl_core::prelude::*;
}
