//! Simulated household for needs-driven agents
//!
//! This crate provides the collaborators the learners run against:
//! - Need dynamics with a generation-dependent difficulty curve
//! - Interactable objects with occupancy and timed interactions
//! - Straight-line navigation with acceptance and reach distances
//! - A household world that reports what happened as explicit events
//! - A generation runner in simulated or real time

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod household;
pub mod navigation;
pub mod needs;
pub mod objects;
pub mod runner;

// Re-export the world
pub use household::{Activity, Household, Resident, WorldEvent, WorldEventKind};
pub use navigation::{MoveProgress, NavigationService, StraightLineNavigator};
pub use needs::{difficulty, start_value, NeedsModel, CRITICAL_VALUE};
pub use objects::{default_layout, Interactable, NeedModifier, ObjectId, ObjectSpec, Position};

// Re-export configuration and the runner
pub use config::{EngineConfig, RunConfig, WorldConfig};
pub use runner::{AgentSlot, Simulation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{EngineConfig, Household, NeedsModel, Simulation, WorldConfig, WorldEvent};
    pub use needs_rl_agent::prelude::*;
}
