//! Flat and two-tier agent brains
//!
//! The macro tier picks a need to pursue. Its choice resolves through the
//! fixed capability lookup, and the micro tier picks which concrete
//! affordance to use for that need. Both tiers see the same transitions
//! but keep separate tables and exploration schedules.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use needs_rl_core::{
    capability_for, DiscreteAction, DiscreteState, LoadStatus, MacroAction, MacroReward,
    NeedReward, NeedState, NeedType, NeedVector, PrimitiveAction, Result, StateKey,
};

use crate::config::{AgentConfig, ControllerMode, TableFiles};
use crate::controller::{
    ControllerSettings, Decision, DecisionController, DecisionReason, TransitionEvent,
    TransitionResult,
};
use crate::learner::QLearner;
use crate::policy::EpsilonGreedy;
use crate::shared::SharedTableStore;

/// Single-tier controller over primitive actions
pub type FlatController<G = StdRng> = DecisionController<PrimitiveAction, NeedReward, G>;

/// Controller over macro actions
pub type MacroController<G = StdRng> = DecisionController<MacroAction, MacroReward, G>;

/// Decisions of both tiers for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalDecision {
    /// Need chosen by the macro tier, `None` when the agent idles
    pub macro_decision: Option<Decision<MacroAction>>,
    /// Affordance chosen by the micro tier
    pub micro_decision: Decision<PrimitiveAction>,
}

/// Results of both tiers for one event
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalResult {
    /// Macro tier result
    pub macro_result: TransitionResult<MacroAction>,
    /// Micro tier result
    pub micro_result: TransitionResult<PrimitiveAction>,
}

/// Macro and micro learners composed side by side
pub struct HierarchicalCoordinator<G = StdRng> {
    macro_tier: MacroController<G>,
    micro_tier: FlatController<G>,
    idle_threshold: Option<f64>,
}

impl<G: Rng> HierarchicalCoordinator<G> {
    /// Compose two learners. The safety net applies to the macro tier.
    /// Idle preference is decided here and executed by the micro tier,
    /// which owns the idle action.
    pub fn new(
        macro_learner: QLearner<NeedState, MacroAction, MacroReward, G>,
        micro_learner: QLearner<NeedState, PrimitiveAction, NeedReward, G>,
        settings: ControllerSettings,
    ) -> Self {
        let macro_settings = ControllerSettings {
            idle_threshold: None,
            ..settings
        };
        let micro_settings = ControllerSettings {
            emergency_threshold: None,
            idle_threshold: None,
            ..settings
        };
        Self {
            macro_tier: DecisionController::new(macro_learner, macro_settings),
            micro_tier: DecisionController::new(micro_learner, micro_settings),
            idle_threshold: settings.idle_threshold,
        }
    }

    /// Macro tier
    pub fn macro_tier(&self) -> &MacroController<G> {
        &self.macro_tier
    }

    /// Micro tier
    pub fn micro_tier(&self) -> &FlatController<G> {
        &self.micro_tier
    }

    /// Whether either tier has an action in flight
    pub fn is_busy(&self) -> bool {
        self.macro_tier.is_busy() || self.micro_tier.is_busy()
    }

    /// Whether the agent has died
    pub fn is_terminated(&self) -> bool {
        self.macro_tier.is_terminated()
    }

    /// Advance lifetime
    pub fn tick(&mut self, dt: f64) {
        self.macro_tier.tick(dt);
        self.micro_tier.tick(dt);
    }

    /// Decide both tiers. `candidates` lists affordances that serve a need;
    /// the need's capability is always offered.
    ///
    /// When every need is above the idle threshold the micro tier idles
    /// alone and no macro action is put in flight.
    pub fn request_decision<F>(&mut self, needs: &NeedVector, candidates: F) -> Option<HierarchicalDecision>
    where
        F: FnOnce(NeedType) -> Vec<PrimitiveAction>,
    {
        if self.is_busy() || self.is_terminated() {
            return None;
        }
        let satisfied = self
            .idle_threshold
            .is_some_and(|threshold| needs.all_above(threshold));
        if satisfied && self.macro_tier.emergency_need(needs).is_none() {
            let micro_decision = self.micro_tier.request_idle(needs)?;
            return Some(HierarchicalDecision {
                macro_decision: None,
                micro_decision,
            });
        }
        let macro_decision = self.macro_tier.request_decision(needs, MacroAction::all())?;
        let need = macro_decision.action.need();
        let capability = capability_for(need);
        let mut options = candidates(need);
        if !options.contains(&capability) {
            options.insert(0, capability);
        }
        let micro_decision = self.micro_tier.request_decision(needs, &options)?;
        Some(HierarchicalDecision {
            macro_decision: Some(macro_decision),
            micro_decision,
        })
    }

    /// Push an event into both tiers
    pub fn on_transition(&mut self, event: TransitionEvent, needs: &NeedVector) -> HierarchicalResult {
        HierarchicalResult {
            macro_result: self.macro_tier.on_transition(event, needs),
            micro_result: self.micro_tier.on_transition(event, needs),
        }
    }
}

/// What the environment should execute next
#[derive(Debug, Clone, PartialEq)]
pub struct BrainDecision {
    /// Primitive action to perform
    pub action: PrimitiveAction,
    /// Macro action behind it, in hierarchical mode
    pub macro_action: Option<MacroAction>,
    /// State the decision was made in
    pub state_key: StateKey,
    /// Why the deciding tier chose it
    pub reason: DecisionReason,
}

impl BrainDecision {
    /// Name of the action at the deciding tier
    pub fn label(&self) -> String {
        self.macro_action
            .map_or_else(|| self.action.to_string(), |action| action.to_string())
    }
}

/// What one event taught the brain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrainOutcome {
    /// Reward at the deciding tier, if an update happened
    pub reward: Option<f64>,
    /// Exploration rate of the deciding tier after the event
    pub exploration_rate: f64,
    /// Whether the agent died
    pub terminal: bool,
}

/// Decision-making for one agent in either configuration
pub enum AgentBrain<G = StdRng> {
    /// One learner over primitive actions
    Flat(FlatController<G>),
    /// Macro and micro learners
    Hierarchical(HierarchicalCoordinator<G>),
}

impl AgentBrain<StdRng> {
    /// Build fresh learners from configuration. `seed` makes selection reproducible.
    pub fn from_config(config: &AgentConfig, seed: Option<u64>) -> Result<Self> {
        let rng = |offset: u64| {
            seed.map_or_else(StdRng::from_entropy, |seed| {
                StdRng::seed_from_u64(seed.wrapping_add(offset))
            })
        };
        let micro = QLearner::with_policy(
            config.micro,
            NeedReward::new(config.need_reward),
            EpsilonGreedy::new(rng(0)),
        )?;
        Ok(match config.mode {
            ControllerMode::Flat => AgentBrain::Flat(DecisionController::new(micro, config.controller)),
            ControllerMode::Hierarchical => {
                let macro_learner = QLearner::with_policy(
                    config.macro_tier,
                    MacroReward::new(config.macro_reward),
                    EpsilonGreedy::new(rng(1)),
                )?;
                AgentBrain::Hierarchical(HierarchicalCoordinator::new(
                    macro_learner,
                    micro,
                    config.controller,
                ))
            }
        })
    }
}

impl<G: Rng> AgentBrain<G> {
    /// Configuration this brain runs in
    pub fn mode(&self) -> ControllerMode {
        match self {
            AgentBrain::Flat(_) => ControllerMode::Flat,
            AgentBrain::Hierarchical(_) => ControllerMode::Hierarchical,
        }
    }

    /// Whether an action is in flight
    pub fn is_busy(&self) -> bool {
        match self {
            AgentBrain::Flat(controller) => controller.is_busy(),
            AgentBrain::Hierarchical(coordinator) => coordinator.is_busy(),
        }
    }

    /// Whether the agent has died
    pub fn is_terminated(&self) -> bool {
        match self {
            AgentBrain::Flat(controller) => controller.is_terminated(),
            AgentBrain::Hierarchical(coordinator) => coordinator.is_terminated(),
        }
    }

    /// Exploration rate of the deciding tier
    pub fn exploration_rate(&self) -> f64 {
        match self {
            AgentBrain::Flat(controller) => controller.learner().exploration_rate(),
            AgentBrain::Hierarchical(coordinator) => {
                coordinator.macro_tier().learner().exploration_rate()
            }
        }
    }

    /// Advance lifetime
    pub fn tick(&mut self, dt: f64) {
        match self {
            AgentBrain::Flat(controller) => controller.tick(dt),
            AgentBrain::Hierarchical(coordinator) => coordinator.tick(dt),
        }
    }

    /// Ask for the next action.
    ///
    /// `available` is the flat learner's choice set; `candidates` lists
    /// affordances serving a need for the micro tier.
    pub fn request_decision<F>(
        &mut self,
        needs: &NeedVector,
        available: &[PrimitiveAction],
        candidates: F,
    ) -> Option<BrainDecision>
    where
        F: FnOnce(NeedType) -> Vec<PrimitiveAction>,
    {
        match self {
            AgentBrain::Flat(controller) => {
                let decision = controller.request_decision(needs, available)?;
                Some(BrainDecision {
                    action: decision.action,
                    macro_action: None,
                    state_key: decision.state.key(),
                    reason: decision.reason,
                })
            }
            AgentBrain::Hierarchical(coordinator) => {
                let HierarchicalDecision {
                    macro_decision,
                    micro_decision,
                } = coordinator.request_decision(needs, candidates)?;
                Some(BrainDecision {
                    action: micro_decision.action,
                    macro_action: macro_decision.as_ref().map(|decision| decision.action),
                    state_key: micro_decision.state.key(),
                    reason: macro_decision.map_or(micro_decision.reason, |decision| decision.reason),
                })
            }
        }
    }

    /// Push an environment event
    pub fn on_transition(&mut self, event: TransitionEvent, needs: &NeedVector) -> BrainOutcome {
        let (reward, terminal) = match self {
            AgentBrain::Flat(controller) => {
                let result = controller.on_transition(event, needs);
                (result.step().map(|step| step.update.reward), result.is_terminal())
            }
            AgentBrain::Hierarchical(coordinator) => {
                // Idle cycles only reach the micro tier
                let result = coordinator.on_transition(event, needs);
                let reward = result
                    .macro_result
                    .step()
                    .map(|step| step.update.reward)
                    .or_else(|| result.micro_result.step().map(|step| step.update.reward));
                (reward, result.macro_result.is_terminal())
            }
        };
        BrainOutcome {
            reward,
            exploration_rate: self.exploration_rate(),
            terminal,
        }
    }

    /// Replace learner tables with the shared files
    pub fn load_tables(&mut self, store: &SharedTableStore, files: &TableFiles) -> Vec<LoadStatus> {
        match self {
            AgentBrain::Flat(controller) => {
                let (table, status) = store.load(&files.micro);
                controller.learner_mut().replace_table(table);
                vec![status]
            }
            AgentBrain::Hierarchical(coordinator) => {
                let (macro_table, macro_status) = store.load(&files.macro_tier);
                coordinator.macro_tier.learner_mut().replace_table(macro_table);
                let (micro_table, micro_status) = store.load(&files.micro);
                coordinator.micro_tier.learner_mut().replace_table(micro_table);
                vec![macro_status, micro_status]
            }
        }
    }

    /// Save learner tables to the shared files
    pub fn save_tables(&self, store: &SharedTableStore, files: &TableFiles) -> Result<()> {
        match self {
            AgentBrain::Flat(controller) => {
                let report = store.save(&files.micro, controller.learner().table())?;
                info!(states = report.states, file = %files.micro, "Saved table");
            }
            AgentBrain::Hierarchical(coordinator) => {
                let report = store.save(&files.macro_tier, coordinator.macro_tier.learner().table())?;
                info!(states = report.states, file = %files.macro_tier, "Saved table");
                let report = store.save(&files.micro, coordinator.micro_tier.learner().table())?;
                info!(states = report.states, file = %files.micro, "Saved table");
            }
        }
        Ok(())
    }
}
