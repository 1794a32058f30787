//! Busy/idle guarded decision cycle around one learner
//!
//! The environment asks for decisions on a timer and pushes events back
//! through [`DecisionController::on_transition`]. While an action is in
//! flight, new decision requests are suppressed rather than queued.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use needs_rl_core::{
    discretize, ActionOutcome, DiscreteAction, IdleAccumulator, NeedState, NeedType, NeedVector,
    PrimitiveAction, RewardFunction, TransitionContext,
};

use crate::learner::{QLearner, UpdateReport};

/// Decision-cycle tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Lowest need below this value forces the action for that need.
    /// `0.0` disables the safety net as effectively as `None`.
    pub emergency_threshold: Option<f64>,
    /// Choose idle when every need is above this value
    pub idle_threshold: Option<f64>,
    /// Idle penalty charged per second of lifetime
    pub idle_charge_rate: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            emergency_threshold: Some(25.0),
            idle_threshold: None,
            idle_charge_rate: 0.1,
        }
    }
}

/// Why an action was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionReason {
    /// Epsilon-greedy selection
    Policy,
    /// Safety net for a need close to depletion
    Emergency(NeedType),
    /// Every need comfortably satisfied
    IdlePreference,
}

/// A decision handed to the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Decision<A> {
    /// Chosen action
    pub action: A,
    /// Affordance to execute, `None` to stay idle
    pub target: Option<PrimitiveAction>,
    /// State the decision was made in
    pub state: NeedState,
    /// How the action was chosen
    pub reason: DecisionReason,
}

/// Event pushed by the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionEvent {
    /// The in-flight action ended
    ActionFinished {
        /// Whether it achieved its goal
        succeeded: bool,
    },
    /// The agent died
    Died,
}

/// One applied learning step
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedStep<A> {
    /// Action that was learned from
    pub action: A,
    /// How it had been chosen
    pub reason: DecisionReason,
    /// Update details
    pub update: UpdateReport,
}

/// Result of pushing an event into a controller
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult<A> {
    /// No decision was in flight; nothing learned
    Ignored,
    /// The in-flight decision was scored and learned
    Learned(LearnedStep<A>),
    /// The agent died. The table should now be saved and the controller dropped.
    Terminated(Option<LearnedStep<A>>),
}

impl<A> TransitionResult<A> {
    /// Learning step, if one was applied
    pub fn step(&self) -> Option<&LearnedStep<A>> {
        match self {
            TransitionResult::Learned(step) | TransitionResult::Terminated(Some(step)) => Some(step),
            _ => None,
        }
    }

    /// Whether this result ends the episode
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransitionResult::Terminated(_))
    }
}

#[derive(Debug, Clone)]
struct InFlight<A> {
    action: A,
    reason: DecisionReason,
    state: NeedState,
    needs: NeedVector,
}

/// Decision controller wrapping one learner over [`NeedState`]
pub struct DecisionController<A, R, G = StdRng>
where
    A: DiscreteAction,
{
    learner: QLearner<NeedState, A, R, G>,
    settings: ControllerSettings,
    in_flight: Option<InFlight<A>>,
    idle: IdleAccumulator,
    terminated: bool,
}

impl<A, R, G> DecisionController<A, R, G>
where
    A: DiscreteAction,
    R: RewardFunction<State = NeedState>,
    G: Rng,
{
    /// Create a new controller
    pub fn new(learner: QLearner<NeedState, A, R, G>, settings: ControllerSettings) -> Self {
        Self {
            learner,
            settings,
            in_flight: None,
            idle: IdleAccumulator::new(),
            terminated: false,
        }
    }

    /// Whether an action is in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the agent has died
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Action currently in flight
    pub fn in_flight_action(&self) -> Option<A> {
        self.in_flight.as_ref().map(|pending| pending.action)
    }

    /// Wrapped learner
    pub fn learner(&self) -> &QLearner<NeedState, A, R, G> {
        &self.learner
    }

    /// Mutable access to the wrapped learner
    pub fn learner_mut(&mut self) -> &mut QLearner<NeedState, A, R, G> {
        &mut self.learner
    }

    /// Consume the controller, keeping the learner
    pub fn into_learner(self) -> QLearner<NeedState, A, R, G> {
        self.learner
    }

    /// Settings in use
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Pending idle penalty
    pub fn idle_penalty(&self) -> f64 {
        self.idle.value()
    }

    /// Advance lifetime by `dt` seconds, charging idle penalty
    pub fn tick(&mut self, dt: f64) {
        if !self.terminated {
            self.idle.charge(self.settings.idle_charge_rate, dt);
        }
    }

    /// Ask for the next action. Returns `None` while busy or after death.
    pub fn request_decision(&mut self, needs: &NeedVector, available: &[A]) -> Option<Decision<A>> {
        if self.terminated {
            return None;
        }
        if let Some(pending) = &self.in_flight {
            debug!(action = %pending.action, "Decision suppressed, action in flight");
            return None;
        }

        let state = discretize(needs);
        let (action, reason) = if let Some(need) = self.emergency_need(needs) {
            (A::for_need(need), DecisionReason::Emergency(need))
        } else if let Some(idle) = A::idle().filter(|_| self.prefers_idle(needs)) {
            (idle, DecisionReason::IdlePreference)
        } else {
            (
                self.learner.choose_action(&state, available),
                DecisionReason::Policy,
            )
        };

        Some(self.begin(action, reason, state, needs))
    }

    /// Put the idle action in flight without consulting the policy.
    /// Returns `None` while busy, after death, or if `A` has no idle member.
    pub fn request_idle(&mut self, needs: &NeedVector) -> Option<Decision<A>> {
        if self.terminated || self.in_flight.is_some() {
            return None;
        }
        let idle = A::idle()?;
        Some(self.begin(idle, DecisionReason::IdlePreference, discretize(needs), needs))
    }

    fn begin(&mut self, action: A, reason: DecisionReason, state: NeedState, needs: &NeedVector) -> Decision<A> {
        self.in_flight = Some(InFlight {
            action,
            reason,
            state,
            needs: *needs,
        });
        Decision {
            action,
            target: action.target(),
            state,
            reason,
        }
    }

    /// Push an environment event with the needs observed at that moment
    pub fn on_transition(&mut self, event: TransitionEvent, needs: &NeedVector) -> TransitionResult<A> {
        if self.terminated {
            return TransitionResult::Ignored;
        }
        match event {
            TransitionEvent::ActionFinished { succeeded } => {
                let Some(pending) = self.in_flight.take() else {
                    debug!("Completion without an in-flight decision, ignored");
                    return TransitionResult::Ignored;
                };
                TransitionResult::Learned(self.learn(pending, needs, Some(succeeded), false))
            }
            TransitionEvent::Died => {
                self.terminated = true;
                let step = self
                    .in_flight
                    .take()
                    .map(|pending| self.learn(pending, needs, None, true));
                if step.is_none() {
                    warn!("Agent died with no decision in flight, no terminal update");
                }
                TransitionResult::Terminated(step)
            }
        }
    }

    fn learn(
        &mut self,
        pending: InFlight<A>,
        needs: &NeedVector,
        succeeded: Option<bool>,
        died: bool,
    ) -> LearnedStep<A> {
        let target_need = match pending.reason {
            DecisionReason::Emergency(need) => Some(need),
            _ => pending.action.addresses(),
        };
        let new_state = discretize(needs);
        let ctx = TransitionContext {
            old_state: &pending.state,
            new_state: &new_state,
            died,
            live: needs,
            prior: Some(&pending.needs),
            outcome: succeeded.map(|succeeded| ActionOutcome {
                succeeded,
                target_need,
            }),
        };
        let update = self.learner.learn(pending.action, &ctx, &mut self.idle);
        LearnedStep {
            action: pending.action,
            reason: pending.reason,
            update,
        }
    }

    /// Need the safety net would force, if any
    pub fn emergency_need(&self, needs: &NeedVector) -> Option<NeedType> {
        let threshold = self.settings.emergency_threshold?;
        needs
            .lowest()
            .filter(|&(_, value)| value < threshold)
            .map(|(need, _)| need)
    }

    fn prefers_idle(&self, needs: &NeedVector) -> bool {
        self.settings
            .idle_threshold
            .is_some_and(|threshold| needs.all_above(threshold))
    }
}
