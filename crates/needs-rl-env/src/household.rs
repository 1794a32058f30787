//! Household world: residents, objects and the events they produce
//!
//! The world never calls into learners. [`Household::tick`] returns the
//! events that happened and the runner pushes them into the right
//! controller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use needs_rl_agent::{AgentId, NeedProvider, TransitionEvent};
use needs_rl_core::{DiscreteAction, NeedType, NeedVector, PrimitiveAction, Result, RlError};

use crate::config::WorldConfig;
use crate::navigation::{MoveProgress, NavigationService, StraightLineNavigator};
use crate::needs::NeedsModel;
use crate::objects::{nearest_free, Interactable, ObjectId, Position};

/// What a resident is doing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    /// Waiting for the next decision
    Idle,
    /// Walking to an object
    Moving {
        /// Destination
        object: ObjectId,
        /// Seconds spent walking
        elapsed: f64,
    },
    /// Using an object
    Interacting {
        /// Object in use
        object: ObjectId,
        /// Seconds left
        remaining: f64,
    },
}

/// One agent living in the world
#[derive(Debug, Clone)]
pub struct Resident {
    id: AgentId,
    needs: NeedsModel,
    position: Position,
    activity: Activity,
    lifetime: f64,
}

impl Resident {
    /// Agent identifier
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Need state
    pub fn needs(&self) -> &NeedsModel {
        &self.needs
    }

    /// Current location
    pub fn position(&self) -> Position {
        self.position
    }

    /// Current activity
    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Seconds alive
    pub fn lifetime(&self) -> f64 {
        self.lifetime
    }
}

/// Something that happened to a resident
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEventKind {
    /// A move ended; the interaction starts next when `succeeded`
    MoveFinished {
        /// Whether the object was reached
        succeeded: bool,
    },
    /// The action ended
    InteractionFinished {
        /// Whether the object was used
        succeeded: bool,
    },
    /// A need reached zero
    Died {
        /// First depleted need
        cause: NeedType,
    },
}

/// Event addressed to one resident
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldEvent {
    /// Resident concerned
    pub agent: AgentId,
    /// What happened
    pub kind: WorldEventKind,
}

impl WorldEvent {
    /// Transition to push into the resident's controller, if any
    pub fn transition(&self) -> Option<TransitionEvent> {
        match self.kind {
            WorldEventKind::MoveFinished { succeeded: true } => None,
            WorldEventKind::MoveFinished { succeeded: false } => {
                Some(TransitionEvent::ActionFinished { succeeded: false })
            }
            WorldEventKind::InteractionFinished { succeeded } => {
                Some(TransitionEvent::ActionFinished { succeeded })
            }
            WorldEventKind::Died { .. } => Some(TransitionEvent::Died),
        }
    }
}

/// Simulated household
pub struct Household<N = StraightLineNavigator> {
    config: WorldConfig,
    navigator: N,
    objects: Vec<Interactable>,
    residents: BTreeMap<AgentId, Resident>,
    rng: StdRng,
}

impl Household<StraightLineNavigator> {
    /// Build a world from configuration
    pub fn new(config: WorldConfig) -> Self {
        let navigator = config.navigator();
        Self::with_navigator(config, navigator)
    }
}

impl<N: NavigationService> Household<N> {
    /// Build a world with a custom navigation service
    pub fn with_navigator(config: WorldConfig, navigator: N) -> Self {
        let objects = config
            .objects
            .iter()
            .cloned()
            .enumerate()
            .map(|(id, spec)| Interactable::new(id, spec, config.interaction_duration))
            .collect();
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            config,
            navigator,
            objects,
            residents: BTreeMap::new(),
            rng,
        }
    }

    /// World settings
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Placed objects
    pub fn objects(&self) -> &[Interactable] {
        &self.objects
    }

    /// Living residents
    pub fn residents(&self) -> impl Iterator<Item = &Resident> {
        self.residents.values()
    }

    /// One resident
    pub fn resident(&self, agent: AgentId) -> Option<&Resident> {
        self.residents.get(&agent)
    }

    /// Needs of a resident
    pub fn needs(&self, agent: AgentId) -> Option<NeedVector> {
        self.residents.get(&agent).map(|resident| resident.needs.snapshot())
    }

    /// Place a new resident at a random position
    pub fn spawn(&mut self, agent: AgentId, generation: u32) -> &Resident {
        let extent = self.config.spawn_extent;
        let position = if extent > 0.0 {
            Position::new(
                self.rng.gen_range(-extent..=extent),
                self.rng.gen_range(-extent..=extent),
            )
        } else {
            Position::default()
        };
        self.spawn_at(agent, generation, position)
    }

    /// Place a new resident at `position`
    pub fn spawn_at(&mut self, agent: AgentId, generation: u32, position: Position) -> &Resident {
        let needs = NeedsModel::spawn(generation, self.config.base_decay_rate);
        info!(
            agent,
            generation,
            start = needs.values().average(),
            decay = needs.decay_per_second(),
            "Spawned resident"
        );
        self.insert(Resident {
            id: agent,
            needs,
            position,
            activity: Activity::Idle,
            lifetime: 0.0,
        })
    }

    /// Place a resident with explicit needs
    pub fn spawn_with(&mut self, agent: AgentId, needs: NeedsModel, position: Position) -> &Resident {
        self.insert(Resident {
            id: agent,
            needs,
            position,
            activity: Activity::Idle,
            lifetime: 0.0,
        })
    }

    fn insert(&mut self, resident: Resident) -> &Resident {
        let agent = resident.id;
        if let Some(previous) = self.residents.insert(agent, resident) {
            self.release(previous.id);
        }
        &self.residents[&agent]
    }

    /// Remove a resident, freeing any object it holds
    pub fn remove(&mut self, agent: AgentId) -> Option<Resident> {
        self.release(agent);
        self.residents.remove(&agent)
    }

    fn release(&mut self, agent: AgentId) {
        for object in &mut self.objects {
            object.release(agent);
        }
    }

    /// Primitive actions backed by at least one object, plus the no-op
    pub fn available_actions(&self) -> Vec<PrimitiveAction> {
        PrimitiveAction::all()
            .iter()
            .copied()
            .filter(|&action| {
                action == PrimitiveAction::no_op()
                    || self.objects.iter().any(|object| object.affordance() == action)
            })
            .collect()
    }

    /// Affordances whose objects raise `need`, in action order
    pub fn candidates_for(&self, need: NeedType) -> Vec<PrimitiveAction> {
        PrimitiveAction::all()
            .iter()
            .copied()
            .filter(|&action| {
                self.objects
                    .iter()
                    .any(|object| object.affordance() == action && object.spec().serves(need))
            })
            .collect()
    }

    /// Start an action for a resident. Returns an event when it ends at once.
    pub fn begin_action(&mut self, agent: AgentId, action: PrimitiveAction) -> Result<Option<WorldEvent>> {
        let resident = self
            .residents
            .get(&agent)
            .ok_or_else(|| RlError::Environment(format!("no resident with id {agent}")))?;
        if resident.activity != Activity::Idle {
            return Err(RlError::Environment(format!(
                "resident {agent} is busy with {:?}",
                resident.activity
            )));
        }
        if action == PrimitiveAction::no_op() {
            return Ok(Some(WorldEvent {
                agent,
                kind: WorldEventKind::InteractionFinished { succeeded: true },
            }));
        }
        let Some(object) = nearest_free(&self.objects, action, resident.position) else {
            warn!(agent, %action, "No free object for action");
            return Ok(Some(WorldEvent {
                agent,
                kind: WorldEventKind::MoveFinished { succeeded: false },
            }));
        };
        debug!(agent, %action, object = %object.spec().name, "Moving to object");
        let object = object.id();
        if let Some(resident) = self.residents.get_mut(&agent) {
            resident.activity = Activity::Moving {
                object,
                elapsed: 0.0,
            };
        }
        Ok(None)
    }

    /// Advance the world by `dt` seconds
    pub fn tick(&mut self, dt: f64) -> Vec<WorldEvent> {
        let mut events = Vec::new();
        let agents: Vec<AgentId> = self.residents.keys().copied().collect();
        for agent in agents {
            if let Some(event) = self.tick_resident(agent, dt) {
                events.push(event);
            }
        }
        events
    }

    fn tick_resident(&mut self, agent: AgentId, dt: f64) -> Option<WorldEvent> {
        let resident = self.residents.get_mut(&agent)?;
        if !resident.needs.is_alive() {
            return None;
        }
        resident.lifetime += dt;
        if let Some(cause) = resident.needs.tick(dt) {
            resident.activity = Activity::Idle;
            self.release(agent);
            info!(agent, %cause, "Resident died");
            return Some(WorldEvent {
                agent,
                kind: WorldEventKind::Died { cause },
            });
        }

        match resident.activity {
            Activity::Idle => None,
            Activity::Moving { object, elapsed } => {
                let target = self.objects[object].position();
                match self.navigator.advance(resident.position, target, elapsed, dt) {
                    MoveProgress::Moving(position) => {
                        resident.position = position;
                        resident.activity = Activity::Moving {
                            object,
                            elapsed: elapsed + dt,
                        };
                        None
                    }
                    MoveProgress::Finished { position, succeeded } => {
                        resident.position = position;
                        resident.activity = Activity::Idle;
                        if !succeeded {
                            return Some(WorldEvent {
                                agent,
                                kind: WorldEventKind::MoveFinished { succeeded: false },
                            });
                        }
                        let target = &mut self.objects[object];
                        if !target.start_interaction(agent) {
                            debug!(agent, object = %target.spec().name, "Object became occupied");
                            return Some(WorldEvent {
                                agent,
                                kind: WorldEventKind::InteractionFinished { succeeded: false },
                            });
                        }
                        resident.activity = Activity::Interacting {
                            object,
                            remaining: target.duration(),
                        };
                        None
                    }
                }
            }
            Activity::Interacting { object, remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    resident.activity = Activity::Interacting { object, remaining };
                    return None;
                }
                let target = &mut self.objects[object];
                for modifier in &target.spec().modifiers {
                    resident.needs.modify(modifier.need, modifier.amount);
                }
                target.release(agent);
                resident.activity = Activity::Idle;
                debug!(agent, object = %target.spec().name, "Interaction finished");
                Some(WorldEvent {
                    agent,
                    kind: WorldEventKind::InteractionFinished { succeeded: true },
                })
            }
        }
    }
}
