//! Generation runner
//!
//! Spawns a population of agents into one household, loads the shared
//! tables at every spawn, saves them at every death and respawns the agent
//! one generation later. Runs either in simulated time (as fast as
//! possible, deterministic with a seed) or in real time on a tokio interval.

use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use needs_rl_agent::{
    AgentBrain, AgentId, BrainDecision, DeathRecord, DecisionRecord, GenerationLog, GenerationStats,
    GenerationTracker, LogSink, RunSummary, SharedTableStore, SinkRecord, TransitionEvent,
};
use needs_rl_core::{ConfigFile, DiscreteAction, LoadStatus, NeedType, Result};

use crate::config::EngineConfig;
use crate::household::{Household, WorldEvent, WorldEventKind};

/// Learner and bookkeeping of one living agent
pub struct AgentSlot {
    id: AgentId,
    generation: u32,
    brain: AgentBrain,
    next_decision: f64,
    actions: u32,
    pending: Option<BrainDecision>,
}

impl AgentSlot {
    /// Agent identifier
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current generation
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Decision-making state
    pub fn brain(&self) -> &AgentBrain {
        &self.brain
    }

    /// Completed decisions this lifetime
    pub fn actions(&self) -> u32 {
        self.actions
    }
}

/// Population of agents learning in one household
pub struct Simulation<K = Box<dyn LogSink>> {
    config: EngineConfig,
    world: Household,
    store: SharedTableStore,
    slots: BTreeMap<AgentId, AgentSlot>,
    respawns: Vec<(f64, AgentId, u32)>,
    sink: K,
    generation_log: Option<GenerationLog>,
    tracker: GenerationTracker,
    clock: f64,
    started: bool,
}

impl<K: LogSink> Simulation<K> {
    /// Create a simulation writing decision and death records to `sink`
    pub fn new(config: EngineConfig, sink: K) -> Result<Self> {
        config.validate()?;
        let world = Household::new(config.world.clone());
        let store = SharedTableStore::new(config.agent.save_dir.clone(), config.agent.write_mode);
        Ok(Self {
            config,
            world,
            store,
            slots: BTreeMap::new(),
            respawns: Vec::new(),
            sink,
            generation_log: None,
            tracker: GenerationTracker::new(),
            clock: 0.0,
            started: false,
        })
    }

    /// Also append one row per finished lifetime to `log`
    #[must_use]
    pub fn with_generation_log(mut self, log: GenerationLog) -> Self {
        self.generation_log = Some(log);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Simulated seconds since start
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// The household
    pub fn world(&self) -> &Household {
        &self.world
    }

    /// Shared table files
    pub fn store(&self) -> &SharedTableStore {
        &self.store
    }

    /// Living agents
    pub fn agents(&self) -> impl Iterator<Item = &AgentSlot> {
        self.slots.values()
    }

    /// Record sink
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Consume the simulation, keeping the sink
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Totals so far
    pub fn summary(&self) -> RunSummary {
        self.tracker.summary()
    }

    /// Whether the generation or time budget is spent
    pub fn is_finished(&self) -> bool {
        let generations_done = self
            .config
            .run
            .max_generations
            .is_some_and(|max| self.tracker.completed() >= max);
        let time_done = self.config.run.max_seconds.is_some_and(|max| self.clock >= max);
        generations_done || time_done
    }

    /// Spawn the initial population. Called by the run loops if needed.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        info!(
            agents = self.config.run.agents,
            mode = ?self.config.agent.mode,
            run_id = %self.tracker.run_id(),
            "Simulation started"
        );
        for id in 0..self.config.run.agents {
            self.spawn(id, 1)?;
        }
        Ok(())
    }

    fn spawn(&mut self, id: AgentId, generation: u32) -> Result<()> {
        let seed = self
            .config
            .world
            .seed
            .map(|seed| seed ^ (u64::from(id) << 32) ^ u64::from(generation));
        let mut brain = AgentBrain::from_config(&self.config.agent, seed)?;
        for status in brain.load_tables(&self.store, &self.config.agent.tables) {
            if let LoadStatus::Loaded { states } = status {
                debug!(agent = id, states, "Loaded shared table");
            }
        }
        self.world.spawn(id, generation);
        self.slots.insert(
            id,
            AgentSlot {
                id,
                generation,
                brain,
                next_decision: self.clock + self.config.agent.decision_interval,
                actions: 0,
                pending: None,
            },
        );
        Ok(())
    }

    /// Advance everything by `dt` seconds
    pub fn step(&mut self, dt: f64) -> Result<()> {
        self.start()?;
        self.clock += dt;

        let clock = self.clock;
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.respawns.drain(..).partition(|&(at, _, _)| at <= clock);
        self.respawns = waiting;
        for (_, id, generation) in due {
            self.spawn(id, generation)?;
        }

        for slot in self.slots.values_mut() {
            slot.brain.tick(dt);
        }
        for event in self.world.tick(dt) {
            self.handle_event(event)?;
        }

        let interval = self.config.agent.decision_interval;
        let due: Vec<AgentId> = self
            .slots
            .values_mut()
            .filter(|slot| slot.next_decision <= clock)
            .map(|slot| {
                slot.next_decision += interval;
                slot.id
            })
            .collect();
        for id in due {
            self.decide(id)?;
        }
        Ok(())
    }

    fn decide(&mut self, id: AgentId) -> Result<()> {
        let Some(needs) = self.world.needs(id) else {
            return Ok(());
        };
        let Some(slot) = self.slots.get_mut(&id) else {
            return Ok(());
        };
        let available = self.world.available_actions();
        let world = &self.world;
        let Some(decision) = slot
            .brain
            .request_decision(&needs, &available, |need| world.candidates_for(need))
        else {
            return Ok(());
        };
        debug!(
            agent = id,
            action = %decision.label(),
            state = %decision.state_key,
            reason = ?decision.reason,
            "Decision"
        );
        let action = decision.action;
        slot.pending = Some(decision);
        if let Some(event) = self.world.begin_action(id, action)? {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WorldEvent) -> Result<()> {
        let Some(transition) = event.transition() else {
            return Ok(());
        };
        let Some(resident) = self.world.resident(event.agent) else {
            return Ok(());
        };
        let needs = *resident.needs().values();
        let lifetime = resident.lifetime();
        let Some(slot) = self.slots.get_mut(&event.agent) else {
            return Ok(());
        };
        let outcome = slot.brain.on_transition(transition, &needs);

        if let TransitionEvent::ActionFinished { .. } = transition {
            if let (Some(reward), Some(decision)) = (outcome.reward, slot.pending.take()) {
                slot.actions += 1;
                self.sink.record(&SinkRecord::Decision(DecisionRecord {
                    timestamp: Utc::now(),
                    agent_id: slot.id,
                    generation: slot.generation,
                    action: decision.action.ordinal(),
                    action_name: decision.label(),
                    state_key: decision.state_key.to_string(),
                    reward,
                    lifetime,
                    needs,
                }))?;
            }
        }
        if outcome.terminal {
            let cause = match event.kind {
                WorldEventKind::Died { cause } => Some(cause),
                _ => needs.first_depleted(),
            };
            self.finish_life(event.agent, cause, lifetime)?;
        }
        Ok(())
    }

    fn finish_life(&mut self, id: AgentId, cause: Option<NeedType>, lifetime: f64) -> Result<()> {
        let Some(slot) = self.slots.remove(&id) else {
            return Ok(());
        };
        let needs = self
            .world
            .remove(id)
            .map(|resident| *resident.needs().values())
            .unwrap_or_default();
        slot.brain.save_tables(&self.store, &self.config.agent.tables)?;

        let timestamp = Utc::now();
        self.sink.record(&SinkRecord::Death(DeathRecord {
            timestamp,
            agent_id: id,
            generation: slot.generation,
            lifetime,
            cause,
            needs,
        }))?;
        let stats = GenerationStats {
            timestamp,
            generation: slot.generation,
            agent_id: id,
            lifetime,
            cause_of_death: cause,
            total_actions: slot.actions,
            average_need: needs.average(),
        };
        self.tracker.record(&stats);
        if let Some(log) = self.generation_log.as_mut() {
            log.append(&stats)?;
        }
        info!(
            agent = id,
            generation = slot.generation,
            lifetime = %format!("{lifetime:.1}"),
            cause = cause.map_or("Unknown", NeedType::name),
            actions = slot.actions,
            exploration = slot.brain.exploration_rate(),
            "Agent died"
        );
        self.respawns
            .push((self.clock + self.config.run.respawn_delay, id, slot.generation + 1));
        Ok(())
    }

    /// Save the tables of every living agent and flush the sink
    pub fn shutdown(&mut self) -> Result<()> {
        for slot in self.slots.values() {
            slot.brain.save_tables(&self.store, &self.config.agent.tables)?;
        }
        self.sink.flush()?;
        let summary = self.tracker.summary();
        info!(
            generations = summary.generations,
            average_lifetime = %format!("{:.1}", summary.average_lifetime),
            best_generation = ?summary.best_generation,
            best_lifetime = %format!("{:.1}", summary.best_lifetime),
            "Simulation stopped"
        );
        Ok(())
    }

    /// Run in simulated time until the budget is spent
    pub fn run(&mut self) -> Result<RunSummary> {
        self.start()?;
        let tick = self.config.run.tick_seconds;
        while !self.is_finished() {
            self.step(tick)?;
        }
        self.shutdown()?;
        Ok(self.summary())
    }

    /// Run in real time until the budget is spent or Ctrl-C
    pub async fn run_realtime(&mut self) -> Result<RunSummary> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Run in real time until the budget is spent or `shutdown` completes
    pub async fn run_until<F: Future>(&mut self, shutdown: F) -> Result<RunSummary> {
        self.start()?;
        let tick = self.config.run.tick_seconds;
        let mut interval = tokio::time::interval(Duration::from_secs_f64(tick));
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, saving tables");
                    break;
                }
                _ = interval.tick() => {
                    self.step(tick)?;
                    if self.is_finished() {
                        break;
                    }
                }
            }
        }
        self.shutdown()?;
        Ok(self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use needs_rl_agent::{ControllerMode, MemorySink};
    use needs_rl_core::PrimitiveAction;
    use tempfile::tempdir;

    fn fast_config(dir: &std::path::Path, mode: ControllerMode) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.agent.mode = mode;
        config.agent.save_dir = dir.to_path_buf();
        config.world.seed = Some(17);
        config.world.base_decay_rate = 10.0;
        config.run.agents = 2;
        config.run.max_generations = Some(4);
        config.run.tick_seconds = 0.5;
        config
    }

    #[test]
    fn test_simulated_run_records_generations() {
        let dir = tempdir().unwrap();
        let config = fast_config(dir.path(), ControllerMode::Hierarchical);
        let mut sim = Simulation::new(config, MemorySink::new()).unwrap();
        let summary = sim.run().unwrap();

        assert!(summary.generations >= 4);
        assert!(summary.average_lifetime > 0.0);
        let sink = sim.into_sink();
        assert_eq!(sink.deaths().count(), summary.generations as usize);
        assert!(sink.decisions().count() > 0);
        assert!(dir.path().join("QTable.json").exists());
        assert!(dir.path().join("HighLevelQTable.json").exists());
    }

    #[test]
    fn test_hierarchical_agents_idle_when_satisfied() {
        let dir = tempdir().unwrap();
        let mut config = fast_config(dir.path(), ControllerMode::Hierarchical);
        config.agent.controller.idle_threshold = Some(50.0);
        config.run.max_generations = Some(2);
        let mut sim = Simulation::new(config, MemorySink::new()).unwrap();
        sim.run().unwrap();

        let idles: Vec<_> = sim
            .sink()
            .decisions()
            .filter(|decision| decision.action_name == "Idle")
            .collect();
        assert!(!idles.is_empty());
        assert!(idles
            .iter()
            .all(|decision| decision.action == PrimitiveAction::Idle.ordinal()));
        assert!(!sim
            .sink()
            .decisions()
            .any(|decision| decision.action_name.starts_with("Satisfy")
                && decision.action == PrimitiveAction::Idle.ordinal()));
    }

    #[test]
    fn test_respawn_increments_generation() {
        let dir = tempdir().unwrap();
        let mut config = fast_config(dir.path(), ControllerMode::Flat);
        config.run.agents = 1;
        config.run.max_generations = Some(2);
        let mut sim = Simulation::new(config, MemorySink::new()).unwrap();
        sim.run().unwrap();

        let generations: Vec<u32> = sim.sink().deaths().map(|death| death.generation).collect();
        assert_eq!(generations, vec![1, 2]);
        assert!(!dir.path().join("HighLevelQTable.json").exists());
    }

    #[test]
    fn test_time_budget_stops_run() {
        let dir = tempdir().unwrap();
        let mut config = fast_config(dir.path(), ControllerMode::Flat);
        config.world.base_decay_rate = 1.0;
        config.run.max_generations = None;
        config.run.max_seconds = Some(10.0);
        let mut sim = Simulation::new(config, MemorySink::new()).unwrap();
        let summary = sim.run().unwrap();
        assert_eq!(summary.generations, 0);
        assert!(sim.clock() >= 10.0);
        assert_eq!(sim.agents().count(), 2);
        assert!(dir.path().join("QTable.json").exists());
    }

    #[tokio::test]
    async fn test_realtime_run_honours_shutdown() {
        let dir = tempdir().unwrap();
        let mut config = fast_config(dir.path(), ControllerMode::Flat);
        config.run.tick_seconds = 0.01;
        config.run.max_generations = None;
        config.run.max_seconds = Some(60.0);
        let mut sim = Simulation::new(config, MemorySink::new()).unwrap();
        let summary = sim
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(summary.generations, 0);
        assert!(sim.clock() < 60.0);
        assert!(dir.path().join("QTable.json").exists());
    }
}
