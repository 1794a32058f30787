// Command implementations for needsctl

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use needs_rl_agent::{
    ControllerMode, CsvSink, GenerationLog, Greedy, JsonlSink, LogSink, NullSink, Policy,
    RunSummary, SharedTableStore,
};
use needs_rl_core::{
    persistence, ConfigFile, DiscreteAction, ExplorationSchedule, LearningParams, LoadStatus,
    MacroAction, NeedState, NeedType, PrimitiveAction, QTable, Schedule,
};
use needs_rl_env::{EngineConfig, Simulation};

/// Command-line values that replace configuration entries
pub struct TrainOverrides {
    pub generations: Option<u32>,
    pub agents: Option<u32>,
    pub mode: Option<ControllerMode>,
    pub seed: Option<u64>,
    pub save_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub jsonl: bool,
}

impl TrainOverrides {
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(generations) = self.generations {
            config.run.max_generations = Some(generations);
        }
        if let Some(agents) = self.agents {
            config.run.agents = agents;
        }
        if let Some(mode) = self.mode {
            config.agent.mode = mode;
        }
        if self.seed.is_some() {
            config.world.seed = self.seed;
        }
        if let Some(dir) = &self.save_dir {
            config.agent.save_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.run.log_dir = Some(dir.clone());
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            EngineConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn open_sink(config: &EngineConfig, jsonl: bool) -> Result<Box<dyn LogSink>> {
    let Some(dir) = &config.run.log_dir else {
        return Ok(Box::new(NullSink));
    };
    let sink: Box<dyn LogSink> = if jsonl {
        let path = dir.join("decisions.jsonl");
        Box::new(JsonlSink::open(&path).with_context(|| format!("Failed to open {}", path.display()))?)
    } else {
        let path = dir.join("decisions.csv");
        Box::new(
            CsvSink::open(&path, config.agent.death_penalty())
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )
    };
    Ok(sink)
}

pub async fn train(mut config: EngineConfig, overrides: TrainOverrides, realtime: bool) -> Result<()> {
    overrides.apply(&mut config);

    println!("🧠 Starting needs training");
    println!("   Mode: {:?}", config.agent.mode);
    println!("   Agents: {}", config.run.agents);
    if let Some(generations) = config.run.max_generations {
        println!("   Generations: {generations}");
    }
    if let Some(seconds) = config.run.max_seconds {
        println!("   Time budget: {seconds:.0}s");
    }
    println!("   Tables: {}", config.agent.save_dir.display());

    let sink = open_sink(&config, overrides.jsonl)?;
    let generation_log = match &config.run.log_dir {
        Some(dir) => {
            let path = dir.join("generations.csv");
            Some(GenerationLog::open(&path).with_context(|| format!("Failed to open {}", path.display()))?)
        }
        None => None,
    };

    let mut sim = Simulation::new(config, sink).context("Invalid engine configuration")?;
    if let Some(log) = generation_log {
        sim = sim.with_generation_log(log);
    }

    let result = if realtime {
        println!("\n⏱️  Running in real time, Ctrl-C saves and stops");
        sim.run_realtime().await
    } else {
        sim.run()
    };
    let summary = result.context("Training run failed")?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n✅ Training finished");
    println!("   Run: {}", summary.run_id);
    println!("   Lifetimes: {}", summary.generations);
    println!("   Average lifetime: {:.1}s", summary.average_lifetime);
    match summary.best_generation {
        Some(generation) => println!(
            "   Best: generation {generation} ({:.1}s)",
            summary.best_lifetime
        ),
        None => println!("   Best: none yet"),
    }
}

pub fn inspect(config: &EngineConfig, macro_tier: bool, file: Option<PathBuf>, top: usize) -> Result<()> {
    let name = if macro_tier {
        &config.agent.tables.macro_tier
    } else {
        &config.agent.tables.micro
    };
    let path = file.unwrap_or_else(|| config.agent.save_dir.join(name));
    if macro_tier {
        inspect_table::<MacroAction>(&path, top)
    } else {
        inspect_table::<PrimitiveAction>(&path, top)
    }
}

fn describe_state(key: &str) -> String {
    match NeedState::from_key(key) {
        Some(state) => NeedType::ALL
            .iter()
            .map(|&need| format!("{}={}", need, state.level(need)))
            .collect::<Vec<_>>()
            .join(" "),
        None => "unrecognised key".to_string(),
    }
}

fn inspect_table<A: DiscreteAction>(path: &Path, top: usize) -> Result<()> {
    let (table, status): (QTable<A>, _) = persistence::load(path);
    match status {
        LoadStatus::NotFound => {
            println!("No table at {}", path.display());
            return Ok(());
        }
        LoadStatus::Malformed { reason } => {
            anyhow::bail!("Table at {} is malformed: {reason}", path.display());
        }
        LoadStatus::Loaded { .. } => {}
    }

    let stats = table.stats();
    println!("📊 Q-table {}\n", path.display());
    println!("   States: {}", stats.states);
    println!("   Entries: {}", stats.entries);
    println!("   Total visits: {}", stats.total_visits);
    println!(
        "   Values: min {:.2}, max {:.2}, mean {:.2}",
        stats.min_value, stats.max_value, stats.mean_value
    );

    let mut rows: Vec<_> = table
        .iter()
        .map(|(key, row)| {
            let visits: u64 = row.values().map(|entry| u64::from(entry.visits)).sum();
            (key.clone(), visits)
        })
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

    if !rows.is_empty() {
        println!("\n   Most visited states:");
    }
    let mut greedy = Greedy;
    for (key, visits) in rows.into_iter().take(top) {
        let best = greedy.choose_action(&table, &key, A::all(), 0.0);
        println!(
            "   {key}  visits {visits:>5}  best {best} ({:.2})  [{}]",
            table.get(&key, best),
            describe_state(key.as_str())
        );
    }
    Ok(())
}

pub fn reset(config: &EngineConfig, yes: bool) -> Result<()> {
    let store = SharedTableStore::new(config.agent.save_dir.clone(), config.agent.write_mode);
    let names = [
        config.agent.tables.micro.as_str(),
        config.agent.tables.macro_tier.as_str(),
    ];
    if !yes {
        println!("⚠️  This deletes the learned tables:");
        for name in names {
            println!("   {}", store.path(name).display());
        }
        println!("Re-run with --yes to continue.");
        return Ok(());
    }

    let removed = store
        .reset(&names)
        .with_context(|| format!("Failed to reset tables in {}", store.dir().display()))?;
    if removed.is_empty() {
        println!("Nothing to delete.");
    }
    for path in removed {
        println!("🗑️  Deleted {}", path.display());
    }
    Ok(())
}

const OUTLOOK_STEPS: [u64; 5] = [0, 100, 500, 1000, 5000];

/// Exploration rate a fresh learner reaches after each checkpoint of updates
fn exploration_outlook(params: &LearningParams) -> Vec<(u64, f64)> {
    let schedule = ExplorationSchedule::from_params(params);
    OUTLOOK_STEPS
        .iter()
        .map(|&updates| (updates, schedule.value(updates)))
        .collect()
}

fn outlook_line(tier: &str, params: &LearningParams) -> String {
    let points: Vec<String> = exploration_outlook(params)
        .into_iter()
        .map(|(updates, rate)| format!("{updates}: {rate:.3}"))
        .collect();
    format!("#   {tier:<5} {}", points.join(", "))
}

pub fn print_config(config: &EngineConfig) -> Result<()> {
    let text = config.to_toml_string().context("Failed to render configuration")?;
    print!("{text}");
    println!();
    println!("# Exploration rate per life after N updates");
    println!("{}", outlook_line("micro", &config.agent.micro));
    if config.agent.mode == ControllerMode::Hierarchical {
        println!("{}", outlook_line("macro", &config.agent.macro_tier));
    }
    Ok(())
}
