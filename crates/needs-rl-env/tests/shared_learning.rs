use needs_rl_agent::{
    ControllerMode, CsvSink, GenerationLog, SharedTableStore, WriteMode, CSV_HEADER,
    GENERATION_HEADER,
};
use needs_rl_core::{MacroAction, PrimitiveAction, QTable};
use needs_rl_env::{EngineConfig, Simulation};
use std::path::Path;
use tempfile::tempdir;

fn quick_config(save_dir: &Path, seed: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.agent.mode = ControllerMode::Hierarchical;
    config.agent.save_dir = save_dir.to_path_buf();
    config.world.seed = Some(seed);
    config.world.base_decay_rate = 10.0;
    config.run.agents = 3;
    config.run.max_generations = Some(6);
    config.run.tick_seconds = 0.5;
    config
}

fn visits(table: &QTable<MacroAction>) -> u64 {
    table.stats().total_visits
}

#[test]
fn test_runs_pool_experience_in_shared_tables() {
    println!("🔷 TEST: consecutive runs keep growing the shared tables");

    let dir = tempdir().unwrap();
    let store = SharedTableStore::new(dir.path(), WriteMode::MergeOnSave);

    let mut first = Simulation::new(quick_config(dir.path(), 1), needs_rl_agent::NullSink).unwrap();
    first.run().unwrap();
    let (after_first, _) = store.load::<MacroAction>("HighLevelQTable.json");
    assert!(!after_first.is_empty());

    let mut second = Simulation::new(quick_config(dir.path(), 2), needs_rl_agent::NullSink).unwrap();
    second.run().unwrap();
    let (after_second, _) = store.load::<MacroAction>("HighLevelQTable.json");
    assert!(after_second.len() >= after_first.len());
    assert!(visits(&after_second) >= visits(&after_first));

    let (micro, _) = store.load::<PrimitiveAction>("QTable.json");
    assert!(!micro.is_empty());
    println!("✅ Shared learning: PASSED");
}

#[test]
fn test_csv_and_generation_logs() {
    println!("🔷 TEST: decision and generation logs are written");

    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");
    let mut config = quick_config(&dir.path().join("tables"), 5);
    config.agent.mode = ControllerMode::Flat;
    config.run.max_generations = Some(3);

    let sink = CsvSink::open(logs.join("decisions.csv"), config.agent.death_penalty()).unwrap();
    let log = GenerationLog::open(&logs.join("generations.csv")).unwrap();
    let mut sim = Simulation::new(config, sink).unwrap().with_generation_log(log);
    let summary = sim.run().unwrap();

    let decisions = std::fs::read_to_string(logs.join("decisions.csv")).unwrap();
    assert_eq!(decisions.lines().next(), Some(CSV_HEADER));
    let deaths = decisions.lines().filter(|line| line.contains(",Death,")).count();
    assert_eq!(deaths, summary.generations as usize);
    assert!(decisions.contains(",-1,N/A,-500.00,"));

    let generations = std::fs::read_to_string(logs.join("generations.csv")).unwrap();
    assert_eq!(generations.lines().next(), Some(GENERATION_HEADER));
    assert_eq!(generations.lines().count(), summary.generations as usize + 1);
    println!("✅ Log files: PASSED");
}
