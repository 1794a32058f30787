//! Per-generation statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

use needs_rl_core::{NeedType, Result};

use crate::sink::AgentId;

/// Summary of one finished lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Time of death
    pub timestamp: DateTime<Utc>,
    /// Generation number
    pub generation: u32,
    /// Agent that lived it
    pub agent_id: AgentId,
    /// Seconds alive
    pub lifetime: f64,
    /// First depleted need
    pub cause_of_death: Option<NeedType>,
    /// Decisions completed
    pub total_actions: u32,
    /// Mean need value at death
    pub average_need: f64,
}

/// Running totals over a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Identifier of the run
    pub run_id: Uuid,
    /// Lifetimes recorded
    pub generations: u32,
    /// Mean lifetime in seconds
    pub average_lifetime: f64,
    /// Generation with the longest lifetime
    pub best_generation: Option<u32>,
    /// Longest lifetime in seconds
    pub best_lifetime: f64,
    /// Highest generation number seen
    pub latest_generation: u32,
}

/// Accumulates [`GenerationStats`] for one run
#[derive(Debug, Clone)]
pub struct GenerationTracker {
    run_id: Uuid,
    completed: u32,
    total_lifetime: f64,
    best: Option<(u32, f64)>,
    latest_generation: u32,
}

impl Default for GenerationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationTracker {
    /// Start tracking a new run
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            completed: 0,
            total_lifetime: 0.0,
            best: None,
            latest_generation: 0,
        }
    }

    /// Identifier of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Fold in one finished lifetime
    pub fn record(&mut self, stats: &GenerationStats) {
        self.completed += 1;
        self.total_lifetime += stats.lifetime;
        self.latest_generation = self.latest_generation.max(stats.generation);
        if self.best.map_or(true, |(_, best)| stats.lifetime > best) {
            self.best = Some((stats.generation, stats.lifetime));
        }
    }

    /// Lifetimes recorded so far
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Current totals
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            generations: self.completed,
            average_lifetime: if self.completed == 0 {
                0.0
            } else {
                self.total_lifetime / f64::from(self.completed)
            },
            best_generation: self.best.map(|(generation, _)| generation),
            best_lifetime: self.best.map_or(0.0, |(_, lifetime)| lifetime),
            latest_generation: self.latest_generation,
        }
    }
}

/// Column header of generation log files
pub const GENERATION_HEADER: &str =
    "Timestamp,Generation,NPCID,Lifetime,CauseOfDeath,TotalActions,AvgNeedLevel";

/// CSV file with one row per finished lifetime
pub struct GenerationLog {
    writer: BufWriter<File>,
}

impl GenerationLog {
    /// Open (or create) a generation log for appending
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{GENERATION_HEADER}")?;
        }
        Ok(Self { writer })
    }

    /// Append one row
    pub fn append(&mut self, stats: &GenerationStats) -> Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{:.2},{},{},{:.2}",
            stats.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            stats.generation,
            stats.agent_id,
            stats.lifetime,
            stats.cause_of_death.map_or("Unknown", NeedType::name),
            stats.total_actions,
            stats.average_need
        )?;
        self.writer.flush()?;
        Ok(())
    }
}
