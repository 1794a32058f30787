//! Write-only record sinks for decisions and deaths
//!
//! The learner only produces well-formed records; formatting and file
//! handling belong to the sink implementations below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use needs_rl_core::{NeedType, NeedVector, Result};

/// Identifier of one simulated agent
pub type AgentId = u32;

/// One completed decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Wall-clock time of the record
    pub timestamp: DateTime<Utc>,
    /// Agent that decided
    pub agent_id: AgentId,
    /// Agent generation
    pub generation: u32,
    /// Ordinal of the executed primitive action
    pub action: usize,
    /// Name of the chosen action at the deciding tier
    pub action_name: String,
    /// State key the decision was made in
    pub state_key: String,
    /// Reward the decision earned
    pub reward: f64,
    /// Seconds alive when the decision completed
    pub lifetime: f64,
    /// Needs when the decision completed
    pub needs: NeedVector,
}

/// One agent death
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Wall-clock time of the record
    pub timestamp: DateTime<Utc>,
    /// Agent that died
    pub agent_id: AgentId,
    /// Agent generation
    pub generation: u32,
    /// Seconds alive
    pub lifetime: f64,
    /// First depleted need
    pub cause: Option<NeedType>,
    /// Needs at death
    pub needs: NeedVector,
}

/// Anything a sink receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SinkRecord {
    /// Completed decision
    Decision(DecisionRecord),
    /// Agent death
    Death(DeathRecord),
}

/// Destination for decision and death records
pub trait LogSink: Send {
    /// Accept one record
    fn record(&mut self, record: &SinkRecord) -> Result<()>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn record(&mut self, record: &SinkRecord) -> Result<()> {
        (**self).record(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn record(&mut self, _record: &SinkRecord) -> Result<()> {
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<SinkRecord>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn records(&self) -> &[SinkRecord] {
        &self.records
    }

    /// Decision records
    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.records.iter().filter_map(|record| match record {
            SinkRecord::Decision(decision) => Some(decision),
            SinkRecord::Death(_) => None,
        })
    }

    /// Death records
    pub fn deaths(&self) -> impl Iterator<Item = &DeathRecord> {
        self.records.iter().filter_map(|record| match record {
            SinkRecord::Death(death) => Some(death),
            SinkRecord::Decision(_) => None,
        })
    }
}

impl LogSink for MemorySink {
    fn record(&mut self, record: &SinkRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<(File, bool)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;
    Ok((file, is_empty))
}

/// Appends one JSON object per line
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Open (or create) a JSON-lines file for appending
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (file, _) = open_append(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonlSink {
    fn record(&mut self, record: &SinkRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Column header of [`CsvSink`] files
pub const CSV_HEADER: &str =
    "Timestamp,NPCID,Generation,Action,StateKey,Reward,Lifetime,Event,Hunger,Bladder,Energy,Social,Hygiene,Fun";

/// Appends comma-separated rows with a fixed column layout
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    death_reward: f64,
}

impl CsvSink {
    /// Open (or create) a CSV file. `death_reward` fills the reward column of death rows.
    pub fn open(path: impl Into<PathBuf>, death_reward: f64) -> Result<Self> {
        let path = path.into();
        let (file, is_empty) = open_append(&path)?;
        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{CSV_HEADER}")?;
        }
        Ok(Self {
            path,
            writer,
            death_reward,
        })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn csv_needs(needs: &NeedVector) -> String {
    NeedType::ALL
        .iter()
        .map(|&need| needs.get(need).map(|value| format!("{value:.2}")).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl LogSink for CsvSink {
    fn record(&mut self, record: &SinkRecord) -> Result<()> {
        match record {
            SinkRecord::Decision(d) => writeln!(
                self.writer,
                "{},{},{},{},{},{:.2},{:.2},Decision,{}",
                csv_timestamp(&d.timestamp),
                d.agent_id,
                d.generation,
                d.action,
                d.state_key,
                d.reward,
                d.lifetime,
                csv_needs(&d.needs)
            )?,
            SinkRecord::Death(d) => writeln!(
                self.writer,
                "{},{},{},-1,N/A,{:.2},{:.2},Death,{}",
                csv_timestamp(&d.timestamp),
                d.agent_id,
                d.generation,
                self.death_reward,
                d.lifetime,
                csv_needs(&d.needs)
            )?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn decision() -> SinkRecord {
        SinkRecord::Decision(DecisionRecord {
            timestamp: Utc::now(),
            agent_id: 3,
            generation: 12,
            action: 4,
            action_name: "UseRefrigerator".to_string(),
            state_key: "012111".to_string(),
            reward: 26.5,
            lifetime: 41.25,
            needs: NeedVector::from_values([80.0, 50.0, 90.0, 60.0, 55.0, 45.5]),
        })
    }

    fn death() -> SinkRecord {
        SinkRecord::Death(DeathRecord {
            timestamp: Utc::now(),
            agent_id: 3,
            generation: 12,
            lifetime: 120.0,
            cause: Some(NeedType::Bladder),
            needs: NeedVector::from_values([30.0, 0.0, 40.0, 20.0, 10.0, 5.0]),
        })
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("decisions.csv");
        let mut sink = CsvSink::open(&path, -1000.0).unwrap();
        sink.record(&decision()).unwrap();
        sink.record(&death()).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",3,12,4,012111,26.50,41.25,Decision,80.00,50.00,90.00,60.00,55.00,45.50"));
        assert!(lines[2].contains(",3,12,-1,N/A,-1000.00,120.00,Death,"));
        assert_eq!(lines[2].split(',').count(), 14);
    }

    #[test]
    fn test_csv_header_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decisions.csv");
        {
            let mut sink = CsvSink::open(&path, -500.0).unwrap();
            sink.record(&decision()).unwrap();
            sink.flush().unwrap();
        }
        let mut sink = CsvSink::open(&path, -500.0).unwrap();
        sink.record(&decision()).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Timestamp,NPCID").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_jsonl_lines_parse_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");
        let mut sink = JsonlSink::open(&path).unwrap();
        sink.record(&decision()).unwrap();
        sink.record(&death()).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let records: Vec<SinkRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[1], SinkRecord::Death(d) if d.cause == Some(NeedType::Bladder)));
        assert!(content.lines().next().unwrap().contains("\"event\":\"Decision\""));
    }

    #[test]
    fn test_memory_sink_filters() {
        let mut sink = MemorySink::new();
        sink.record(&decision()).unwrap();
        sink.record(&death()).unwrap();
        sink.record(&decision()).unwrap();
        assert_eq!(sink.decisions().count(), 2);
        assert_eq!(sink.deaths().count(), 1);
    }
}
