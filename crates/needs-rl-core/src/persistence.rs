//! Durable JSON storage for Q-tables
//!
//! Document layout:
//!
//! ```json
//! { "<state key>": { "<action ordinal>": { "Value": 1.5, "TimesVisited": 3 } } }
//! ```
//!
//! A missing or unreadable file never fails a load; the caller gets an empty
//! table together with a [`LoadStatus`] describing what happened.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::action::DiscreteAction;
use crate::error::Result;
use crate::state::StateKey;
use crate::value::{QTable, QValue};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct EntryRecord {
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "TimesVisited")]
    times_visited: u32,
}

type TableDocument = BTreeMap<String, BTreeMap<String, EntryRecord>>;

/// What a load found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Table read successfully
    Loaded {
        /// Number of states read
        states: usize,
    },
    /// No file at the path
    NotFound,
    /// File present but unusable
    Malformed {
        /// Parse or read failure
        reason: String,
    },
}

impl LoadStatus {
    /// Whether the learner starts from an empty table
    #[must_use]
    pub fn is_fresh_start(&self) -> bool {
        !matches!(self, LoadStatus::Loaded { states } if *states > 0)
    }
}

/// Render a table as a JSON document
pub fn to_json_string<A: DiscreteAction>(table: &QTable<A>) -> Result<String> {
    let mut document = TableDocument::new();
    for (key, action, entry) in table.entries() {
        document.entry(key.to_string()).or_default().insert(
            action.ordinal().to_string(),
            EntryRecord {
                value: entry.value,
                times_visited: entry.visits,
            },
        );
    }
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse a JSON document. Entries with unknown action ordinals are skipped.
pub fn from_json_str<A: DiscreteAction>(content: &str) -> Result<QTable<A>> {
    let document: TableDocument = serde_json::from_str(content)?;
    let mut table = QTable::new();
    for (key, row) in document {
        for (ordinal, record) in row {
            let action = match ordinal.parse::<usize>().map(A::from_ordinal) {
                Ok(Ok(action)) => action,
                _ => {
                    warn!(state = %key, ordinal = %ordinal, "Skipping entry with unknown action");
                    continue;
                }
            };
            table.insert(
                StateKey::new(key.clone()),
                action,
                QValue::new(record.value, record.times_visited),
            );
        }
    }
    Ok(table)
}

/// Write a table to `path`, replacing any previous file in one rename.
///
/// Missing parent directories are created.
pub fn save<A: DiscreteAction>(table: &QTable<A>, path: &Path) -> Result<()> {
    let json = to_json_string(table)?;
    atomic_write_text(path, &json)?;
    info!(states = table.len(), path = %path.display(), "Saved Q-table");
    Ok(())
}

/// Read a table from `path`.
///
/// Never fails: a missing or malformed file yields an empty table.
pub fn load<A: DiscreteAction>(path: &Path) -> (QTable<A>, LoadStatus) {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "No Q-table on disk, starting fresh");
            return (QTable::new(), LoadStatus::NotFound);
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Unreadable Q-table, starting fresh");
            return (
                QTable::new(),
                LoadStatus::Malformed {
                    reason: err.to_string(),
                },
            );
        }
    };

    match from_json_str(&content) {
        Ok(table) => {
            info!(states = table.len(), path = %path.display(), "Loaded Q-table");
            let states = table.len();
            (table, LoadStatus::Loaded { states })
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Malformed Q-table, starting fresh");
            (
                QTable::new(),
                LoadStatus::Malformed {
                    reason: err.to_string(),
                },
            )
        }
    }
}

/// Delete a persisted table. A missing file is not an error.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed Q-table");
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Write text through a uniquely named sibling temp file and rename it
/// over `path`. Concurrent writers never share a temp file.
pub fn atomic_write_text(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
