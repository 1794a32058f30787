//! Population-shared table files
//!
//! Many agents load one table at spawn and save it back at death. With
//! [`WriteMode::LastWriteWins`] the last save replaces the file and drops
//! whatever other agents wrote since that agent loaded. With
//! [`WriteMode::MergeOnSave`] each save re-reads the file under a lock and
//! keeps, per entry, whichever side has more visits.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use needs_rl_core::persistence;
use needs_rl_core::{DiscreteAction, LoadStatus, QTable, Result};

/// How concurrent saves to one file are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Overwrite the file with the saver's table
    LastWriteWins,
    /// Read, merge by visit count, then write
    #[default]
    MergeOnSave,
}

/// What a save wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// States in the written table
    pub states: usize,
    /// Entries kept from the file instead of the saver's table
    pub merged_from_disk: usize,
}

/// Directory of table files shared by a population of agents
#[derive(Debug)]
pub struct SharedTableStore {
    dir: PathBuf,
    mode: WriteMode,
    lock: Mutex<()>,
}

impl SharedTableStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            dir: dir.into(),
            mode,
            lock: Mutex::new(()),
        }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write discipline
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Full path of a table file
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a table. Missing or malformed files give an empty table.
    pub fn load<A: DiscreteAction>(&self, name: &str) -> (QTable<A>, LoadStatus) {
        let _guard = self.guard();
        persistence::load(&self.path(name))
    }

    /// Save a table according to the store's write mode
    pub fn save<A: DiscreteAction>(&self, name: &str, table: &QTable<A>) -> Result<SaveReport> {
        let _guard = self.guard();
        let path = self.path(name);
        match self.mode {
            WriteMode::LastWriteWins => {
                persistence::save(table, &path)?;
                Ok(SaveReport {
                    states: table.len(),
                    merged_from_disk: 0,
                })
            }
            WriteMode::MergeOnSave => {
                let (on_disk, _) = persistence::load::<A>(&path);
                let mut merged = table.clone();
                let merged_from_disk = merged.merge_from(&on_disk);
                persistence::save(&merged, &path)?;
                if merged_from_disk > 0 {
                    info!(merged_from_disk, path = %path.display(), "Merged concurrent table updates");
                }
                Ok(SaveReport {
                    states: merged.len(),
                    merged_from_disk,
                })
            }
        }
    }

    /// Delete table files. Returns the paths that existed.
    pub fn reset(&self, names: &[&str]) -> Result<Vec<PathBuf>> {
        let _guard = self.guard();
        let mut removed = Vec::new();
        for name in names {
            let path = self.path(name);
            if persistence::remove(&path)? {
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use needs_rl_core::{discretize, NeedVector, PrimitiveAction, QValue, DiscreteState};
    use tempfile::tempdir;

    fn two_agents(mode: WriteMode) -> QTable<PrimitiveAction> {
        let dir = tempdir().unwrap();
        let store = SharedTableStore::new(dir.path(), mode);
        let hungry = discretize(&NeedVector::uniform(10.0));
        let rested = discretize(&NeedVector::uniform(90.0));

        let (mut first, _) = store.load::<PrimitiveAction>("QTable.json");
        let (mut second, _) = store.load::<PrimitiveAction>("QTable.json");
        first.set(&hungry, PrimitiveAction::UseRefrigerator, 5.0);
        second.set(&rested, PrimitiveAction::Idle, 1.0);

        store.save("QTable.json", &first).unwrap();
        store.save("QTable.json", &second).unwrap();
        store.load("QTable.json").0
    }

    #[test]
    fn test_last_write_wins_drops_other_updates() {
        let table = two_agents(WriteMode::LastWriteWins);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(&discretize(&NeedVector::uniform(90.0)), PrimitiveAction::Idle),
            1.0
        );
    }

    #[test]
    fn test_merge_on_save_keeps_both_agents() {
        let table = two_agents(WriteMode::MergeOnSave);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(&discretize(&NeedVector::uniform(10.0)), PrimitiveAction::UseRefrigerator),
            5.0
        );
    }

    #[test]
    fn test_merge_prefers_more_visits_then_saver() {
        let dir = tempdir().unwrap();
        let store = SharedTableStore::new(dir.path(), WriteMode::MergeOnSave);
        let key = discretize(&NeedVector::uniform(50.0)).key();

        let mut disk = QTable::new();
        disk.insert(key.clone(), PrimitiveAction::UseBed, QValue::new(7.0, 9));
        disk.insert(key.clone(), PrimitiveAction::UseSofa, QValue::new(7.0, 2));
        store.save("t.json", &disk).unwrap();

        let mut ours = QTable::new();
        ours.insert(key.clone(), PrimitiveAction::UseBed, QValue::new(1.0, 3));
        ours.insert(key.clone(), PrimitiveAction::UseSofa, QValue::new(1.0, 2));
        let report = store.save("t.json", &ours).unwrap();
        assert_eq!(report.merged_from_disk, 1);

        let (saved, _) = store.load::<PrimitiveAction>("t.json");
        assert_eq!(saved.entry(&key, PrimitiveAction::UseBed), Some(QValue::new(7.0, 9)));
        assert_eq!(saved.entry(&key, PrimitiveAction::UseSofa), Some(QValue::new(1.0, 2)));
    }

    #[test]
    fn test_reset_removes_existing_files() {
        let dir = tempdir().unwrap();
        let store = SharedTableStore::new(dir.path(), WriteMode::default());
        store.save("QTable.json", &QTable::<PrimitiveAction>::new()).unwrap();
        let removed = store.reset(&["QTable.json", "HighLevelQTable.json"]).unwrap();
        assert_eq!(removed, vec![dir.path().join("QTable.json")]);
        assert!(store.reset(&["QTable.json"]).unwrap().is_empty());
    }
}
