use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use super::util::normalize_relative_path;
use super::{ScanStateRecord, ScanStore, StoreError};
use crate::media_roots::RootId;
use crate::scanner::ScanState;

#[derive(Default)]
struct Tables {
    states: HashMap<RootId, ScanState>,
    records: HashMap<RootId, BTreeMap<String, ScanStateRecord>>,
    directories: HashMap<RootId, BTreeSet<PathBuf>>,
}

/// Non-durable [`ScanStore`] for tests and hosts that keep their own storage.
#[derive(Default)]
pub struct MemoryScanStore {
    tables: Mutex<Tables>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ScanStore for MemoryScanStore {
    fn save_state(&self, state: &ScanState) -> Result<(), StoreError> {
        self.tables()
            .states
            .insert(state.root_id.clone(), state.clone());
        Ok(())
    }

    fn load_state(&self, root_id: &RootId) -> Result<Option<ScanState>, StoreError> {
        Ok(self.tables().states.get(root_id).cloned())
    }

    fn list_incomplete(&self) -> Result<Vec<ScanState>, StoreError> {
        let mut states: Vec<ScanState> = self
            .tables()
            .states
            .values()
            .filter(|state| !state.status.is_terminal())
            .cloned()
            .collect();
        states.sort_by_key(|state| state.updated_at);
        Ok(states)
    }

    fn records(&self, root_id: &RootId) -> Result<Vec<ScanStateRecord>, StoreError> {
        Ok(self
            .tables()
            .records
            .get(root_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_record(&self, record: &ScanStateRecord) -> Result<(), StoreError> {
        let key = normalize_relative_path(&record.relative_path)?;
        self.tables()
            .records
            .entry(record.root_id.clone())
            .or_default()
            .insert(key, record.clone());
        Ok(())
    }

    fn delete_records(&self, root_id: &RootId, paths: &[PathBuf]) -> Result<usize, StoreError> {
        let keys = paths
            .iter()
            .map(|path| normalize_relative_path(path))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tables = self.tables();
        let Some(rows) = tables.records.get_mut(root_id) else {
            return Ok(0);
        };
        Ok(keys.iter().filter(|key| rows.remove(*key).is_some()).count())
    }

    fn save_directories(
        &self,
        root_id: &RootId,
        directories: &BTreeSet<PathBuf>,
    ) -> Result<(), StoreError> {
        self.tables()
            .directories
            .insert(root_id.clone(), directories.clone());
        Ok(())
    }

    fn directories(&self, root_id: &RootId) -> Result<BTreeSet<PathBuf>, StoreError> {
        Ok(self
            .tables()
            .directories
            .get(root_id)
            .cloned()
            .unwrap_or_default())
    }
}
