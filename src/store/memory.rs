use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

use super::{AppendOutcome, BackupHandle, RecordStore, RollEvent};

/// Ephemeral roll log for tests and embedding. Backups are kept as named
/// in-memory snapshots so callers can observe what a backup captured.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<RollEvent>>,
    backups: Mutex<Vec<(String, Vec<RollEvent>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the backups taken so far, in order.
    pub fn backup_names(&self) -> Vec<String> {
        self.backups
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The dataset captured by the named backup, if it exists.
    pub fn backup_snapshot(&self, name: &str) -> Option<Vec<RollEvent>> {
        self.backups
            .lock()
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, events)| events.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, event: RollEvent) -> Result<(), StoreError> {
        self.events.lock().push(event);
        Ok(())
    }

    async fn append_unique(&self, event: RollEvent) -> Result<AppendOutcome, StoreError> {
        let mut events = self.events.lock();
        if events.iter().any(|existing| existing.same_day(&event)) {
            return Ok(AppendOutcome::DuplicateDay);
        }
        events.push(event);
        Ok(AppendOutcome::Appended)
    }

    async fn list_all(&self) -> Result<Vec<RollEvent>, StoreError> {
        Ok(self.events.lock().clone())
    }

    async fn backup(&self, name: &str) -> Result<BackupHandle, StoreError> {
        let snapshot = self.events.lock().clone();
        self.backups.lock().push((name.to_string(), snapshot));
        Ok(BackupHandle {
            name: name.to_string(),
        })
    }
}
