use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};
use tracing::debug;

use crate::error::StoreError;

use super::{AppendOutcome, BackupHandle, RecordStore, RollEvent};

/// Roll log backed by a single JSON file. Every mutation rewrites the file
/// through a temp-file rename, so a crash mid-write cannot truncate the log.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<RollEvent>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                StoreError::Unavailable(format!(
                    "roll log {} is unreadable: {err}",
                    self.path.display()
                ))
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(&self, events: &[RollEvent]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(events)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn backups_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) => parent.join("backups"),
            None => PathBuf::from("backups"),
        }
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn append(&self, event: RollEvent) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;
        events.push(event);
        self.persist(&events).await
    }

    async fn append_unique(&self, event: RollEvent) -> Result<AppendOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;
        if events.iter().any(|existing| existing.same_day(&event)) {
            return Ok(AppendOutcome::DuplicateDay);
        }
        events.push(event);
        self.persist(&events).await?;
        Ok(AppendOutcome::Appended)
    }

    async fn list_all(&self) -> Result<Vec<RollEvent>, StoreError> {
        self.load().await
    }

    async fn backup(&self, name: &str) -> Result<BackupHandle, StoreError> {
        // Hold the write lock so the copy sees a settled file.
        let _guard = self.write_lock.lock().await;
        let dir = self.backups_dir();
        fs::create_dir_all(&dir).await?;
        let dest = dir.join(format!("{name}.json"));
        match fs::copy(&self.path, &dest).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // No rolls yet; an empty log still backs up as an empty log.
                fs::write(&dest, b"[]").await?;
            }
            Err(err) => return Err(err.into()),
        }
        debug!(backup = %dest.display(), "roll log copied");
        Ok(BackupHandle {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn event(user: &str, date: &str, result: u8) -> RollEvent {
        RollEvent {
            user_id: user.to_string(),
            username: format!("{user}-name"),
            date: date.parse().unwrap(),
            timestamp: DateTime::parse_from_rfc3339(&format!("{date}T12:00:00+00:00")).unwrap(),
            result,
        }
    }

    #[tokio::test]
    async fn appends_and_lists_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("rolls.json")).unwrap();

        store.append(event("u1", "2026-08-01", 41)).await.unwrap();
        store.append(event("u2", "2026-08-01", 88)).await.unwrap();
        store.append(event("u1", "2026-08-02", 3)).await.unwrap();

        let events = store.list_all().await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].user_id, "u1");
        assert_eq!(events[1].result, 88);
        assert_eq!(events[2].date, "2026-08-02".parse().unwrap());
    }

    #[tokio::test]
    async fn events_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolls.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.append(event("u1", "2026-08-01", 41)).await.unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        let events = store.list_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], event("u1", "2026-08-01", 41));
    }

    #[tokio::test]
    async fn append_unique_rejects_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("rolls.json")).unwrap();

        let first = store.append_unique(event("u1", "2026-08-01", 41)).await.unwrap();
        assert_eq!(first, AppendOutcome::Appended);

        let second = store.append_unique(event("u1", "2026-08-01", 97)).await.unwrap();
        assert_eq!(second, AppendOutcome::DuplicateDay);

        // A different day for the same user goes through.
        let next_day = store.append_unique(event("u1", "2026-08-02", 12)).await.unwrap();
        assert_eq!(next_day, AppendOutcome::Appended);

        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("rolls.json")).unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_not_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolls.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        // The broken file is left in place for the operator.
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn backup_copies_current_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolls.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.append(event("u1", "2026-08-01", 41)).await.unwrap();

        let handle = store.backup("rolls-backup-20260801T120000").await.unwrap();
        assert_eq!(handle.name, "rolls-backup-20260801T120000");

        let copy = dir.path().join("backups").join("rolls-backup-20260801T120000.json");
        assert_eq!(std::fs::read(&copy).unwrap(), std::fs::read(&path).unwrap());
    }

    #[tokio::test]
    async fn backup_of_empty_log_writes_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("rolls.json")).unwrap();

        store.backup("rolls-backup-empty").await.unwrap();

        let copy = dir.path().join("backups").join("rolls-backup-empty.json");
        let events: Vec<RollEvent> =
            serde_json::from_slice(&std::fs::read(&copy).unwrap()).unwrap();
        assert!(events.is_empty());
    }
}
