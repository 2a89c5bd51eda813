use std::{io, path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, warn};

use crate::{
    error::BackupError,
    store::{BackupHandle, RecordStore},
};

/// How often the scheduler wakes up. Whether a backup actually runs is
/// decided by the persisted marker, not by the tick cadence.
pub const BACKUP_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct BackupMarker {
    last_backup: NaiveDate,
}

/// Duplicates the roll log on demand and once per civil month on a timer.
/// The last scheduled run is recorded in a marker file, so restarts neither
/// double-fire within a month nor skip a month that is due.
#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn RecordStore>,
    marker_path: PathBuf,
    offset: FixedOffset,
}

impl BackupService {
    pub fn new(store: Arc<dyn RecordStore>, marker_path: PathBuf, offset: FixedOffset) -> Self {
        Self {
            store,
            marker_path,
            offset,
        }
    }

    /// Back up under a name embedding the current civil timestamp.
    pub async fn backup_now(&self, now: DateTime<Utc>) -> Result<BackupHandle, BackupError> {
        self.backup_as(&backup_name(now.with_timezone(&self.offset)))
            .await
    }

    /// Back up under an explicit name. The primary dataset is unchanged
    /// whether this succeeds or fails.
    pub async fn backup_as(&self, name: &str) -> Result<BackupHandle, BackupError> {
        let handle = self.store.backup(name).await?;
        info!(backup = %handle.name, "dataset backup created");
        Ok(handle)
    }

    /// Periodic entry point. Runs a backup when the civil month changed
    /// since the last recorded one; the marker is written only after the
    /// backup succeeded, so a failed run is retried at the next tick.
    pub async fn run_scheduled(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<BackupHandle>, BackupError> {
        let today = now.with_timezone(&self.offset).date_naive();
        if let Some(last) = self.read_marker().await? {
            if last.year() == today.year() && last.month() == today.month() {
                return Ok(None);
            }
        }
        let handle = self.backup_now(now).await?;
        self.write_marker(today).await?;
        Ok(Some(handle))
    }

    async fn read_marker(&self) -> Result<Option<NaiveDate>, BackupError> {
        match fs::read(&self.marker_path).await {
            Ok(bytes) => match serde_json::from_slice::<BackupMarker>(&bytes) {
                Ok(marker) => Ok(Some(marker.last_backup)),
                Err(err) => {
                    // A broken marker only risks one extra backup; take it
                    // and let the rewrite heal the file.
                    warn!("backup marker is unreadable ({err}), treating it as absent");
                    Ok(None)
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_marker(&self, date: NaiveDate) -> Result<(), BackupError> {
        if let Some(parent) = self.marker_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(&BackupMarker { last_backup: date })
            .map_err(|err| BackupError::Unavailable(err.to_string()))?;
        fs::write(&self.marker_path, bytes).await?;
        Ok(())
    }
}

/// Spawn the 24 h scheduler. Failures are logged and retried next tick;
/// they never take the process down.
pub fn spawn_scheduler(service: BackupService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(BACKUP_INTERVAL);
        loop {
            ticker.tick().await;
            match service.run_scheduled(Utc::now()).await {
                Ok(Some(handle)) => info!(backup = %handle.name, "scheduled backup completed"),
                Ok(None) => {}
                Err(err) => error!("scheduled backup failed: {err}"),
            }
        }
    })
}

fn backup_name(at: DateTime<FixedOffset>) -> String {
    format!("rolls-backup-{}", at.format("%Y%m%dT%H%M%S"))
}
