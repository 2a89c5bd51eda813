mod file;
mod memory;
mod sheet;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, StoreConfig},
    error::StoreError,
};

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sheet::SheetStore;

/// Largest value a roll can take; draws are uniform over `0..=MAX_RESULT`.
pub const MAX_RESULT: u8 = 100;

/// Column order of the persisted roll log, identical for every backend.
pub const COLUMNS: [&str; 5] = ["user_id", "username", "date", "timestamp", "result"];

/// One recorded roll. Append-only: events are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollEvent {
    pub user_id: String,
    pub username: String,
    /// Civil date of the roll; always the date component of `timestamp`.
    pub date: NaiveDate,
    pub timestamp: DateTime<FixedOffset>,
    pub result: u8,
}

impl RollEvent {
    /// Two events collide when they share this key.
    pub fn same_day(&self, other: &RollEvent) -> bool {
        self.user_id == other.user_id && self.date == other.date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// An event for the same `(user_id, date)` already exists; nothing was written.
    DuplicateDay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub name: String,
}

/// Durable, append-only roll log. The store is the sole source of truth:
/// callers never cache what it holds.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append one event. The write is durable before this returns `Ok`.
    async fn append(&self, event: RollEvent) -> Result<(), StoreError>;

    /// Append `event` unless the log already holds one with the same
    /// `(user_id, date)`. Check and write run under the backend's own lock,
    /// so concurrent in-process callers cannot both insert for one key.
    async fn append_unique(&self, event: RollEvent) -> Result<AppendOutcome, StoreError>;

    /// Every stored event, oldest first.
    async fn list_all(&self) -> Result<Vec<RollEvent>, StoreError>;

    /// Duplicate the current dataset under `name`, leaving the primary
    /// dataset untouched.
    async fn backup(&self, name: &str) -> Result<BackupHandle, StoreError>;
}

/// Build the configured backend. The sheet backend performs its header
/// self-heal here, so a misconfigured sheet fails at startup, not mid-command.
pub async fn from_config(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    match &config.store {
        StoreConfig::File { .. } => {
            config
                .ensure_data_dir()
                .context("failed to create the data directory")?;
            let store = JsonFileStore::open(config.roll_log_path())
                .context("failed to open the roll log")?;
            Ok(Arc::new(store))
        }
        StoreConfig::Sheet {
            base_url,
            spreadsheet_id,
            tab,
            sheet_id,
        } => {
            let token = config.sheets_token()?;
            let store = SheetStore::connect(base_url, spreadsheet_id, tab, *sheet_id, &token)
                .await
                .context("failed to reach the roll sheet")?;
            Ok(Arc::new(store))
        }
    }
}
