use std::io;

use thiserror::Error;

/// Failures of the record store itself, shared by every backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record serialization failed: {0}")]
    Serialization(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Why a roll request produced no new record.
#[derive(Debug, Error)]
pub enum RollError {
    #[error("already rolled today")]
    AlreadyRolledToday,
    /// The roll did not happen: nothing was stored and the user may retry.
    #[error("roll not recorded: {0}")]
    PersistenceFailed(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("leaderboard unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup failed: {0}")]
    Unavailable(String),
}

impl From<StoreError> for BackupError {
    fn from(err: StoreError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Invalid(String),
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration parse error: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
