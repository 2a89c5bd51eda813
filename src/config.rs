use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TAB: &str = "rolls";

/// Bot token, read from the environment so it never lands in the config file.
pub const DISCORD_TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";
/// Bearer token for the sheet backend, environment only.
pub const SHEETS_TOKEN_ENV: &str = "SHEETS_API_TOKEN";

const SECONDS_PER_HOUR: i32 = 3_600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fixed offset defining the civil day for roll bookkeeping.
    #[serde(default)]
    pub utc_offset_hours: i8,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            utc_offset_hours: 0,
            data_dir: default_data_dir(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    File {
        /// Roll log location; defaults to `<data_dir>/rolls.json`.
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Sheet {
        #[serde(default = "default_sheets_base_url")]
        base_url: String,
        spreadsheet_id: String,
        #[serde(default = "default_tab")]
        tab: String,
        /// Numeric id of the tab holding the roll log, used for backups.
        #[serde(default)]
        sheet_id: u32,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File { path: None }
    }
}

impl StoreConfig {
    pub fn describe(&self) -> String {
        match self {
            Self::File { path } => match path {
                Some(path) => format!("file ({})", path.display()),
                None => "file".to_string(),
            },
            Self::Sheet {
                spreadsheet_id,
                tab,
                ..
            } => format!("sheet ({spreadsheet_id}, tab {tab})"),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir()
        .ok_or_else(|| ConfigError::Invalid("unable to locate the user config directory".into()))?;
    Ok(base.join("rollcall").join("config.toml"))
}

pub fn load_or_default(path: Option<PathBuf>) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = if let Some(path) = path {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        path
    } else {
        let path = default_config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        path
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let cfg: Config = toml::from_str(&contents)?;
        cfg.validate()?;
        Ok((cfg, config_path))
    } else {
        let cfg = Config::default();
        cfg.save(&config_path)?;
        Ok((cfg, config_path))
    }
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.civil_offset()?;
        if let StoreConfig::Sheet {
            base_url,
            spreadsheet_id,
            tab,
            ..
        } = &self.store
        {
            if base_url.trim().is_empty() {
                return Err(ConfigError::Invalid("store.base_url must not be empty".into()));
            }
            if spreadsheet_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "store.spreadsheet_id must not be empty".into(),
                ));
            }
            if tab.trim().is_empty() {
                return Err(ConfigError::Invalid("store.tab must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn civil_offset(&self) -> Result<FixedOffset, ConfigError> {
        let hours = i32::from(self.utc_offset_hours);
        if !(-12..=14).contains(&hours) {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_hours must be between -12 and 14, got {hours}"
            )));
        }
        FixedOffset::east_opt(hours * SECONDS_PER_HOUR)
            .ok_or_else(|| ConfigError::Invalid(format!("invalid utc offset {hours}")))
    }

    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn roll_log_path(&self) -> PathBuf {
        match &self.store {
            StoreConfig::File { path: Some(path) } => path.clone(),
            _ => self.data_dir.join("rolls.json"),
        }
    }

    pub fn backup_marker_path(&self) -> PathBuf {
        self.data_dir.join("last_backup.json")
    }

    pub fn discord_token(&self) -> Result<String, ConfigError> {
        require_env(DISCORD_TOKEN_ENV)
    }

    pub fn sheets_token(&self) -> Result<String, ConfigError> {
        require_env(SHEETS_TOKEN_ENV)
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sheets_base_url() -> String {
    DEFAULT_SHEETS_BASE_URL.to_string()
}

fn default_tab() -> String {
    DEFAULT_TAB.to_string()
}

fn default_data_dir() -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(".rollcall");
    };
    home.join(".rollcall")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_defaults_when_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let (config, written_to) = load_or_default(Some(path.clone())).unwrap();
        assert_eq!(written_to, path);
        assert!(path.exists());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.utc_offset_hours, 0);
        assert!(matches!(config.store, StoreConfig::File { path: None }));
    }

    #[test]
    fn reads_back_saved_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.port = 9311;
        config.utc_offset_hours = 9;
        config.store = StoreConfig::Sheet {
            base_url: "http://localhost:9999".into(),
            spreadsheet_id: "sheet-1".into(),
            tab: "rolls".into(),
            sheet_id: 0,
        };
        config.save(&path).unwrap();

        let (loaded, _) = load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.port, 9311);
        assert_eq!(loaded.utc_offset_hours, 9);
        match loaded.store {
            StoreConfig::Sheet { spreadsheet_id, .. } => assert_eq!(spreadsheet_id, "sheet-1"),
            other => panic!("expected sheet backend, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let mut config = Config::default();
        config.utc_offset_hours = 15;
        assert!(config.civil_offset().is_err());

        config.utc_offset_hours = -12;
        let offset = config.civil_offset().unwrap();
        assert_eq!(offset.local_minus_utc(), -12 * SECONDS_PER_HOUR);
    }

    #[test]
    fn rejects_sheet_backend_without_spreadsheet_id() {
        let mut config = Config::default();
        config.store = StoreConfig::Sheet {
            base_url: DEFAULT_SHEETS_BASE_URL.into(),
            spreadsheet_id: "  ".into(),
            tab: DEFAULT_TAB.into(),
            sheet_id: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_env_var_is_reported_by_name() {
        let err = require_env("ROLLCALL_TEST_UNSET_VARIABLE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "required environment variable ROLLCALL_TEST_UNSET_VARIABLE is not set"
        );
    }

    #[test]
    fn roll_log_path_prefers_explicit_store_path() {
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/tmp/rollcall-data");
        assert_eq!(
            config.roll_log_path(),
            PathBuf::from("/tmp/rollcall-data/rolls.json")
        );

        config.store = StoreConfig::File {
            path: Some(PathBuf::from("/srv/rolls.json")),
        };
        assert_eq!(config.roll_log_path(), PathBuf::from("/srv/rolls.json"));
    }
}
