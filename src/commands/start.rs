use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use rollcall::{
    backup::{self, BackupService},
    bot::{self, Data},
    config::load_or_default,
    leaderboard::LeaderboardService,
    roll::RollService,
    server, store,
};

#[derive(Args)]
pub struct StartArgs {
    /// Override the health endpoint port from the configuration file
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the configured data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub async fn execute(config_path: Option<PathBuf>, args: StartArgs) -> Result<()> {
    let (mut config, path) = load_or_default(config_path)?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    info!(config = %path.display(), "starting rollcall");

    // Fail on missing secrets before anything connects anywhere.
    let token = config.discord_token()?;
    let offset = config.civil_offset()?;
    config.ensure_data_dir()?;
    let store = store::from_config(&config).await?;

    let data = Data {
        roll: RollService::new(store.clone(), offset),
        leaderboard: LeaderboardService::new(store.clone(), offset),
        backup: BackupService::new(store, config.backup_marker_path(), offset),
    };
    let scheduler = backup::spawn_scheduler(data.backup.clone());

    let result = tokio::select! {
        result = server::serve(config.port) => result.context("health endpoint stopped"),
        result = bot::run(token, data) => result.context("chat client stopped"),
    };
    scheduler.abort();
    result
}
