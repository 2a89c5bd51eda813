use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use rollcall::{backup::BackupService, config::load_or_default, store};

#[derive(Args)]
pub struct BackupArgs {
    /// Name for the backup; defaults to one embedding the current timestamp
    #[arg(long)]
    pub name: Option<String>,
}

pub async fn execute(config_path: Option<PathBuf>, args: BackupArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let offset = config.civil_offset()?;
    config.ensure_data_dir()?;
    let store = store::from_config(&config).await?;

    let service = BackupService::new(store, config.backup_marker_path(), offset);
    let handle = match args.name.as_deref() {
        Some(name) => service.backup_as(name).await?,
        None => service.backup_now(Utc::now()).await?,
    };
    println!("backup created: {}", handle.name);
    Ok(())
}
