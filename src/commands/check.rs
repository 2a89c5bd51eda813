use std::path::PathBuf;

use anyhow::Result;

use rollcall::{config::load_or_default, store};

/// Resolve the configuration and probe the store without starting the bot.
pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, path) = load_or_default(config_path)?;
    println!("config: {}", path.display());
    println!("civil timezone: UTC{}", config.civil_offset()?);
    println!("store backend: {}", config.store.describe());

    match config.discord_token() {
        Ok(_) => println!("discord token: set"),
        Err(err) => println!("discord token: MISSING ({err})"),
    }

    config.ensure_data_dir()?;
    let store = store::from_config(&config).await?;
    let events = store.list_all().await?;
    println!("events recorded: {}", events.len());
    Ok(())
}
