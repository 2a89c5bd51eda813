mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{backup::BackupArgs, start::StartArgs};

#[derive(Parser)]
#[command(author, version, about = "Daily dice-roll chat bot")]
struct Cli {
    /// Path to the configuration file. Defaults to ~/.config/rollcall/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot, health endpoint, and backup scheduler
    Start(StartArgs),
    /// Create a backup of the roll log
    Backup(BackupArgs),
    /// Validate configuration and store connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    rollcall::logging::init();

    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Start(args) => commands::start::execute(config, args).await?,
        Commands::Backup(args) => commands::backup::execute(config, args).await?,
        Commands::Check => commands::check::execute(config).await?,
    }

    Ok(())
}
