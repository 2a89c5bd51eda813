use chrono::Utc;
use poise::serenity_prelude as serenity;
use serenity::Mentionable;
use tracing::{error, info};

use crate::{
    backup::BackupService,
    error::RollError,
    leaderboard::{DEFAULT_WINDOW_DAYS, LeaderboardService, Period},
    roll::RollService,
};

pub const COMMAND_PREFIX: &str = "!";

const STORE_DOWN_REPLY: &str =
    "the roll log is unavailable right now, nothing was recorded - try again in a moment";

pub struct Data {
    pub roll: RollService,
    pub leaderboard: LeaderboardService,
    pub backup: BackupService,
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Roll the daily die, once per day.
#[poise::command(prefix_command)]
async fn roll(ctx: Context<'_>) -> Result<(), Error> {
    let author = ctx.author();
    let reply = match ctx
        .data()
        .roll
        .roll(&author.id.to_string(), &author.name, Utc::now())
        .await
    {
        Ok(outcome) => format!(
            "{} rolls the die... **{}**",
            author.mention(),
            outcome.result
        ),
        Err(RollError::AlreadyRolledToday) => format!(
            "{} you already rolled today, come back tomorrow",
            author.mention()
        ),
        Err(RollError::PersistenceFailed(err)) => {
            error!(user = %author.id, "roll not recorded: {err}");
            STORE_DOWN_REPLY.to_string()
        }
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Show the best rolls: `today` or `all` (current month).
#[poise::command(prefix_command)]
async fn top(ctx: Context<'_>, period: Option<String>) -> Result<(), Error> {
    // Parse before touching the store; bad input never costs a read.
    let Ok(period) = period.as_deref().unwrap_or("").parse::<Period>() else {
        ctx.say(format!("usage: `{COMMAND_PREFIX}top <today|all>`"))
            .await?;
        return Ok(());
    };

    match ctx.data().leaderboard.top(period, Utc::now()).await {
        Ok(Some(entries)) => {
            let title = match period {
                Period::Today => "Top rolls today",
                Period::CurrentMonth => "Top rolls this month",
            };
            let lines: Vec<String> = entries
                .iter()
                .enumerate()
                .map(|(rank, entry)| format!("{}. **{}**: {}", rank + 1, entry.username, entry.best))
                .collect();
            let embed = serenity::CreateEmbed::new()
                .title(title)
                .description(lines.join("\n"))
                .colour(serenity::Colour::DARK_GOLD);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Ok(None) => {
            ctx.say("no rolls recorded for that period yet").await?;
        }
        Err(err) => {
            error!("leaderboard query failed: {err}");
            ctx.say(STORE_DOWN_REPLY).await?;
        }
    }
    Ok(())
}

/// Daily win counts over the last days (default 7).
#[poise::command(prefix_command)]
async fn daily(ctx: Context<'_>, days: Option<u32>) -> Result<(), Error> {
    match ctx.data().leaderboard.daily_wins(days, Utc::now()).await {
        Ok(ranking) if ranking.is_empty() => {
            ctx.say("no wins in that window yet").await?;
        }
        Ok(ranking) => {
            let window = match days {
                Some(days) if days >= 1 => days,
                _ => DEFAULT_WINDOW_DAYS,
            };
            let lines: Vec<String> = ranking
                .iter()
                .map(|win| {
                    let plural = if win.wins == 1 { "" } else { "s" };
                    format!("**{}**: {} win{plural}", win.username, win.wins)
                })
                .collect();
            let embed = serenity::CreateEmbed::new()
                .title(format!("Daily wins, last {window} days"))
                .description(lines.join("\n"))
                .colour(serenity::Colour::DARK_GOLD);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(err) => {
            error!("daily win query failed: {err}");
            ctx.say(STORE_DOWN_REPLY).await?;
        }
    }
    Ok(())
}

/// Back up the roll log right now.
#[poise::command(prefix_command)]
async fn backup(ctx: Context<'_>) -> Result<(), Error> {
    let reply = match ctx.data().backup.backup_now(Utc::now()).await {
        Ok(handle) => format!("backup created: `{}`", handle.name),
        Err(err) => {
            error!("manual backup failed: {err}");
            "backup failed, the roll log is untouched - check the logs".to_string()
        }
    };
    ctx.say(reply).await?;
    Ok(())
}

/// List the available commands.
#[poise::command(prefix_command, rename = "command", aliases("commands"))]
async fn command_list(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(concat!(
        "`!roll` roll the daily die (once per day)\n",
        "`!top today` best rolls today\n",
        "`!top all` best rolls this month\n",
        "`!daily [days]` daily win counts, default window 7 days\n",
        "`!backup` back up the roll log\n",
        "`!command` this list",
    ))
    .await?;
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(command = %ctx.command().qualified_name, "command failed: {error}");
        }
        other => {
            if let Err(err) = poise::builtins::on_error(other).await {
                error!("error handler failed: {err}");
            }
        }
    }
}

/// Connect to the gateway and serve commands until the client stops.
pub async fn run(token: String, data: Data) -> Result<(), serenity::Error> {
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let options = poise::FrameworkOptions {
        commands: vec![roll(), top(), daily(), backup(), command_list()],
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some(COMMAND_PREFIX.into()),
            ..Default::default()
        },
        on_error: |error| Box::pin(on_error(error)),
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .options(options)
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("connected to the chat gateway as {}", ready.user.name);
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;
    client.start().await
}
