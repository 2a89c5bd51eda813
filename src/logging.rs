use std::{
    env,
    path::PathBuf,
    sync::OnceLock,
};

use tracing_appender::{
    non_blocking::{self, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR_ENV: &str = "ROLLCALL_LOG_DIR";
const LOG_FILE_PREFIX: &str = "rollcall";

static INIT: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: stdout always, plus a daily-rolling file
/// layer when `ROLLCALL_LOG_DIR` is set. Safe to call more than once.
pub fn init() {
    INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let stdout_layer = fmt::layer().with_target(false);

        let mut file_guard = None;
        let file_layer = resolve_log_dir().and_then(|dir| {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(&dir);
            match appender {
                Ok(appender) => {
                    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
                        .lossy(false)
                        .finish(appender);
                    file_guard = Some(guard);
                    Some(
                        fmt::layer()
                            .with_writer(writer)
                            .with_target(true)
                            .with_ansi(false),
                    )
                }
                Err(err) => {
                    eprintln!("failed to open log directory {}: {err}", dir.display());
                    None
                }
            }
        });

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .with(file_layer);

        match subscriber.try_init() {
            Ok(()) => {
                if let Some(guard) = file_guard {
                    let _ = FILE_GUARD.set(guard);
                }
                install_panic_hook();
            }
            Err(_) => {
                // Subscriber already installed elsewhere; drop the guard so the worker thread exits.
                drop(file_guard);
            }
        }
    });
}

fn resolve_log_dir() -> Option<PathBuf> {
    let dir = env::var(LOG_DIR_ENV).ok()?;
    if dir.trim().is_empty() {
        return None;
    }
    let path = PathBuf::from(dir);
    if path.is_absolute() {
        return Some(path);
    }
    env::current_dir().ok().map(|base| base.join(path))
}

fn install_panic_hook() {
    static PANIC_HOOK: OnceLock<()> = OnceLock::new();
    PANIC_HOOK.get_or_init(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                tracing::error!(
                    target: "panic",
                    file = location.file(),
                    line = location.line(),
                    message = %info
                );
            } else {
                tracing::error!(target: "panic", message = %info);
            }
            default_hook(info);
        }));
    });
}
