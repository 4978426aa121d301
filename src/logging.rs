//! Tracing subscriber setup.
//!
//! The TUI owns the terminal, so interactive sessions log to a file under the
//! configured log directory. Scripted subcommands log to stderr. Both respect
//! `RUST_LOG`; the file log defaults to `info`, stderr to `warn`.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "jarvis.log";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Log to `<log_dir>/jarvis.log`. Keep the returned guard alive until exit so
/// buffered lines are flushed. Without a usable log directory nothing is
/// recorded and the session still starts.
pub fn init_file(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(dir) = log_dir else {
        return Ok(None);
    };
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "warning: file logging disabled, cannot create {}: {}",
            dir.display(),
            e
        );
        return Ok(None);
    }

    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter("jarvis_chat=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()?;

    Ok(Some(guard))
}

pub fn init_stderr() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter("jarvis_chat=warn"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}
