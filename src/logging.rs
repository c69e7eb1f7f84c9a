use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a console-only tracing subscriber.
///
/// Honors `RUST_LOG` when set; otherwise uses `debug` or `info` depending on
/// `debug_mode`. Intended for demos and host applications; the library itself
/// only emits through `tracing` macros and never installs a subscriber.
pub fn init(debug_mode: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(debug_mode, "logging initialized (console)");
    Ok(())
}

/// Install a tracing subscriber with console output plus a daily-rotating
/// log file under `log_dir`.
///
/// The returned guard must be held for the program's lifetime to keep the
/// non-blocking file writer flushing.
pub fn init_with_file(log_dir: &Utf8Path, prefix: &str, debug_mode: bool) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {log_dir}"))?;
    }

    let file_appender = rolling::daily(log_dir, prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(%log_dir, prefix, debug_mode, "logging initialized (console + file)");
    Ok(guard)
}

fn env_filter(debug_mode: bool) -> EnvFilter {
    let default = if debug_mode { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
