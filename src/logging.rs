//! Tracing setup: compact stdout output plus an optional rolling log file.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the global tracing subscriber.
///
/// The level comes from `RUST_LOG` and falls back to `info`. Terminal output
/// stays compact; with `log_dir` set, a daily-rotated `wikicrawl.log` is
/// written there as well, through a non-blocking appender whose guard is
/// leaked so buffered lines survive until process exit.
///
/// # Errors
/// Fails if the log directory cannot be created or the `RUST_LOG` fallback
/// cannot be parsed. Calling this twice makes `init` panic, so it belongs in
/// `main` only.
pub fn init(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter.clone());

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;

            let file_appender = tracing_appender::rolling::daily(dir, "wikicrawl.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .compact()
                .with_filter(env_filter);

            tracing_subscriber::registry()
                .with(stdout_layer)
                .with(file_layer)
                .init();

            // The guard flushes the appender when dropped; it must outlive
            // every log call, so it is leaked for the process lifetime.
            Box::leak(Box::new(guard));

            tracing::info!("logging to stdout and {}/wikicrawl.log", dir.display());
        }
        None => {
            tracing_subscriber::registry().with(stdout_layer).init();
        }
    }

    Ok(())
}
