//! # Logging Setup
//!
//! Console output plus an optional session log file, filtered by `RUST_LOG`
//! or the configured level.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` wins, then `override_level`, then the config.
pub fn env_filter(config: &LoggingConfig, override_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = override_level.unwrap_or(&config.level);
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Installs the global subscriber. The returned guard flushes the file writer
/// on drop and must be held for the life of the process.
pub fn init(config: &LoggingConfig, override_level: Option<&str>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &config.file {
        Some(file) => {
            let dir = Path::new(&config.data_dir);
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }

            // One log per session
            let log_path = dir.join(file);
            if log_path.exists() {
                let _ = fs::remove_file(&log_path);
            }

            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(config, override_level))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
