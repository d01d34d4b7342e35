//! 日志初始化
//!
//! `RUST_LOG` takes precedence over the configured level. Output always goes
//! to stderr, as JSON when `logging.json` is set; with `logging.directory`
//! a daily rolling file is written as well.

use crate::error::{PoolError, Result};
use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "resource-pool.log";

/// Build the level filter
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            PoolError::configuration(format!("invalid log level {:?}: {}", config.level, e))
        }),
    }
}

/// Install the global subscriber
///
/// Keep the returned guard alive for as long as the file sink should be
/// flushed; dropping it stops the background writer.
///
/// # Errors
///
/// `PoolError::Configuration` for an invalid level or an unusable log
/// directory, `PoolError::Internal` if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if config.json {
        layers.push(fmt::layer().json().with_writer(io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_target(true).with_writer(io::stderr).boxed());
    }

    let guard = match &config.directory {
        Some(directory) => {
            fs::create_dir_all(directory).map_err(|e| {
                PoolError::configuration(format!(
                    "cannot create log directory {}: {}",
                    directory.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| PoolError::Internal(format!("failed to install subscriber: {}", e)))?;

    tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    Ok(guard)
}
