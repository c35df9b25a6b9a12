//! Structured logging for fusewatt
//!
//! `tracing`-based structured logging with a daily-rolling file appender (one
//! file per calendar day, so `/api/log` can serve a specific day's log) and an
//! optional console layer.

use crate::config::LoggingConfig;
use crate::error::{FusewattError, Result};
use std::sync::Once;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_GUARD: once_cell::sync::OnceCell<WorkerGuard> = once_cell::sync::OnceCell::new();
static INIT_ONCE: Once = Once::new();
static INIT_ERROR: once_cell::sync::OnceCell<String> = once_cell::sync::OnceCell::new();

/// Filename prefix used for the daily-rolling log files.
pub const LOG_FILE_PREFIX: &str = "fusewatt";

/// Initialize the logging subsystem. Idempotent — later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        let init_result = (|| -> Result<()> {
            let level = parse_log_level(&config.level)?;
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fusewatt={},tokio_modbus=warn", level).into());

            std::fs::create_dir_all(&config.directory)?;

            let file_appender = rolling::Builder::new()
                .rotation(rolling::Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(&config.directory)
                .map_err(|e| FusewattError::io(format!("failed to create log appender: {e}")))?;
            let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            let file_layer = fmt::layer()
                .with_writer(non_blocking_appender)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_filter(LevelFilter::from_level(level));

            let registry = tracing_subscriber::registry().with(filter).with(file_layer);

            if config.console_output {
                let console_layer = fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_filter(LevelFilter::from_level(level));
                registry.with(console_layer).init();
            } else {
                registry.init();
            }

            info!("Logging initialized - level: {:?}, directory: {}", level, config.directory);
            Ok(())
        })();

        if let Err(e) = init_result {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(FusewattError::config(err.clone()));
    }
    Ok(())
}

/// Path to the log file for a given `YYYY-MM-DD` date, matching the naming
/// scheme `tracing_appender`'s daily rotation writes (§4.10, §6 `/api/log`).
pub fn log_file_path_for_date(directory: &str, date: &str) -> std::path::PathBuf {
    std::path::Path::new(directory).join(format!("{LOG_FILE_PREFIX}.{date}.log"))
}

fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(FusewattError::config(format!("invalid log level: {level_str}"))),
    }
}

/// A component-tagged logger, matching the reference codebase's `get_logger(component)`
/// ergonomics so call sites read `logger.info(...)` rather than bare `tracing::info!`.
#[derive(Clone)]
pub struct StructuredLogger {
    component: &'static str,
}

impl StructuredLogger {
    pub fn info(&self, message: &str) {
        info!(component = self.component, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(component = self.component, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(component = self.component, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(component = self.component, "{}", message);
    }

    pub fn trace(&self, message: &str) {
        trace!(component = self.component, "{}", message);
    }
}

/// Create a logger tagged with the given component name
pub fn get_logger(component: &'static str) -> StructuredLogger {
    StructuredLogger { component }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_for_date() {
        let p = log_file_path_for_date("/tmp/logs", "2026-07-31");
        assert_eq!(p, std::path::PathBuf::from("/tmp/logs/fusewatt.2026-07-31.log"));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut cfg = LoggingConfig::default();
        cfg.level = "LOUD".to_string();
        // init_logging is process-global and Once-guarded, so we only check the
        // pure parsing helper here to avoid interfering with other tests' subscriber.
        assert!(parse_log_level(&cfg.level).is_err());
    }

    #[test]
    fn test_valid_levels_parse() {
        for lvl in ["trace", "DEBUG", "Info", "warn", "ERROR"] {
            assert!(parse_log_level(lvl).is_ok());
        }
    }
}
