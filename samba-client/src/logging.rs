//! Logging configuration module
//! Console logging plus an optional rolling log file

use crate::config::LoggingSettings;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "samba-client.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,             // log level (trace, debug, info, warn, error)
    pub file_path: Option<PathBuf>, // log directory
    pub rotation: LogRotation,     // log rotation policy
    pub json_format: bool,         // use JSON formatting in the file
}

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            rotation: LogRotation::Daily,
            json_format: true,
        }
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level.clone(),
            file_path: settings
                .file_logging_enabled
                .then(|| settings.log_dir.clone()),
            rotation: LogRotation::Daily,
            json_format: settings.json_format,
        }
    }
}

impl LoggingConfig {
    /// Initialize logging; keep the returned guard alive so the file
    /// writer flushes
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
        // Create environment filter
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        // Console goes to stderr; stdout carries command output
        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(true)
            .with_writer(io::stderr);

        let mut guard = None;
        let file_layer = match self.file_path {
            Some(ref path) => {
                let file_appender = match self.rotation {
                    LogRotation::Hourly => rolling::hourly(path, LOG_FILE),
                    LogRotation::Daily => rolling::daily(path, LOG_FILE),
                    LogRotation::Never => rolling::never(path, LOG_FILE),
                };
                let (writer, file_guard) = non_blocking(file_appender);
                guard = Some(file_guard);

                let layer = fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(writer);
                Some(if self.json_format {
                    layer.json().boxed()
                } else {
                    layer.boxed()
                })
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!("Logging initialized - level: {}", self.level);

        Ok(guard)
    }

    /// Initialize with default settings
    pub fn init_default() -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
        Self::default().init()
    }
}

/// Record the outcome of one Write step
#[macro_export]
macro_rules! log_subwrite {
    ($step:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::info!(step = $step, ok = true, "Write step finished"),
            Err(e) => tracing::error!(step = $step, ok = false, error = %e, "Write step failed"),
        }
    };
}
