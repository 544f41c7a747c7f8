//! The one line the host leaves on disk: `Host started at <timestamp>`.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::task::JoinHandle;

use crate::config::HostConfig;
use crate::error::ConfigError;

/// Somewhere to record that the host started.
pub trait StartupLog: Send + Sync {
    fn append(&self, line: &str) -> io::Result<()>;
}

/// Appends to a file, creating it if needed.
#[derive(Debug, Clone)]
pub struct FileStartupLog {
    path: PathBuf,
}

impl FileStartupLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StartupLog for FileStartupLog {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Used when logging is disabled or there is nowhere to write.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStartupLog;

impl StartupLog for NoopStartupLog {
    fn append(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T09:30:00.123Z`.
pub fn startup_line(at: DateTime<Utc>) -> String {
    format!(
        "Host started at {}\n",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

pub fn from_config(config: &HostConfig) -> Arc<dyn StartupLog> {
    match config.startup_log_path() {
        Some(path) => Arc::new(FileStartupLog::new(path)),
        None => {
            tracing::debug!("Startup log disabled");
            Arc::new(NoopStartupLog)
        }
    }
}

/// Pick the log for whatever discovery produced.
///
/// A broken config still gets the default log under `fallback_dir`, so a
/// start that fails on configuration leaves its line like any other.
pub fn from_discovery(
    discovered: &Result<HostConfig, ConfigError>,
    fallback_dir: Option<PathBuf>,
) -> Arc<dyn StartupLog> {
    match discovered {
        Ok(config) => from_config(config),
        Err(_) => from_config(&HostConfig::with_base_dir(fallback_dir)),
    }
}

/// Write the startup line on a blocking thread without waiting for it.
///
/// Failures are reported to diagnostics only. The handle exists for tests;
/// the host drops it.
pub fn announce_start(log: Arc<dyn StartupLog>) -> JoinHandle<()> {
    let line = startup_line(Utc::now());
    tokio::task::spawn_blocking(move || {
        if let Err(e) = log.append(&line) {
            tracing::warn!(error = %e, "Could not write startup log");
        }
    })
}
