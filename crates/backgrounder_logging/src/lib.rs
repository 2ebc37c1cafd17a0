//! Shared logging setup for Backgrounder binaries.
//!
//! Every run appends to a daily log under `~/.backgrounder/logs/` and keeps
//! the last few days. Stderr gets the same events, except while a progress
//! bar owns the terminal: then only warnings get through, unless `verbose`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "backgrounder=info,backgrounder_stream=info";
const KEPT_LOG_FILES: usize = 5;
const HOME_ENV: &str = "BACKGROUNDER_HOME";

/// Logging options chosen by the binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// A progress bar is drawing on the terminal.
    pub progress_ui: bool,
}

/// Flushes buffered file output when dropped. Hold it for the life of `main`.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the file and stderr layers.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = ensure_logs_dir()?;
    let appender = file_appender(&log_dir, config.app_name)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.progress_ui && !config.verbose {
        EnvFilter::new("warn")
    } else {
        file_filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.verbose)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(log_dir = %log_dir.display(), app = config.app_name, "Logging initialized");
    Ok(LogGuard { _file: guard })
}

/// Daily-rotated `<app>.<date>.log`, oldest files pruned past the limit.
fn file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_name)
        .filename_suffix("log")
        .max_log_files(KEPT_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Backgrounder home directory.
///
/// Priority:
/// 1) BACKGROUNDER_HOME
/// 2) HOME/USERPROFILE joined with `.backgrounder`
/// 3) ./.backgrounder
pub fn backgrounder_home() -> PathBuf {
    resolve_home(|key| std::env::var(key).ok())
}

fn resolve_home(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let set = |key: &str| lookup(key).filter(|v| !v.is_empty());
    if let Some(dir) = set(HOME_ENV) {
        return PathBuf::from(dir);
    }
    match set("HOME").or_else(|| set("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join(".backgrounder"),
        None => PathBuf::from(".").join(".backgrounder"),
    }
}

/// Logs directory: ~/.backgrounder/logs
pub fn logs_dir() -> PathBuf {
    backgrounder_home().join("logs")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let dir = logs_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}
