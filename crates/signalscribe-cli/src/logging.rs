//! Logging setup: `tracing` + `tracing-subscriber`, with an optional
//! rolling file sink (ambient addition per SPEC_FULL §6, replacing
//! `original_source/SignalScribe/logging.py`'s `RotatingFileHandler` +
//! `cleanup_old_logs` with `tracing-appender`'s rolling appender).
//!
//! `--no-logs` disables only the file layer — the Open Question in
//! spec.md §9 is resolved in DESIGN.md: in-process log forwarding from the
//! transcriber thread keeps working either way, since it shares this
//! process's one `tracing` dispatcher.

use std::path::{Path, PathBuf};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const NUM_LOG_FILES_TO_KEEP: usize = 10;
const LOG_NAME_PREFIX: &str = "signalscribe";

pub struct LoggingConfig {
    pub log_path: Option<PathBuf>,
    pub no_logs: bool,
    pub verbose: bool,
    pub debug: bool,
}

/// Installs the global tracing subscriber. Returns the resolved log file
/// path (for the startup parameters banner) when file logging is active,
/// and a guard that must be kept alive for the process lifetime (dropping
/// it stops the non-blocking file writer from flushing).
pub fn init(config: &LoggingConfig) -> anyhow::Result<(Option<PathBuf>, Option<tracing_appender::non_blocking::WorkerGuard>)> {
    let console_level = if config.debug {
        LevelFilter::TRACE
    } else if config.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_filter(console_level);

    let registry = tracing_subscriber::registry().with(console_layer);

    if config.no_logs {
        registry.init();
        return Ok((None, None));
    }

    let log_dir = resolve_log_dir(config.log_path.as_deref())?;
    std::fs::create_dir_all(&log_dir)?;
    cleanup_old_logs(&log_dir, NUM_LOG_FILES_TO_KEEP);

    let file_appender = tracing_appender::rolling::never(&log_dir, log_file_name());
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    registry.with(file_layer).init();

    let log_path = log_dir.join(log_file_name());
    Ok((Some(log_path), Some(guard)))
}

fn resolve_log_dir(override_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match override_path {
        Some(p) if p.extension().is_some() => Ok(p
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))),
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".signalscribe")
            .join("logs")),
    }
}

fn log_file_name() -> String {
    let now = chrono::Local::now();
    format!("{LOG_NAME_PREFIX}-{}.log", now.format("%Y%m%d_%H%M%S"))
}

/// Keep only the `keep_last_n` most recently modified log files, matching
/// `original_source/SignalScribe/logging.py::cleanup_old_logs`.
fn cleanup_old_logs(log_dir: &Path, keep_last_n: usize) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };
    let mut logs: Vec<(PathBuf, std::time::SystemTime)> = entries
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(LOG_NAME_PREFIX)
        })
        .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()).map(|t| (e.path(), t)))
        .collect();
    logs.sort_by_key(|(_, t)| std::cmp::Reverse(*t));

    for (path, _) in logs.into_iter().skip(keep_last_n) {
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove old log file");
        }
    }
}
