//! Structured logging for duorec using the tracing crate.
//!
//! Log lines go to a daily-rotated file under the XDG state directory, never
//! to the terminal, so they do not mix with the recording prompts. Only the
//! 7 most recent log files are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Base name of the log files; rotated files get a `.YYYY-MM-DD` suffix.
pub const LOG_FILE_NAME: &str = "duorec.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes file-based logging.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let log_dir = log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_names(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log dir: {}", log_dir.display());
    Ok(())
}

/// The log directory: `$XDG_STATE_HOME/duorec`, else `~/.local/state/duorec`.
/// Created if missing.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn log_dir() -> Result<PathBuf, anyhow::Error> {
    let log_dir = match std::env::var_os("XDG_STATE_HOME") {
        Some(xdg_state) => PathBuf::from(xdg_state).join("duorec"),
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local/state/duorec"),
    };

    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Rotated log files in `log_dir`, newest first.
pub fn rotated_logs(log_dir: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
    let prefix = format!("{LOG_FILE_NAME}.");
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let file_name = path.file_name()?.to_string_lossy().into_owned();
            let date = file_name.strip_prefix(&prefix)?;
            if date.matches('-').count() != 2 {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, date.to_string(), modified))
        })
        .collect();

    // Dates sort lexically; mtime breaks ties.
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.cmp(&a.2)));
    Ok(log_files.into_iter().map(|(path, _, _)| path).collect())
}

fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    for path in rotated_logs(log_dir)?.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }
    Ok(())
}
