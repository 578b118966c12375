//! Structured logging for lexirec using the tracing crate.
//!
//! Logs go to daily-rotated files under the XDG state directory, never to the
//! terminal, which belongs to the recorder TUI. Only the 7 most recent files
//! are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Base name of the rolling log files; rotation appends `.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "lexirec.log";

/// Keeps the non-blocking writer flushing until the process exits.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Log files retained by [`cleanup_old_logs`].
const MAX_LOG_FILES: usize = 7;

/// Installs the global subscriber writing to `lexirec.log.YYYY-MM-DD`.
///
/// `RUST_LOG` selects the level; without it everything at `info` and above
/// is written.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let log_dir = get_log_dir()?;
    fs::create_dir_all(&log_dir)?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {}", e);
    }

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(())
}

/// Determines the log directory, following XDG Base Directory Specification.
///
/// Prefers XDG_STATE_HOME if set, otherwise uses ~/.local/state/lexirec.
/// The directory is not created here.
pub fn get_log_dir() -> Result<PathBuf, anyhow::Error> {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg_state).join("lexirec"));
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".local/state/lexirec"))
}

/// Deletes rotated log files beyond the newest [`MAX_LOG_FILES`].
fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    let rotated_prefix = format!("{LOG_FILE_PREFIX}.");

    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();

            // lexirec.log.YYYY-MM-DD
            if file_name.starts_with(&rotated_prefix) && file_name.matches('-').count() == 2 {
                let metadata = fs::metadata(&path).ok()?;
                let modified = metadata.modified().ok()?;
                Some((path, modified))
            } else {
                None
            }
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_keeps_newest_rotated_logs() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let base = SystemTime::now() - Duration::from_secs(86_400 * 30);
        for day in 1..=9 {
            let path = temp.path().join(format!("{LOG_FILE_PREFIX}.2026-10-{day:02}"));
            fs::write(&path, "entry")?;
            fs::File::options()
                .write(true)
                .open(&path)?
                .set_modified(base + Duration::from_secs(86_400 * day))?;
        }
        fs::write(temp.path().join("notes.txt"), "keep")?;

        cleanup_old_logs(temp.path())?;

        let remaining: Vec<String> = fs::read_dir(temp.path())?
            .filter_map(|e| e.ok()?.file_name().into_string().ok())
            .collect();
        assert_eq!(remaining.len(), MAX_LOG_FILES + 1);
        assert!(remaining.contains(&"notes.txt".to_string()));
        assert!(!remaining.contains(&format!("{LOG_FILE_PREFIX}.2026-10-01")));
        assert!(!remaining.contains(&format!("{LOG_FILE_PREFIX}.2026-10-02")));
        Ok(())
    }
}
