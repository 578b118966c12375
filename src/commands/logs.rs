//! Display recent log entries from the application.

use anyhow::anyhow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::logging::{get_log_dir, LOG_FILE_PREFIX};

const DEFAULT_LINES: usize = 50;

/// Prints the tail of the newest log file.
///
/// # Errors
/// - If the log directory cannot be determined or read
/// - If the log file cannot be read
pub fn handle_logs() -> anyhow::Result<()> {
    let log_dir = get_log_dir()?;
    if !log_dir.exists() {
        println!("No logs yet. They will appear in {}", log_dir.display());
        return Ok(());
    }

    let Some(log_file) = find_latest_log(&log_dir)? else {
        println!("No log files found in {}", log_dir.display());
        println!("Run 'lexirec' to generate logs.");
        return Ok(());
    };

    let content =
        fs::read_to_string(&log_file).map_err(|e| anyhow!("Failed to read log file: {e}"))?;
    let (shown, total) = tail(&content, DEFAULT_LINES);
    if total == 0 {
        println!("Log file is empty: {}", log_file.display());
        return Ok(());
    }

    println!(
        "{} ({} of {} lines)",
        log_file.display(),
        shown.len(),
        total
    );
    println!();
    for line in shown {
        println!("{line}");
    }
    Ok(())
}

/// Last `count` lines of `content`, and the total line count.
fn tail(content: &str, count: usize) -> (Vec<&str>, usize) {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    (lines[total.saturating_sub(count)..].to_vec(), total)
}

/// Most recently modified `lexirec.log*` file in `log_dir`.
fn find_latest_log(log_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let entries =
        fs::read_dir(log_dir).map_err(|e| anyhow!("Failed to read log directory: {e}"))?;

    let latest = entries
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?;
            if !name.starts_with(LOG_FILE_PREFIX) {
                return None;
            }
            let modified: SystemTime = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .max_by_key(|(_, modified)| *modified)
        .map(|(path, _)| path);
    Ok(latest)
}
