//! Playback of recordings through the system audio player.

use anyhow::anyhow;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use super::session::AudioFile;

/// Players tried on Linux when `xdg-open` is unavailable.
#[cfg(target_os = "linux")]
const FALLBACK_PLAYERS: [&str; 4] = ["mpv", "vlc", "ffplay", "paplay"];

/// Launches the system player on `path` with its output detached from the terminal.
///
/// On macOS: Uses `open`.
/// On Linux: Tries xdg-open first, then falls back to common audio players.
///
/// # Errors
/// - If no audio player could be started
pub fn spawn_player(path: &Path) -> anyhow::Result<Child> {
    #[cfg(target_os = "macos")]
    {
        quiet(Command::new("open").arg(path))
            .spawn()
            .map_err(|e| anyhow!("Failed to open audio player: {e}"))
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(child) = quiet(Command::new("xdg-open").arg(path)).spawn() {
            return Ok(child);
        }
        for player in FALLBACK_PLAYERS {
            if let Ok(child) = quiet(Command::new(player).arg(path)).spawn() {
                tracing::debug!("Playing with {}", player);
                return Ok(child);
            }
        }
        Err(anyhow!(
            "No audio player found. Install mpv, vlc, ffplay, or paplay"
        ))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(anyhow!(
            "Playback is not supported on this platform: {}",
            path.display()
        ))
    }
}

fn quiet(command: &mut Command) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
}

/// Writes the preview source to a scratch file and starts playing it.
///
/// The scratch file is per-process and overwritten by the next preview.
pub fn preview(file: &AudioFile) -> anyhow::Result<Child> {
    let path = std::env::temp_dir().join(format!("lexirec_preview_{}.wav", std::process::id()));
    std::fs::write(&path, file.bytes())
        .map_err(|e| anyhow!("Failed to write preview file: {e}"))?;
    tracing::debug!("Preview written to {}", path.display());
    spawn_player(&path)
}

/// Drops handles of players that have exited, reaping their processes.
///
/// Returns how many players are still running.
pub fn reap_finished(players: &mut Vec<Child>) -> usize {
    players.retain_mut(|child| match child.try_wait() {
        Ok(Some(status)) => {
            tracing::debug!("Player {} exited: {}", child.id(), status);
            false
        }
        Ok(None) => true,
        Err(e) => {
            tracing::warn!("Lost track of player {}: {}", child.id(), e);
            false
        }
    });
    players.len()
}
