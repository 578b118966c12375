//! Replay a saved recording using the system audio player.

use crate::config::LexirecConfig;
use crate::recording::{playback, RecordingLibrary};

/// Plays back a saved recording and waits for the player to exit.
///
/// # Arguments
/// * `recording_index` - Optional index of recording to play (1 = most recent, None = most recent)
pub async fn handle_replay(recording_index: Option<usize>) -> anyhow::Result<()> {
    tracing::info!("=== lexirec Replay Command ===");

    let config = LexirecConfig::load()?;
    let library = RecordingLibrary::new(&config.output_dir()?)?;

    let index = recording_index.unwrap_or(1);
    let recording = library.nth_recent(index)?;

    tracing::info!(
        "Playing recording #{} from {}",
        index,
        recording.recorded_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "Playing {} ({} bytes, recorded {})",
        recording.path.display(),
        recording.size,
        recording.recorded_at.format("%Y-%m-%d %H:%M:%S")
    );

    playback::spawn_player(&recording.path)?
        .wait()
        .map_err(|e| anyhow::anyhow!("Audio player error: {e}"))?;

    tracing::info!("Playback finished for recording #{}", index);
    Ok(())
}
