//! Submit a saved recording through the upload form.

use anyhow::anyhow;
use std::path::PathBuf;

use crate::config::LexirecConfig;
use crate::recording::session::{AudioBlob, AUDIO_MIME};
use crate::recording::widget::UploadForm;
use crate::recording::AudioFile;
use crate::upload;

/// Fills an upload form from a file on disk and submits it.
///
/// The form carries the file under its own name and `duration` as given, so
/// a recording saved from the widget can be uploaded later.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the file cannot be read
/// - If the upload fails
pub async fn handle_submit(file: PathBuf, duration: f64) -> anyhow::Result<()> {
    tracing::info!("=== lexirec Submit Command ===");

    if !duration.is_finite() || duration < 0.0 {
        return Err(anyhow!("Duration must be a non-negative number of seconds"));
    }

    let config = LexirecConfig::load()?;
    let bytes = std::fs::read(&file)
        .map_err(|e| anyhow!("Failed to read {}: {e}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", file.display()))?;

    let mut form = UploadForm::default();
    form.set_file(AudioFile::new(name, AudioBlob::new(bytes, AUDIO_MIME)));
    form.set_duration(duration);
    form.visible = true;

    let receipt = upload::submit(&config.upload, &form).await?;
    match receipt.location {
        Some(location) => println!(
            "Uploaded {} (status {}, redirected to {location})",
            name, receipt.status
        ),
        None => println!("Uploaded {} (status {})", name, receipt.status),
    }
    Ok(())
}
