//! Saved recordings on disk.
//!
//! Recordings written from the upload form keep their `recording_<millis>.wav`
//! names; the timestamp in the name orders them for replay.

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::session::AudioFile;

/// Pattern of names given to finalized recordings.
const RECORDING_NAME: &str = r"^recording_(\d+)\.wav$";

/// Extracts the epoch milliseconds from a name matching [`RECORDING_NAME`].
pub fn parse_recording_name(pattern: &Regex, name: &str) -> Option<i64> {
    pattern
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// A recording file found in the library.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRecording {
    pub path: PathBuf,
    pub recorded_at: DateTime<Local>,
    pub size: u64,
}

/// Directory of saved recordings.
pub struct RecordingLibrary {
    dir: PathBuf,
}

impl RecordingLibrary {
    /// Opens the library, creating its directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a form file into the library under its own name.
    pub fn save(&self, file: &AudioFile) -> Result<PathBuf> {
        let path = self.dir.join(file.name());
        fs::write(&path, file.bytes())?;
        tracing::info!("Recording saved: {} ({} bytes)", path.display(), file.size());
        Ok(path)
    }

    /// Lists recordings, most recent first. Files with other names are ignored.
    pub fn list(&self) -> Result<Vec<SavedRecording>> {
        let pattern = Regex::new(RECORDING_NAME)?;
        let mut recordings: Vec<SavedRecording> = fs::read_dir(&self.dir)?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                let name = path.file_name()?.to_str()?;
                let millis = parse_recording_name(&pattern, name)?;
                let recorded_at = Local.timestamp_millis_opt(millis).single()?;
                let size = fs::metadata(&path).ok()?.len();
                Some(SavedRecording {
                    path,
                    recorded_at,
                    size,
                })
            })
            .collect();

        recordings.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(recordings)
    }

    /// Returns the `index`-th most recent recording (1 = most recent).
    pub fn nth_recent(&self, index: usize) -> Result<SavedRecording> {
        let recordings = self.list()?;
        if recordings.is_empty() {
            anyhow::bail!("No recordings found in {}", self.dir.display());
        }
        if index < 1 || index > recordings.len() {
            anyhow::bail!(
                "Recording index out of range. Available recordings: 1-{}",
                recordings.len()
            );
        }
        Ok(recordings[index - 1].clone())
    }
}
