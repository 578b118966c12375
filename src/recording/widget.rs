//! In-process model of the recording widget and its upload form.
//!
//! The controller writes to this model; the terminal UI reads snapshots of it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::session::AudioFile;

pub const STATUS_RECORDING: &str = "● Recording...";
pub const STATUS_COMPLETE: &str = "✓ Recording complete";
pub const ACCESS_ALERT: &str = "Error accessing microphone. Please check your permissions.";

/// Hidden form that carries the recording to the upload endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadForm {
    pub visible: bool,
    files: Vec<AudioFile>,
    duration: String,
}

impl UploadForm {
    /// Installs `file` as the only selection, replacing any previous one.
    pub fn set_file(&mut self, file: AudioFile) {
        self.files = vec![file];
    }

    pub fn files(&self) -> &[AudioFile] {
        &self.files
    }

    pub fn file(&self) -> Option<&AudioFile> {
        self.files.first()
    }

    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = seconds.to_string();
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn is_populated(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Every element the controller is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub status_text: String,
    /// Active-recording visual marker.
    pub recording_marker: bool,
    pub timer_text: String,
    /// Playback source; the preview is visible once set.
    pub playback: Option<AudioFile>,
    pub form: UploadForm,
    /// Blocking alerts waiting to be acknowledged, oldest first.
    pub alerts: VecDeque<String>,
    /// Transient one-line message for the footer.
    pub notice: Option<String>,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
            status_text: String::new(),
            recording_marker: false,
            timer_text: "00:00".to_string(),
            playback: None,
            form: UploadForm::default(),
            alerts: VecDeque::new(),
            notice: None,
        }
    }
}

/// Shared handle to a [`WidgetState`].
#[derive(Debug, Clone, Default)]
pub struct Widget {
    inner: Arc<Mutex<WidgetState>>,
}

impl Widget {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut WidgetState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> WidgetState {
        self.lock().clone()
    }

    pub fn alert(&self, message: impl Into<String>) {
        self.lock().alerts.push_back(message.into());
    }

    pub fn take_alert(&self) -> Option<String> {
        self.lock().alerts.pop_front()
    }

    pub fn notify(&self, message: impl Into<String>) {
        self.lock().notice = Some(message.into());
    }

    pub fn form(&self) -> UploadForm {
        self.lock().form.clone()
    }
}
