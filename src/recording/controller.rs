//! Start/stop controller for a single recording widget.
//!
//! A [`RecordingController`] owns one widget's capture lifecycle:
//! `Idle --start()--> Recording --stop()--> Stopped`, after which `start()`
//! may be called again. Platform events flow into a per-session task that
//! collects data fragments and performs stop-finalization; the result is
//! handed back through a [`Finalization`] handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::platform::{
    CaptureError, MediaDevices, MediaRecorder, MediaStream, RecorderEvent, RecorderState,
};
use super::session::{
    format_elapsed, recording_file_name, AudioBlob, AudioFile, CapturedArtifact, Clock,
    RecordingSession, AUDIO_MIME,
};
use super::widget::{Widget, ACCESS_ALERT, STATUS_COMPLETE, STATUS_RECORDING};

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Recording,
    Stopped,
}

/// When the upload form becomes visible after a recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FormReveal {
    /// As soon as `stop()` returns, possibly before the file is attached.
    #[default]
    OnStop,
    /// Only after finalization has attached the file and duration.
    OnFinalize,
}

#[derive(Error, Debug, PartialEq)]
pub enum ControllerError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Recorder ended without finalizing the recording")]
    FinalizationDropped,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// Timer refresh period.
    pub tick_interval: Duration,
    pub form_reveal: FormReveal,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            form_reveal: FormReveal::default(),
        }
    }
}

/// Pending stop-finalization of a session.
#[derive(Debug)]
pub struct Finalization {
    done: oneshot::Receiver<CapturedArtifact>,
}

impl Finalization {
    /// Waits until the platform has flushed and the form has been populated.
    pub async fn wait(self) -> Result<CapturedArtifact, ControllerError> {
        self.done
            .await
            .map_err(|_| ControllerError::FinalizationDropped)
    }
}

type SharedSession = Arc<Mutex<RecordingSession>>;

fn lock(session: &SharedSession) -> MutexGuard<'_, RecordingSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one widget's recordings.
pub struct RecordingController {
    devices: Arc<dyn MediaDevices>,
    widget: Widget,
    clock: Arc<dyn Clock>,
    options: ControllerOptions,
    state: ControllerState,
    session: SharedSession,
    recorder: Option<Box<dyn MediaRecorder>>,
    timer: Option<JoinHandle<()>>,
    finalization: Option<oneshot::Receiver<CapturedArtifact>>,
}

impl RecordingController {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        widget: Widget,
        clock: Arc<dyn Clock>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            devices,
            widget,
            clock,
            options,
            state: ControllerState::Idle,
            session: SharedSession::default(),
            recorder: None,
            timer: None,
            finalization: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    /// Epoch milliseconds at which the current (or last) session started.
    pub fn start_time(&self) -> i64 {
        lock(&self.session).start_time()
    }

    /// Number of fragments collected by the current (or last) session.
    pub fn chunk_count(&self) -> usize {
        lock(&self.session).chunks().len()
    }

    fn is_recording(&self) -> bool {
        self.recorder
            .as_ref()
            .is_some_and(|r| r.state() != RecorderState::Inactive)
    }

    /// Acquires the microphone and begins a new session.
    ///
    /// # Errors
    /// - `AlreadyRecording` if a session is active; that session is untouched
    /// - `Capture` if access is refused or the device fails. The failure is
    ///   logged and raised as a widget alert; controls are left as they were.
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        if self.is_recording() {
            tracing::warn!("Start requested while already recording; ignoring");
            return Err(ControllerError::AlreadyRecording);
        }

        let mut stream = match self.devices.get_user_media().await {
            Ok(stream) => stream,
            Err(e) => return Err(self.report_access_failure(e)),
        };
        tracing::info!("Microphone acquired: {}", stream.label());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut recorder = match stream.create_recorder(events_tx) {
            Ok(recorder) => recorder,
            Err(e) => {
                stream.stop_tracks();
                return Err(self.report_access_failure(e));
            }
        };

        let session = SharedSession::default();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(run_session(
            events_rx,
            stream,
            Arc::clone(&session),
            self.widget.clone(),
            Arc::clone(&self.clock),
            self.options.form_reveal,
            done_tx,
        ));

        let start_time = self.clock.now_millis();
        lock(&session).begin(start_time);

        // On failure the recorder is dropped, closing the event channel; the
        // session task then releases the stream.
        recorder
            .start()
            .map_err(|e| self.report_access_failure(e))?;

        self.session = session;
        self.recorder = Some(recorder);
        self.finalization = Some(done_rx);
        self.state = ControllerState::Recording;

        self.widget.update(|w| {
            w.start_enabled = false;
            w.stop_enabled = true;
            w.status_text = STATUS_RECORDING.to_string();
            w.recording_marker = true;
        });

        self.timer = Some(spawn_timer(
            Arc::clone(&self.session),
            self.widget.clone(),
            Arc::clone(&self.clock),
            self.options.tick_interval,
        ));

        tracing::info!("Recording started at {}", start_time);
        Ok(())
    }

    /// Stops the active session.
    ///
    /// Returns `None` and changes nothing when no recorder is active. Control
    /// and status updates are applied before this returns; the file and
    /// duration are attached later, by finalization.
    pub fn stop(&mut self) -> Option<Finalization> {
        if !self.is_recording() {
            tracing::debug!("Stop requested with no active recording");
            return None;
        }

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        // Frozen before the recorder is told to stop: the platform may flush
        // at once, and finalization reads this value.
        let elapsed = lock(&self.session).finish(self.clock.now_millis());

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }

        let reveal_now = self.options.form_reveal == FormReveal::OnStop;

        self.widget.update(|w| {
            w.start_enabled = true;
            w.stop_enabled = false;
            w.status_text = STATUS_COMPLETE.to_string();
            w.recording_marker = false;
            w.timer_text = format_elapsed(elapsed);
            if reveal_now {
                w.form.visible = true;
            }
        });
        self.state = ControllerState::Stopped;

        tracing::info!("Recording stopped after {:.2}s", elapsed);
        self.finalization.take().map(|done| Finalization { done })
    }

    fn report_access_failure(&self, error: CaptureError) -> ControllerError {
        tracing::error!("Error accessing microphone: {}", error);
        self.widget.alert(ACCESS_ALERT);
        ControllerError::Capture(error)
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.state() != RecorderState::Inactive {
                recorder.stop();
            }
        }
    }
}

/// Periodically recomputes elapsed time and renders it into the timer text.
fn spawn_timer(
    session: SharedSession,
    widget: Widget,
    clock: Arc<dyn Clock>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let first_tick = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let elapsed = lock(&session).tick(clock.now_millis());
            widget.update(|w| w.timer_text = format_elapsed(elapsed));
        }
    })
}

/// Collects data fragments until the platform reports the stop, then finalizes.
async fn run_session(
    mut events: mpsc::UnboundedReceiver<RecorderEvent>,
    mut stream: Box<dyn MediaStream>,
    session: SharedSession,
    widget: Widget,
    clock: Arc<dyn Clock>,
    reveal: FormReveal,
    done: oneshot::Sender<CapturedArtifact>,
) {
    while let Some(event) = events.recv().await {
        match event {
            RecorderEvent::DataAvailable(chunk) => {
                tracing::trace!("Recorder emitted {} bytes", chunk.len());
                lock(&session).push_chunk(chunk);
            }
            RecorderEvent::Stopped => {
                let artifact = finalize(&session, &widget, clock.as_ref(), reveal);
                stream.stop_tracks();
                tracing::debug!("Microphone released");
                let _ = done.send(artifact);
                return;
            }
        }
    }

    tracing::warn!("Recorder event stream closed before a stop event");
    stream.stop_tracks();
}

fn finalize(
    session: &SharedSession,
    widget: &Widget,
    clock: &dyn Clock,
    reveal: FormReveal,
) -> CapturedArtifact {
    let (blob, elapsed_seconds) = {
        let session = lock(session);
        (
            AudioBlob::concat(session.chunks(), AUDIO_MIME),
            session.elapsed_seconds(),
        )
    };
    if blob.is_empty() {
        tracing::warn!("Recording finalized with no audio data");
    }

    let file = AudioFile::new(recording_file_name(clock.now_millis()), blob);
    widget.update(|w| {
        w.playback = Some(file.clone());
        w.form.set_file(file.clone());
        w.form.set_duration(elapsed_seconds);
        if reveal == FormReveal::OnFinalize {
            w.form.visible = true;
        }
    });

    tracing::info!(
        "Recording finalized: {} ({} bytes, {:.2}s)",
        file.name(),
        file.size(),
        elapsed_seconds
    );
    CapturedArtifact {
        file,
        elapsed_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::platform::fake::FakeDevices;
    use crate::recording::session::ManualClock;
    use regex::Regex;

    const T0: i64 = 1_700_000_000_000;

    fn controller(
        devices: FakeDevices,
        options: ControllerOptions,
    ) -> (RecordingController, Arc<ManualClock>) {
        let clock = ManualClock::at(T0);
        let controller = RecordingController::new(
            Arc::new(devices),
            Widget::new(),
            clock.clone(),
            options,
        );
        (controller, clock)
    }

    /// Lets spawned tasks drain their channels.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_start_flips_controls_and_acquires_microphone() {
        let devices = FakeDevices::granting();
        let probe = devices.probe.clone();
        let (mut controller, _clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();

        let w = controller.widget().snapshot();
        assert_eq!(controller.state(), ControllerState::Recording);
        assert!(!w.start_enabled);
        assert!(w.stop_enabled);
        assert_eq!(w.status_text, STATUS_RECORDING);
        assert!(w.recording_marker);
        assert_eq!(probe.requests(), 1);
        assert_eq!(probe.recorder_state(), Some(RecorderState::Recording));
        assert_eq!(controller.start_time(), T0);
    }

    #[tokio::test]
    async fn test_artifact_is_ordered_concatenation_of_chunks() {
        let devices = FakeDevices::granting();
        let probe = devices.probe.clone();
        let (mut controller, _clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();
        let emitted: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![], vec![4], vec![5, 6]];
        for chunk in &emitted {
            probe.emit(chunk);
        }

        let artifact = controller.stop().unwrap().wait().await.unwrap();
        assert_eq!(artifact.file.bytes(), emitted.concat().as_slice());
    }

    #[tokio::test]
    async fn test_start_while_recording_is_rejected_without_side_effects() {
        let devices = FakeDevices::granting();
        let probe = devices.probe.clone();
        let (mut controller, clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();
        probe.emit(b"first");
        settle().await;
        clock.advance_millis(5_000);

        let err = controller.start().await.unwrap_err();
        assert_eq!(err, ControllerError::AlreadyRecording);
        assert_eq!(probe.requests(), 1);
        assert_eq!(controller.start_time(), T0);
        assert_eq!(controller.chunk_count(), 1);

        probe.emit(b"second");
        let artifact = controller.stop().unwrap().wait().await.unwrap();
        assert_eq!(artifact.file.bytes(), b"firstsecond");
    }

    #[tokio::test]
    async fn test_stop_without_recording_is_noop() {
        let (mut controller, _clock) =
            controller(FakeDevices::granting(), ControllerOptions::default());
        let before = controller.widget().snapshot();

        assert!(controller.stop().is_none());
        assert_eq!(controller.widget().snapshot(), before);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_second_stop_is_noop() {
        let (mut controller, _clock) =
            controller(FakeDevices::granting(), ControllerOptions::default());
        controller.start().await.unwrap();
        controller.stop().unwrap().wait().await.unwrap();
        let before = controller.widget().snapshot();

        assert!(controller.stop().is_none());
        assert_eq!(controller.widget().snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_renders_wall_clock_elapsed() {
        let (mut controller, clock) =
            controller(FakeDevices::granting(), ControllerOptions::default());
        controller.start().await.unwrap();

        clock.advance_millis(125_000);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(controller.widget().snapshot().timer_text, "02:05");
        controller.stop();
    }

    #[tokio::test]
    async fn test_end_to_end_populates_form() {
        let devices = FakeDevices::granting();
        let probe = devices.probe.clone();
        let (mut controller, clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();
        probe.emit(&[0u8; 10]);
        probe.emit(&[1u8; 20]);
        clock.advance_millis(3_250);

        let artifact = controller.stop().unwrap().wait().await.unwrap();
        let w = controller.widget().snapshot();

        assert_eq!(w.status_text, STATUS_COMPLETE);
        assert!(w.start_enabled);
        assert!(!w.stop_enabled);
        assert!(!w.recording_marker);
        assert!(w.form.visible);

        let files = w.form.files();
        assert_eq!(files.len(), 1);
        let name_pattern = Regex::new(r"^recording_\d+\.wav$").unwrap();
        assert!(name_pattern.is_match(files[0].name()), "{}", files[0].name());
        assert_eq!(files[0].mime(), "audio/wav");
        assert!(files[0].size() >= 30);

        let duration: f64 = w.form.duration().parse().unwrap();
        assert!((duration - 3.25).abs() <= 0.1);
        assert_eq!(artifact.elapsed_seconds, duration);

        assert_eq!(w.playback.as_ref(), Some(&files[0]));
        assert_eq!(probe.tracks_stopped(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_immediate_flush_carries_stop_time_duration() {
        let devices = FakeDevices::granting_with_slow_stop(Duration::from_millis(200));
        let probe = devices.probe.clone();
        let options = ControllerOptions {
            tick_interval: Duration::from_secs(60),
            ..ControllerOptions::default()
        };
        let (mut controller, clock) = controller(devices, options);

        controller.start().await.unwrap();
        probe.emit(b"pcm");
        clock.advance_millis(3_250);

        let artifact = controller.stop().unwrap().wait().await.unwrap();
        let w = controller.widget().snapshot();
        assert_eq!(artifact.elapsed_seconds, 3.25);
        assert_eq!(w.form.duration(), "3.25");
        assert_eq!(w.timer_text, "00:03");
    }

    #[tokio::test]
    async fn test_permission_denial_alerts_and_leaves_controls() {
        let devices = FakeDevices::refusing(CaptureError::PermissionDenied);
        let probe = devices.probe.clone();
        let (mut controller, _clock) = controller(devices, ControllerOptions::default());

        let err = controller.start().await.unwrap_err();
        assert_eq!(err, ControllerError::Capture(CaptureError::PermissionDenied));

        let w = controller.widget().snapshot();
        assert!(w.start_enabled);
        assert!(!w.stop_enabled);
        assert_eq!(w.alerts.front().map(String::as_str), Some(ACCESS_ALERT));
        assert!(!w.form.is_populated());
        assert!(!w.form.visible);
        assert!(w.playback.is_none());
        assert_eq!(w.timer_text, "00:00");
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(probe.requests(), 1);
        assert_eq!(probe.tracks_stopped(), 0);
        assert_eq!(probe.recorder_state(), None);
    }

    #[tokio::test]
    async fn test_on_stop_reveals_form_before_population() {
        let devices = FakeDevices::granting_with_held_flush();
        let probe = devices.probe.clone();
        let (mut controller, _clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();
        probe.emit(b"abc");
        let finalization = controller.stop().unwrap();
        settle().await;

        let w = controller.widget().snapshot();
        assert!(w.form.visible);
        assert!(!w.form.is_populated());
        assert_eq!(probe.tracks_stopped(), 0);

        probe.flush();
        finalization.wait().await.unwrap();
        assert!(controller.widget().form().is_populated());
        assert_eq!(probe.tracks_stopped(), 1);
    }

    #[tokio::test]
    async fn test_on_finalize_keeps_form_hidden_until_populated() {
        let devices = FakeDevices::granting_with_held_flush();
        let probe = devices.probe.clone();
        let options = ControllerOptions {
            form_reveal: FormReveal::OnFinalize,
            ..ControllerOptions::default()
        };
        let (mut controller, _clock) = controller(devices, options);

        controller.start().await.unwrap();
        let finalization = controller.stop().unwrap();
        settle().await;
        assert!(!controller.widget().form().visible);

        probe.flush();
        finalization.wait().await.unwrap();
        let form = controller.widget().form();
        assert!(form.visible);
        assert!(form.is_populated());
    }

    #[tokio::test]
    async fn test_restart_replaces_previous_file() {
        let devices = FakeDevices::granting();
        let probe = devices.probe.clone();
        let (mut controller, clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();
        probe.emit(b"one");
        let first = controller.stop().unwrap().wait().await.unwrap();

        clock.advance_millis(1_000);
        controller.start().await.unwrap();
        assert_eq!(controller.chunk_count(), 0);
        probe.emit(b"two");
        let second = controller.stop().unwrap().wait().await.unwrap();

        assert_ne!(first.file.name(), second.file.name());
        let form = controller.widget().form();
        assert_eq!(form.files().len(), 1);
        assert_eq!(form.file().map(|f| f.bytes()), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn test_vanished_recorder_reports_dropped_finalization() {
        let devices = FakeDevices::granting_with_held_flush();
        let probe = devices.probe.clone();
        let (mut controller, _clock) = controller(devices, ControllerOptions::default());

        controller.start().await.unwrap();
        let finalization = controller.stop().unwrap();
        probe.vanish();
        let err = finalization.wait().await.unwrap_err();
        assert_eq!(err, ControllerError::FinalizationDropped);
        assert_eq!(probe.tracks_stopped(), 1);
    }
}
