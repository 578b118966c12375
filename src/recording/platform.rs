//! Platform capture interface.
//!
//! The recording controller never talks to an audio API directly. It asks a
//! [`MediaDevices`] implementation for microphone access, receives a
//! [`MediaStream`] holding the device, and drives a [`MediaRecorder`] created
//! from that stream. Recorded data and the end-of-recording signal arrive as
//! [`RecorderEvent`]s on a channel, in emission order.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure to acquire or drive the microphone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No audio input device available")]
    NoDevice,

    #[error("Audio input device '{0}' not found. Use 'lexirec list-devices' to see available devices.")]
    DeviceNotFound(String),

    #[error("Audio platform error: {0}")]
    Platform(String),
}

/// Recorder state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Event emitted by a platform recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A fragment of encoded audio. May be emitted zero or more times.
    DataAvailable(Vec<u8>),
    /// All buffered data has been emitted; no further events follow.
    Stopped,
}

/// Sending half handed to a recorder at creation.
pub type RecorderEvents = mpsc::UnboundedSender<RecorderEvent>;

/// Entry point to the platform's input devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Requests audio-only capture. Suspends until access is granted, denied,
    /// or acquisition fails.
    async fn get_user_media(&self) -> Result<Box<dyn MediaStream>, CaptureError>;
}

/// An acquired microphone. Holds the device until [`MediaStream::stop_tracks`].
pub trait MediaStream: Send {
    /// Human-readable name of the underlying input.
    fn label(&self) -> String;

    /// Creates a recorder that reports through `events`.
    fn create_recorder(
        &mut self,
        events: RecorderEvents,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError>;

    /// Releases the device. Idempotent.
    fn stop_tracks(&mut self);
}

/// Incremental recorder bound to a stream.
pub trait MediaRecorder: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Requests the recorder to stop. The platform flushes any remaining data
    /// and then emits [`RecorderEvent::Stopped`] asynchronously.
    fn stop(&mut self);

    fn state(&self) -> RecorderState;
}
