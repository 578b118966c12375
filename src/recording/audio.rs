//! cpal-backed microphone capture.
//!
//! Implements the platform capture traits over a real input device. The cpal
//! stream is owned by a dedicated capture thread (streams are not `Send` on
//! every host); the async side talks to it through a command channel. Audio is
//! downmixed to mono i16 and, when the recorder stops, emitted as a single
//! WAV-encoded fragment followed by the stop event.

use anyhow::anyhow;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::WavWriter;
use std::io::Cursor;
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread;
use tokio::sync::oneshot;

use super::platform::{
    CaptureError, MediaDevices, MediaRecorder, MediaStream, RecorderEvent, RecorderEvents,
    RecorderState,
};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Microphone access through the system audio host.
pub struct CpalDevices {
    /// Device name, numeric index, or "default"
    device_name: String,
    requested_sample_rate: u32,
}

impl CpalDevices {
    pub fn new(device_name: String, requested_sample_rate: u32) -> Self {
        Self {
            device_name,
            requested_sample_rate,
        }
    }
}

#[async_trait]
impl MediaDevices for CpalDevices {
    async fn get_user_media(&self) -> Result<Box<dyn MediaStream>, CaptureError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = std_mpsc::channel();
        let device_name = self.device_name.clone();
        let requested_rate = self.requested_sample_rate;

        thread::Builder::new()
            .name("lexirec-capture".to_string())
            .spawn(move || capture_thread(&device_name, requested_rate, ready_tx, command_rx))
            .map_err(|e| CaptureError::Platform(format!("Failed to spawn capture thread: {e}")))?;

        let info = ready_rx
            .await
            .map_err(|_| CaptureError::Platform("Capture thread exited during setup".to_string()))??;

        Ok(Box::new(CpalStream {
            info,
            commands: command_tx,
            released: false,
        }))
    }
}

/// Parameters of an opened input.
#[derive(Debug, Clone)]
struct InputInfo {
    device_name: String,
    sample_rate: u32,
    channels: usize,
}

enum CaptureCommand {
    Record(RecorderEvents),
    Finish,
    Release,
}

struct CpalStream {
    info: InputInfo,
    commands: std_mpsc::Sender<CaptureCommand>,
    released: bool,
}

impl MediaStream for CpalStream {
    fn label(&self) -> String {
        format!(
            "{} ({}Hz, {} channels)",
            self.info.device_name, self.info.sample_rate, self.info.channels
        )
    }

    fn create_recorder(
        &mut self,
        events: RecorderEvents,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        if self.released {
            return Err(CaptureError::Platform(
                "Cannot record from a released stream".to_string(),
            ));
        }
        Ok(Box::new(CpalRecorder {
            commands: self.commands.clone(),
            events,
            state: RecorderState::Inactive,
        }))
    }

    fn stop_tracks(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.commands.send(CaptureCommand::Release);
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

struct CpalRecorder {
    commands: std_mpsc::Sender<CaptureCommand>,
    events: RecorderEvents,
    state: RecorderState,
}

impl MediaRecorder for CpalRecorder {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.commands
            .send(CaptureCommand::Record(self.events.clone()))
            .map_err(|_| CaptureError::Platform("Capture thread is not running".to_string()))?;
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == RecorderState::Inactive {
            return;
        }
        self.state = RecorderState::Inactive;
        if self.commands.send(CaptureCommand::Finish).is_err() {
            tracing::warn!("Capture thread gone before stop; no audio will be flushed");
        }
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}

/// Owns the cpal stream for its whole lifetime.
fn capture_thread(
    device_spec: &str,
    requested_rate: u32,
    ready: oneshot::Sender<Result<InputInfo, CaptureError>>,
    commands: std_mpsc::Receiver<CaptureCommand>,
) {
    let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
    let collecting = Arc::new(Mutex::new(false));

    let (stream, info) = match open_input(
        device_spec,
        requested_rate,
        Arc::clone(&samples),
        Arc::clone(&collecting),
    ) {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!("Failed to open audio input: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(info.clone())).is_err() {
        return;
    }

    let mut sink: Option<RecorderEvents> = None;
    while let Ok(command) = commands.recv() {
        match command {
            CaptureCommand::Record(events) => {
                samples.lock().unwrap_or_else(PoisonError::into_inner).clear();
                *collecting.lock().unwrap_or_else(PoisonError::into_inner) = true;
                sink = Some(events);
                tracing::debug!("Capture started on {}", info.device_name);
            }
            CaptureCommand::Finish => {
                *collecting.lock().unwrap_or_else(PoisonError::into_inner) = false;
                let captured =
                    std::mem::take(&mut *samples.lock().unwrap_or_else(PoisonError::into_inner));
                let Some(events) = sink.take() else {
                    continue;
                };

                tracing::info!(
                    "Capture stopped: {:.2}s ({} samples at {}Hz)",
                    captured.len() as f32 / info.sample_rate as f32,
                    captured.len(),
                    info.sample_rate
                );
                match encode_wav(&captured, info.sample_rate) {
                    Ok(bytes) => {
                        let _ = events.send(RecorderEvent::DataAvailable(bytes));
                    }
                    Err(e) => tracing::error!("Failed to encode recording: {}", e),
                }
                let _ = events.send(RecorderEvent::Stopped);
            }
            CaptureCommand::Release => break,
        }
    }

    drop(stream);
    tracing::debug!("Audio input released: {}", info.device_name);
}

/// Opens the configured device and starts its stream.
fn open_input(
    device_spec: &str,
    requested_rate: u32,
    samples: Arc<Mutex<Vec<i16>>>,
    collecting: Arc<Mutex<bool>>,
) -> Result<(cpal::Stream, InputInfo), CaptureError> {
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        if device_spec == "default" {
            host.default_input_device().ok_or(CaptureError::NoDevice)
        } else {
            find_device_by_name(&host, device_spec)
        }
    })?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Recording device: {}", device_name);

    let device_config = device
        .default_input_config()
        .map_err(|e| CaptureError::Platform(format!("No usable input configuration: {e}")))?;
    let sample_rate = device_config.sample_rate().0;
    let channels = device_config.channels() as usize;

    if sample_rate != requested_rate {
        tracing::warn!(
            "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
            requested_rate,
            sample_rate
        );
    }

    let on_error = |err: cpal::StreamError| tracing::error!("Audio stream error: {}", err);
    let stream_config: cpal::StreamConfig = device_config.config();

    let stream = match device_config.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if *collecting.lock().unwrap_or_else(PoisonError::into_inner) {
                    let mut samples = samples.lock().unwrap_or_else(PoisonError::into_inner);
                    downmix_into(data.iter().copied(), channels, &mut samples);
                }
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if *collecting.lock().unwrap_or_else(PoisonError::into_inner) {
                    let mut samples = samples.lock().unwrap_or_else(PoisonError::into_inner);
                    downmix_into(data.iter().map(|&s| f32_to_i16(s)), channels, &mut samples);
                }
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::Platform(format!(
                "Unsupported sample format: {other:?}"
            )))
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoDevice,
        other => CaptureError::Platform(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| CaptureError::Platform(e.to_string()))?;

    tracing::debug!(
        "Device configuration: {}Hz, {} channels",
        sample_rate,
        channels
    );

    Ok((
        stream,
        InputInfo {
            device_name,
            sample_rate,
            channels,
        },
    ))
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Averages interleaved frames down to one channel.
fn downmix_into(data: impl Iterator<Item = i16>, channels: usize, out: &mut Vec<i16>) {
    if channels <= 1 {
        out.extend(data);
        return;
    }

    let mut sum = 0i32;
    let mut filled = 0usize;
    for sample in data {
        sum += sample as i32;
        filled += 1;
        if filled == channels {
            out.push((sum / channels as i32) as i16);
            sum = 0;
            filled = 0;
        }
    }
}

/// Encodes mono 16-bit PCM as an in-memory WAV file.
fn encode_wav(samples: &[i16], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), wav_spec)
            .map_err(|e| anyhow!("Failed to create WAV writer: {e}"))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device, CaptureError> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::Platform(format!("Failed to enumerate devices: {e}")))?
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        return devices
            .into_iter()
            .nth(index)
            .ok_or_else(|| CaptureError::DeviceNotFound(device_spec.to_string()));
    }

    devices
        .into_iter()
        .find(|d| d.name().is_ok_and(|name| name == device_spec))
        .ok_or_else(|| CaptureError::DeviceNotFound(device_spec.to_string()))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_stereo_frames() {
        let mut out = Vec::new();
        downmix_into([100i16, 300, -50, 50].into_iter(), 2, &mut out);
        assert_eq!(out, vec![200, 0]);
    }

    #[test]
    fn test_downmix_passes_mono_through() {
        let mut out = vec![7];
        downmix_into([1i16, 2, 3].into_iter(), 1, &mut out);
        assert_eq!(out, vec![7, 1, 2, 3]);
    }

    #[test]
    fn test_f32_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
    }

    #[test]
    fn test_encode_wav_produces_readable_file() {
        let samples = vec![0i16, 1000, -1000, 32767];
        let bytes = encode_wav(&samples, 16000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_empty_recording_still_has_header() {
        let bytes = encode_wav(&[], 44100).unwrap();
        assert!(bytes.len() >= 44);
        assert_eq!(&bytes[0..4], b"RIFF");
    }
}
