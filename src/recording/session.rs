//! Recording session data and the artifact produced when a session ends.

use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicI64, Ordering};

/// Media type attached to every captured recording.
pub const AUDIO_MIME: &str = "audio/wav";

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(epoch_millis: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(epoch_millis),
        })
    }

    pub fn advance_millis(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Seconds between two epoch-millisecond timestamps.
pub fn elapsed_seconds(start_millis: i64, now_millis: i64) -> f64 {
    (now_millis - start_millis) as f64 / 1000.0
}

/// Renders elapsed seconds as `MM:SS`.
///
/// Both fields are floored and zero-padded to two digits. Minutes keep
/// growing past 59; there is no hour field.
pub fn format_elapsed(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{secs:02}")
}

/// File name given to a recording finalized at `epoch_millis`.
pub fn recording_file_name(epoch_millis: i64) -> String {
    format!("recording_{epoch_millis}.wav")
}

/// Mutable state of one capture, from start until finalization.
#[derive(Debug, Default)]
pub struct RecordingSession {
    chunks: Vec<Vec<u8>>,
    start_time: i64,
    elapsed_seconds: f64,
    /// Set by `finish`; later ticks keep the stop-time value.
    finished: bool,
}

impl RecordingSession {
    /// Resets the session for a capture starting at `start_time`.
    pub fn begin(&mut self, start_time: i64) {
        self.chunks.clear();
        self.start_time = start_time;
        self.elapsed_seconds = 0.0;
        self.finished = false;
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        self.chunks.push(chunk);
    }

    /// Recomputes elapsed time from the wall clock and returns it.
    pub fn tick(&mut self, now_millis: i64) -> f64 {
        if !self.finished {
            self.elapsed_seconds = elapsed_seconds(self.start_time, now_millis);
        }
        self.elapsed_seconds
    }

    /// Takes the final elapsed time and freezes it against later ticks.
    pub fn finish(&mut self, now_millis: i64) -> f64 {
        let elapsed = self.tick(now_millis);
        self.finished = true;
        elapsed
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }
}

/// Immutable binary object with a media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    bytes: Arc<[u8]>,
    mime: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, mime: &str) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.to_string(),
        }
    }

    /// Concatenates fragments in order.
    pub fn concat(chunks: &[Vec<u8>], mime: &str) -> Self {
        Self::new(chunks.concat(), mime)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }
}

/// A blob with a file name, as held by the upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    name: String,
    blob: AudioBlob,
}

impl AudioFile {
    pub fn new(name: impl Into<String>, blob: AudioBlob) -> Self {
        Self {
            name: name.into(),
            blob,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        self.blob.mime()
    }

    pub fn size(&self) -> usize {
        self.blob.len()
    }

    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }
}

/// Output of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedArtifact {
    pub file: AudioFile,
    pub elapsed_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_pads_and_floors() {
        assert_eq!(format_elapsed(0.0), "00:00");
        assert_eq!(format_elapsed(9.99), "00:09");
        assert_eq!(format_elapsed(125.0), "02:05");
        assert_eq!(format_elapsed(59.999), "00:59");
    }

    #[test]
    fn test_format_elapsed_has_no_hour_rollover() {
        assert_eq!(format_elapsed(3600.0), "60:00");
        assert_eq!(format_elapsed(6001.5), "100:01");
    }

    #[test]
    fn test_format_elapsed_clamps_negative_time() {
        assert_eq!(format_elapsed(-3.0), "00:00");
        assert_eq!(format_elapsed(f64::NAN), "00:00");
    }

    #[test]
    fn test_tick_is_wall_clock_derived() {
        let t0 = 1_700_000_000_000;
        let mut session = RecordingSession::default();
        session.begin(t0);
        assert_eq!(session.tick(t0 + 125_000), 125.0);
        assert_eq!(format_elapsed(session.elapsed_seconds()), "02:05");
        // A late tick does not accumulate error from earlier ticks.
        assert_eq!(session.tick(t0 + 125_450), 125.45);
    }

    #[test]
    fn test_finish_freezes_elapsed() {
        let t0 = 1_700_000_000_000;
        let mut session = RecordingSession::default();
        session.begin(t0);
        assert_eq!(session.finish(t0 + 3_250), 3.25);
        // A timer tick landing after the stop keeps the stop-time value.
        assert_eq!(session.tick(t0 + 3_400), 3.25);
        assert_eq!(session.elapsed_seconds(), 3.25);

        session.begin(t0 + 10_000);
        assert_eq!(session.tick(t0 + 11_000), 1.0);
    }

    #[test]
    fn test_concat_preserves_chunk_order() {
        let chunks = vec![b"RIFF".to_vec(), vec![], b"data".to_vec(), vec![1, 2, 3]];
        let blob = AudioBlob::concat(&chunks, AUDIO_MIME);
        assert_eq!(blob.bytes(), b"RIFFdata\x01\x02\x03");
        assert_eq!(blob.mime(), "audio/wav");
    }

    #[test]
    fn test_recording_file_name() {
        assert_eq!(recording_file_name(1234), "recording_1234.wav");
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at(10);
        clock.advance_millis(90);
        assert_eq!(clock.now_millis(), 100);
    }
}
