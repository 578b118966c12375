//! Microphone recording widget.
//!
//! Provides the recording controller and its widget model, the platform capture
//! interface with a cpal implementation, and the terminal UI that renders the
//! widget.

pub mod audio;
pub mod controller;
pub mod library;
pub mod platform;
pub mod playback;
pub mod session;
pub mod ui;
pub mod widget;

pub use audio::CpalDevices;
pub use controller::{ControllerOptions, FormReveal, RecordingController};
pub use library::RecordingLibrary;
pub use session::{AudioFile, SystemClock};
pub use ui::{RecorderTui, WidgetCommand};
pub use widget::Widget;
