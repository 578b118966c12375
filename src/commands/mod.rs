//! Application command handlers for lexirec.
//!
//! # Commands
//! - `record`: The interactive recording widget
//! - `submit`: Upload a saved recording through the form
//! - `replay`: Replay a saved recording
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod record;
pub mod replay;
pub mod submit;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use record::handle_record;
pub use replay::handle_replay;
pub use submit::handle_submit;
