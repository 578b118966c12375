//! Configuration management for lexirec.
//!
//! Loads the TOML configuration from the user's config directory.

pub mod file;

pub use file::{get_config_path, LexirecConfig, UploadConfig};
