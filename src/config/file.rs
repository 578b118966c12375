//! Configuration file management for lexirec.
//!
//! Configuration lives in `~/.config/lexirec/lexirec.toml`. Every section has
//! defaults, so a file containing only `config_version` is valid.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::recording::controller::{ControllerOptions, FormReveal};

/// Audio input configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `lexirec list-devices`
    /// - device name from `lexirec list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Requested sample rate in Hz; the device rate wins if they differ
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Recording widget behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecorderConfig {
    /// Timer refresh period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Where saved recordings go. `~/` is expanded; unset means
    /// `~/.local/share/lexirec/recordings`.
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormConfig {
    /// "on-stop" or "on-finalize"
    #[serde(default)]
    pub reveal: FormReveal,
}

/// Where and how the upload form is submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Multipart part name carrying the audio file
    #[serde(default = "default_file_field")]
    pub file_field: String,
    /// Form field carrying the duration in seconds
    #[serde(default = "default_duration_field")]
    pub duration_field: String,
    /// Raw `Cookie` header for servers that require a logged-in session
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:5000/record".to_string()
}

fn default_file_field() -> String {
    "audio".to_string()
}

fn default_duration_field() -> String {
    "duration".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            file_field: default_file_field(),
            duration_field: default_duration_field(),
            cookie: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LexirecConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl LexirecConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: LexirecConfig = toml::from_str(content)?;
        if config.recorder.tick_interval_ms == 0 {
            return Err(anyhow!("recorder.tick_interval_ms must be greater than zero"));
        }
        Ok(config)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            tick_interval: Duration::from_millis(self.recorder.tick_interval_ms),
            form_reveal: self.form.reveal,
        }
    }

    /// Resolves the saved-recordings directory.
    ///
    /// # Errors
    /// - If the home directory cannot be determined
    pub fn output_dir(&self) -> anyhow::Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Ok(match &self.recorder.output_dir {
            Some(dir) => match dir.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => PathBuf::from(dir),
            },
            None => home.join(".local/share/lexirec/recordings"),
        })
    }
}

/// Retrieves the path to the config file, creating its directory.
///
/// # Errors
/// - If the config directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("lexirec");

    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config directory: {e}"))?;

    Ok(config_dir.join("lexirec.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_only_file_uses_defaults() {
        let config = LexirecConfig::from_toml(r#"config_version = "0.1.0""#).unwrap();
        assert_eq!(config, LexirecConfig::default());
        assert_eq!(config.upload.file_field, "audio");
        assert_eq!(config.upload.duration_field, "duration");
        assert_eq!(
            config.controller_options().tick_interval,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_form_reveal_parses_kebab_case() {
        let config = LexirecConfig::from_toml("[form]\nreveal = \"on-finalize\"\n").unwrap();
        assert_eq!(config.form.reveal, FormReveal::OnFinalize);
        assert!(LexirecConfig::from_toml("[form]\nreveal = \"later\"\n").is_err());
    }

    #[test]
    fn test_zero_tick_interval_is_rejected() {
        assert!(LexirecConfig::from_toml("[recorder]\ntick_interval_ms = 0\n").is_err());
    }

    #[test]
    fn test_output_dir_expands_home() {
        let mut config = LexirecConfig::default();
        config.recorder.output_dir = Some("~/takes".to_string());
        let home = dirs::home_dir().unwrap();
        assert_eq!(config.output_dir().unwrap(), home.join("takes"));

        config.recorder.output_dir = Some("/srv/takes".to_string());
        assert_eq!(config.output_dir().unwrap(), PathBuf::from("/srv/takes"));
    }
}
