//! First-run setup and config migration.
//!
//! The first line of the config file records the version that wrote it:
//! `config_version = "X.Y.Z"`. A missing file, a file without that line, or
//! an older version triggers setup, which writes the default config.

use anyhow::anyhow;
use regex::Regex;
use std::path::Path;

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration written by setup.
const DEFAULT_CONFIG: &str = r#"
[audio]
# "default", a numeric index, or a device name from `lexirec list-devices`
device = "default"
sample_rate = 16000

[recorder]
# Timer refresh period in milliseconds
tick_interval_ms = 100
# output_dir = "~/.local/share/lexirec/recordings"

[form]
# "on-stop" shows the upload form as soon as recording stops;
# "on-finalize" waits until the file is attached
reveal = "on-stop"

[upload]
endpoint = "http://localhost:5000/record"
file_field = "audio"
duration_field = "duration"
timeout_secs = 30
# cookie = "session=..."
"#;

/// Parses `major.minor.patch` into a comparable tuple.
fn parse_version(version: &str) -> anyhow::Result<(u32, u32, u32)> {
    let parts: Vec<&str> = version.trim().split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        return Err(anyhow!(
            "Invalid version format: '{version}'. Expected 'major.minor.patch'"
        ));
    };
    let number = |part: &str| {
        part.parse::<u32>()
            .map_err(|_| anyhow!("Invalid version component '{part}' in '{version}'"))
    };
    Ok((number(major)?, number(minor)?, number(patch)?))
}

/// Reads the `config_version` recorded on the first line, if any.
fn recorded_version(content: &str) -> anyhow::Result<Option<String>> {
    let first_line = content.lines().next().unwrap_or_default();
    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    Ok(regex.captures(first_line).map(|caps| caps[1].to_string()))
}

/// Why setup has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupReason {
    Missing,
    Unversioned,
    Outdated(String),
}

/// Determines whether setup must run for the config at `config_path`.
pub fn setup_needed(config_path: &Path) -> anyhow::Result<Option<SetupReason>> {
    if !config_path.exists() {
        return Ok(Some(SetupReason::Missing));
    }

    let content = std::fs::read_to_string(config_path)?;
    let Some(version) = recorded_version(&content)? else {
        return Ok(Some(SetupReason::Unversioned));
    };

    if parse_version(&version)? < parse_version(CURRENT_VERSION)? {
        Ok(Some(SetupReason::Outdated(version)))
    } else {
        Ok(None)
    }
}

/// Writes the default config, prefixed with the current version line.
///
/// An existing file is kept alongside as `lexirec.toml.bak`.
pub fn run_setup(config_path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if config_path.exists() {
        let backup = config_path.with_extension("toml.bak");
        std::fs::copy(config_path, &backup)?;
        tracing::info!("Previous config backed up to {}", backup.display());
    }

    let content = format!(r#"config_version = "{CURRENT_VERSION}""#) + DEFAULT_CONFIG;
    std::fs::write(config_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LexirecConfig;
    use tempfile::TempDir;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("0.1.12").unwrap(), (0, 1, 12));
        assert!(parse_version("0.1").is_err());
        assert!(parse_version("0.1.2.3").is_err());
        assert!(parse_version("a.b.c").is_err());
        assert!(parse_version("0.0.9").unwrap() < parse_version("0.1.0").unwrap());
    }

    #[test]
    fn test_recorded_version_requires_first_line() {
        assert_eq!(
            recorded_version("config_version = \"1.2.3\"\n[audio]").unwrap(),
            Some("1.2.3".to_string())
        );
        assert_eq!(
            recorded_version("# config_version = \"1.2.3\"").unwrap(),
            None
        );
        assert_eq!(
            recorded_version("[audio]\nconfig_version = \"1.2.3\"").unwrap(),
            None
        );
    }

    #[test]
    fn test_setup_cycle() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("lexirec").join("lexirec.toml");

        assert_eq!(setup_needed(&path)?, Some(SetupReason::Missing));
        run_setup(&path)?;
        assert_eq!(setup_needed(&path)?, None);

        let written = std::fs::read_to_string(&path)?;
        let config = LexirecConfig::from_toml(&written)?;
        assert_eq!(config, LexirecConfig::default());
        Ok(())
    }

    #[test]
    fn test_outdated_config_is_migrated_with_backup() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("lexirec.toml");
        std::fs::write(&path, "config_version = \"0.0.1\"\n[audio]\ndevice = \"2\"\n")?;

        assert_eq!(
            setup_needed(&path)?,
            Some(SetupReason::Outdated("0.0.1".to_string()))
        );
        run_setup(&path)?;
        assert!(temp.path().join("lexirec.toml.bak").exists());
        assert_eq!(setup_needed(&path)?, None);
        Ok(())
    }

    #[test]
    fn test_unversioned_config_needs_setup() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("lexirec.toml");
        std::fs::write(&path, "[audio]\n")?;
        assert_eq!(setup_needed(&path)?, Some(SetupReason::Unversioned));
        Ok(())
    }
}
