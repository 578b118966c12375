//! Configuration file editor command.
//!
//! Opens `lexirec.toml` in the user's editor, then re-parses it so mistakes
//! are reported before the next `record` trips over them.

use anyhow::anyhow;
use std::process::Command;

use crate::config::{get_config_path, LexirecConfig};

/// Editors tried when neither `$VISUAL` nor `$EDITOR` is set.
const FALLBACK_EDITORS: [&str; 2] = ["nano", "vi"];

/// Opens the lexirec configuration file in the user's preferred editor.
///
/// # Errors
/// - If no editor can be found or executed
/// - If the editor exits with an error
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    let (program, args) = find_editor()?;
    tracing::info!(
        "Opening config file {} with {}",
        config_path.display(),
        program
    );

    let status = Command::new(&program)
        .args(&args)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow!(
                "Failed to open editor '{program}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    match LexirecConfig::load() {
        Ok(_) => tracing::info!("Config file edited successfully"),
        Err(e) => {
            tracing::warn!("Edited config does not parse: {e}");
            eprintln!("Warning: {} is not valid: {e}", config_path.display());
        }
    }
    Ok(())
}

/// Resolves the editor command as program plus leading arguments.
///
/// Tries in order: $VISUAL, $EDITOR, nano, vi
fn find_editor() -> anyhow::Result<(String, Vec<String>)> {
    for var in ["VISUAL", "EDITOR"] {
        if let Some(command) = std::env::var(var).ok().as_deref().and_then(split_command) {
            return Ok(command);
        }
    }

    FALLBACK_EDITORS
        .iter()
        .find(|editor| is_editor_available(editor))
        .map(|editor| (editor.to_string(), Vec::new()))
        .ok_or_else(|| anyhow!("No editor found. Please set the $EDITOR environment variable."))
}

/// Splits `code --wait` style editor settings on whitespace.
fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Checks if an editor is available in the system PATH.
fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .is_ok_and(|output| output.status.success())
}
