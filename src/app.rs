//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::config::get_config_path;
use crate::logging;
use crate::setup::{self, SetupReason};
use anyhow::anyhow;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Runs setup when the config is missing, unversioned, or written by an older version.
///
/// This is called early in the startup sequence, before command handling.
fn check_and_run_setup() -> anyhow::Result<()> {
    let config_path = get_config_path()?;

    match setup::setup_needed(&config_path)? {
        Some(reason) => {
            match &reason {
                SetupReason::Missing => tracing::info!("No config found, writing defaults"),
                SetupReason::Unversioned => {
                    tracing::info!("Config has no version line, rewriting defaults")
                }
                SetupReason::Outdated(old) => tracing::info!(
                    "Setup needed - migrating from version {} to {}",
                    old,
                    env!("CARGO_PKG_VERSION")
                ),
            }
            setup::run_setup(&config_path).map_err(|e| {
                tracing::error!("Setup failed: {e}");
                anyhow!("Setup failed: {e}")
            })?;
            tracing::info!(
                "Setup completed - config at {} is version {}",
                config_path.display(),
                env!("CARGO_PKG_VERSION")
            );
        }
        None => {
            tracing::debug!("Config version up to date ({})", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// A terminal microphone recorder with an upload form
#[derive(Parser)]
#[command(name = "lexirec")]
#[command(version)]
#[command(about = "Record from the microphone and submit the take through an upload form")]
#[command(long_about = "Record from the microphone and submit the take through an upload form.\n\nThe recorder shows start/stop controls, a live MM:SS timer, a preview of the\nfinished take, and the upload form holding the recording and its duration.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Open the recorder\n    $ lexirec\n\n    # Toggle recording from a hotkey daemon\n    $ pkill -USR1 lexirec\n\n    # Upload a saved recording later\n    $ lexirec submit ~/.local/share/lexirec/recordings/recording_1700000000000.wav --duration 4.2\n\n    # Play the second most recent saved recording\n    $ lexirec replay 2")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/lexirec/lexirec.toml\n    Recordings:         ~/.local/share/lexirec/recordings\n    Logs:               ~/.local/state/lexirec/lexirec.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the recording widget (default)
    ///
    /// r/Enter starts, s/Space stops, p previews, w saves, u submits the
    /// upload form, Escape/q quits. SIGUSR1 toggles recording.
    #[command(visible_alias = "r")]
    Record,

    /// Submit a saved recording through the upload form
    ///
    /// Sends the file and its duration to the configured upload endpoint.
    #[command(visible_alias = "s")]
    Submit {
        /// Path to the .wav recording
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Recording length in seconds, sent as the form's duration field
        #[arg(short, long, default_value_t = 0.0)]
        duration: f64,
    },

    /// Replay a saved recording using system audio player
    #[command(visible_alias = "rp")]
    Replay {
        /// Recording index (1 = most recent, 2 = second most recent, etc.)
        #[arg(value_name = "N")]
        index: Option<usize>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in lexirec.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   lexirec completions bash > lexirec.bash
    ///   lexirec completions zsh > _lexirec
    ///   lexirec completions fish > lexirec.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If setup fails
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "lexirec", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            if let Err(e) = commands::handle_list_devices() {
                eprintln!("Error: {e}");
                process::exit(1);
            }
            return Ok(());
        }
        Some(Commands::Logs) => {
            if let Err(e) = commands::handle_logs() {
                eprintln!("Error: {e}");
                process::exit(1);
            }
            return Ok(());
        }
        _ => {}
    }

    logging::init_logging()?;
    check_and_run_setup()?;

    match cli.command {
        None | Some(Commands::Record) => commands::handle_record().await?,
        Some(Commands::Submit { file, duration }) => {
            commands::handle_submit(file, duration).await?
        }
        Some(Commands::Replay { index }) => commands::handle_replay(index).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_is_the_default() {
        let cli = Cli::try_parse_from(["lexirec"]).unwrap();
        assert!(cli.command.is_none());
        let cli = Cli::try_parse_from(["lexirec", "r"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Record)));
    }

    #[test]
    fn test_submit_arguments() {
        let cli =
            Cli::try_parse_from(["lexirec", "submit", "take.wav", "--duration", "4.25"]).unwrap();
        match cli.command {
            Some(Commands::Submit { file, duration }) => {
                assert_eq!(file, PathBuf::from("take.wav"));
                assert_eq!(duration, 4.25);
            }
            _ => panic!("expected submit"),
        }
    }
}
