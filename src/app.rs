//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command
//! handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A voice-controlled email drafting assistant
#[derive(Parser)]
#[command(name = "audiomail")]
#[command(version)]
#[command(about = "Record spoken instructions, transcribe them, and draft an email")]
#[command(
    long_about = "A voice-controlled email drafting assistant.\n\nRecord spoken instructions, \
transcribe them, draft a professional email with a language model, and refine the draft \
iteratively from further spoken feedback.\n\nDEFAULT COMMAND:\n    If no command is specified, \
'compose' is used by default.\n\nEXAMPLES:\n    # Record, transcribe, and draft an email\n    \
$ audiomail\n    $ audiomail compose\n\n    # List audio input devices\n    $ audiomail \
list-devices\n\n    # Edit configuration file\n    $ audiomail config"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/audiomail/audiomail.toml\n    \
Logs:               ~/.local/state/audiomail/audiomail.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record, transcribe, and draft an email (default)
    ///
    /// Press 's' (or Enter/Escape) to stop recording. After the draft is
    /// shown, refinement rounds record further spoken feedback.
    #[command(visible_alias = "c")]
    Compose,

    /// Open configuration file in your preferred editor
    ///
    /// Edit audio, transcription, generation, and sampling settings.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in audiomail.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   audiomail completions bash > audiomail.bash
    ///   audiomail completions zsh > _audiomail
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (e.g., configuration, recording, drafting)
pub fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "audiomail", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Compose) => {
            commands::handle_compose()?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
