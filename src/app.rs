//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to the command handlers.

use crate::commands;
use crate::logging;
use crate::store::VideoFormat;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Records the webcam and microphone into two folders at once
#[derive(Parser)]
#[command(name = "duorec")]
#[command(version)]
#[command(about = "Records the webcam and microphone into two folders at once")]
#[command(long_about = "Records the default webcam and microphone and writes every recording to two\nfolders at once: a fixed archive folder (<Videos>/StaticRecordings) and a folder\nof your choice. Each folder receives video_<timestamp>.<mp4|avi> and\naudio_<timestamp>.wav.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Record until Enter or Ctrl-C\n    $ duorec\n\n    # Record ten seconds and open the result\n    $ duorec record --duration 10 --preview\n\n    # Choose where the second copy goes\n    $ duorec config set-path ~/Dropbox/Recordings\n\n    # Delete a recording and its audio\n    $ duorec delete ~/Videos/Recordings/video_20240101_120000.mp4")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/duorec/duorec.toml\n    Logs:               ~/.local/state/duorec/duorec.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record video and audio into both folders (default)
    ///
    /// Press Enter or Ctrl-C to stop.
    #[command(visible_alias = "r")]
    Record {
        /// Stop automatically after this many seconds
        #[arg(short, long, value_name = "SECS")]
        duration: Option<u64>,

        /// Open the custom-folder video in the system player afterwards
        #[arg(short, long)]
        preview: bool,
    },

    /// Delete a video file and its paired audio file
    #[command(visible_alias = "rm")]
    Delete {
        /// Path to a video_<YYYYMMDD_HHMMSS>.<mp4|avi> file
        #[arg(value_name = "VIDEO")]
        video: PathBuf,
    },

    /// List recordings in the custom folder, newest first
    #[command(visible_alias = "ls")]
    Recordings {
        /// List the fixed archive folder instead
        #[arg(short, long = "static")]
        static_dir: bool,
    },

    /// Open a video in the system player
    #[command(visible_alias = "p")]
    Play {
        #[arg(value_name = "VIDEO")]
        video: PathBuf,
    },

    /// Show or change the configuration
    ///
    /// Without a subcommand, prints the current settings.
    #[command(visible_alias = "c")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// List available cameras and audio input devices
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   duorec completions bash > duorec.bash
    ///   duorec completions zsh > _duorec
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set the folder that receives the second copy of every recording
    SetPath {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Set the video container
    SetFormat {
        #[arg(value_enum)]
        format: VideoFormat,
    },

    /// Open the configuration file in your preferred editor
    Edit,
}

/// Runs the application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If the command fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that need neither logging nor config
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "duorec", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;
    tracing::debug!("duorec {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => commands::handle_record(None, false).await,
        Some(Commands::Record { duration, preview }) => {
            commands::handle_record(duration, preview).await
        }
        Some(Commands::Delete { video }) => commands::handle_delete(&video),
        Some(Commands::Recordings { static_dir }) => commands::handle_recordings(static_dir),
        Some(Commands::Play { video }) => commands::handle_play(&video).await,
        Some(Commands::Config { action }) => commands::handle_config(action),
        Some(Commands::ListDevices) => commands::handle_list_devices(),
        Some(Commands::Completions { .. }) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_is_default() {
        let cli = Cli::try_parse_from(["duorec"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["duorec", "record", "-d", "5", "--preview"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Record {
                duration: Some(5),
                preview: true
            })
        ));
    }

    #[test]
    fn test_config_set_format_parses_value() {
        let cli = Cli::try_parse_from(["duorec", "config", "set-format", "avi"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: Some(ConfigAction::SetFormat {
                    format: VideoFormat::Avi
                })
            })
        ));

        assert!(Cli::try_parse_from(["duorec", "config", "set-format", "mkv"]).is_err());
    }
}
