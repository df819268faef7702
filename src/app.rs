//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::config;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A terminal chat client for a voice assistant backend
#[derive(Parser)]
#[command(name = "convo")]
#[command(version)]
#[command(about = "A terminal chat client with voice input and spoken replies")]
#[command(
    long_about = "A terminal chat client for a voice assistant backend.\n\nType to chat, or record a voice message from your microphone and have it\nsent to the backend as an audio turn. When voice responses are enabled,\nreplies that carry synthesized audio are played back locally.\n\nDEFAULT COMMAND:\n    If no command is specified, 'chat' is used by default.\n\nEXAMPLES:\n    # Start chatting against the configured backend\n    $ convo\n\n    # Start chatting against a different backend\n    $ convo chat --server http://localhost:5000\n\n    # List audio input devices for the [audio] config section\n    $ convo list-devices\n\n    # Edit configuration file\n    $ convo config"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/convo/convo.toml\n    Logs:               ~/.local/state/convo/convo.log.*\n\nKEYS (in chat):\n    Enter               send message\n    Ctrl-R              start/stop voice recording\n    Ctrl-T              toggle spoken replies\n    Ctrl-L              clear chat history\n    Esc / Ctrl-C        quit"
)]
struct Cli {
    /// Backend base URL, overriding the configured value (chat default command)
    #[arg(short, long, value_name = "URL", global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (default)
    ///
    /// Opens the chat screen. Press Enter to send the typed message,
    /// Ctrl-R to record a voice message, Ctrl-T to toggle spoken replies,
    /// Ctrl-L to clear history and Esc to quit.
    #[command(visible_alias = "c")]
    Chat {
        /// Backend base URL, overriding the configured value
        #[arg(short, long, value_name = "URL")]
        server: Option<String>,
    },

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in convo.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Open configuration file in your preferred editor
    ///
    /// Edit the backend URL, audio settings, and other configuration.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    Config,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    ///
    /// Examples:
    ///   convo completions bash > convo.bash
    ///   convo completions zsh > _convo
    ///   convo completions fish > convo.fish
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
/// - If the default configuration cannot be written on first run
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "convo", &mut io::stdout());
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

    // Write the default config file on first run so users have something to edit
    config::ensure_config_exists()?;

    // Route to appropriate command handler
    match cli.command {
        None | Some(Commands::Chat { .. }) => {
            // Default command is chat
            // Merge the top-level --server option with the explicit chat command option
            let server = match cli.command {
                Some(Commands::Chat { server }) => server.or(cli.server),
                None => cli.server,
                _ => unreachable!(),
            };
            commands::handle_chat(server).await?;
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
