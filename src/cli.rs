//! Command-line interface for parley
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Voice dialogue assistant for blind and low-vision users
#[derive(Parser, Debug)]
#[command(
    name = "parley",
    version,
    about = "Voice dialogue assistant for blind and low-vision users"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output except errors (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: states and turns)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Base URL of the assistant backend (e.g., http://127.0.0.1:5000)
    #[arg(long, global = true, value_name = "URL")]
    pub service_url: Option<String>,

    /// Language tag for recognition and synthesis (e.g., en-US, de-DE)
    #[arg(long, global = true, value_name = "LANG")]
    pub language: Option<String>,

    /// Silence that ends an utterance. Examples: 5s, 1500ms
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_silence)]
    pub silence: Option<Duration>,
}

/// Parse a silence duration.
///
/// Supports any duration format accepted by `humantime`; a bare number is
/// taken as milliseconds.
fn parse_silence(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dictate a subject, hear about it, then ask follow-up questions
    Learn {
        /// Subject to look up (skips dictation)
        subject: Option<String>,
    },

    /// Start a spoken Q&A conversation from a given description
    Ask {
        /// Text spoken first and used as conversation context
        description: String,
    },

    /// Narrate a photo, offering to teach about what is in it
    Scene {
        /// Image file to describe
        image: PathBuf,
    },

    /// Dictate a note with a recording timer
    Notes {
        /// Write the note to this file when done
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., dialogue.silence_ms)
    Get {
        /// Dotted key path (e.g., speech.language, service.url)
        key: String,
    },
    /// List the effective configuration (optionally one section)
    List {
        /// Config section to show (speech, dialogue, service)
        section: Option<String>,
    },
    /// Dump the default configuration as TOML
    Dump,
    /// Print the configuration file path
    Path,
}
