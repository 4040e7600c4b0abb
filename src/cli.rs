use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate text once and print the result
    Translate {
        /// Text to translate
        #[arg(required = true)]
        text: Vec<String>,

        /// Source language code or name ("auto" to detect)
        #[arg(short, long)]
        from: Option<String>,

        /// Target language code or name
        #[arg(short, long)]
        to: Option<String>,

        /// Engine to try first (accelerated or ollama)
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// Proofread text in its own language
    Improve {
        /// Text to improve
        #[arg(required = true)]
        text: Vec<String>,

        /// Language of the text (detected when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Engine to try first (accelerated or ollama)
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// List the recommended Ollama models and whether they are installed
    Models,

    /// Translate stdin lines as they are typed
    Interactive {
        /// Translate clipboard changes automatically
        #[arg(long)]
        auto: bool,
    },

    /// Probe both translation engines
    Health,

    /// Inspect or clear translation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Show recent translations, newest first
    List {
        /// Maximum number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Delete all history
    Clear,
    /// Show history statistics
    Stats,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination (defaults to the user config directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}
