//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "livecap",
    version,
    about = "Real-time multi-speaker transcription with stable speaker labels"
)]
pub struct Cli {
    /// Path to config file (defaults to ~/.config/livecap/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transcribe a WAV file as one live session
    Run {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Chunk duration, e.g. "5s" or "2s 500ms"
        #[arg(long)]
        chunk: Option<humantime::Duration>,

        /// Gate chunks on voice activity instead of fixed duration
        #[arg(long)]
        vad: bool,

        /// Directory to record transcript and summary into
        #[arg(long)]
        record: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the resolved configuration file path
    ConfigPath,
}
