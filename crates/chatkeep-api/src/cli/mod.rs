//! CLI command definitions for the `chatkeep` binary.

pub mod chat;
pub mod session;
pub mod thread;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with an assistant and keep every session on disk.
#[derive(Parser)]
#[command(name = "chatkeep", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "CHATKEEP_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session, or resume a stored one.
    Chat {
        /// Resume the session with this id, restoring its history.
        #[arg(long, conflicts_with = "id")]
        resume: Option<String>,

        /// Use this id for a new session instead of a generated one.
        #[arg(long)]
        id: Option<String>,
    },

    /// List stored sessions, newest first.
    #[command(alias = "ls")]
    Sessions,

    /// Show one stored session's title, summary and log.
    Show {
        /// Session id to display.
        id: String,
    },

    /// List the most recently updated thread titles from the thread database.
    Titles {
        /// Number of threads to show.
        #[arg(short, long, default_value = "5")]
        limit: u32,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
