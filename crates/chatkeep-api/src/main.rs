//! chatkeep CLI entry point.
//!
//! Binary name: `chatkeep`
//!
//! Parses CLI arguments, loads `.env` and configuration, wires the session
//! store, thread database and completion provider, then dispatches to the
//! command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a local .env file; a missing file is fine.
    let _ = dotenvy::dotenv();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chatkeep_core=debug,chatkeep_infra=debug",
        _ => "trace",
    };
    chatkeep_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "chatkeep", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Chat { resume, id } => {
            cli::chat::loop_runner::run_chat_loop(&state, resume, id).await
        }
        Commands::Sessions => cli::session::list_sessions(&state, cli.json).await,
        Commands::Show { id } => cli::session::show_session(&state, &id, cli.json).await,
        Commands::Titles { limit } => cli::thread::list_titles(&state, limit, cli.json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    chatkeep_observe::tracing_setup::shutdown_tracing();
    result
}
