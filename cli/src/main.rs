//! Bloret CLI - two-factor login approval client
//!
//! Signs in with a Bloret account and answers sign-in attempts made
//! elsewhere. Approvals are gated behind a local verification check, and a
//! paired companion session can mirror the signed-in identity. The
//! signed-in account can also chat with the Bloriko assistant.

mod auth;
mod biometric;
mod chat;
mod cli;
mod client;
mod config;
mod error;
mod session;
mod sync;
mod two_factor;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AuthCommands, Cli, Commands};
use crate::config::settings::env;
use crate::error::Result;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(env::LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run the command
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::Login { code, no_browser } => {
                cli::commands::handle_login(code, no_browser).await
            }
            AuthCommands::Logout => cli::commands::handle_logout().await,
            AuthCommands::Status => cli::commands::handle_status().await,
        },
        Commands::Watch { layout, pair } => cli::commands::handle_watch(layout, pair).await,
        Commands::Chat { message } => cli::commands::handle_chat(message).await,
        Commands::Completions { shell } => cli::commands::handle_completions(shell),
    }
}
