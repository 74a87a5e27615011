//! Command implementations.

pub mod auth;
pub mod chat;
pub mod watch;

pub use auth::{handle_login, handle_logout, handle_status};
pub use chat::handle_chat;
pub use watch::handle_watch;

use crate::cli::ShellType;
use crate::error::Result;

/// Handles the `bloret completions <shell>` command.
///
/// Generates shell completion scripts.
pub fn handle_completions(shell: ShellType) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell};

    let mut cmd = crate::cli::Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
    };

    generate(shell, &mut cmd, "bloret", &mut std::io::stdout());

    Ok(())
}
