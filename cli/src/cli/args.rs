//! Command-line argument parsing.

use clap::{Parser, Subcommand, ValueEnum};

/// Bloret two-factor login approval client.
///
/// Signs in with a Bloret account, then watches for sign-in attempts made
/// elsewhere and lets you approve or deny each one from this device.
#[derive(Parser, Debug)]
#[command(name = "bloret")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the signed-in Bloret account.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Watch for sign-in attempts and answer them.
    ///
    /// Polls the provider while signed in. A pending attempt is shown with
    /// its source address and device; approving it requires local
    /// verification.
    Watch {
        /// How to lay out the prompt.
        #[arg(short, long, value_enum, default_value = "phone")]
        layout: LayoutArg,

        /// Also run a companion session that mirrors this device's identity.
        #[arg(long)]
        pair: bool,
    },

    /// Chat with Bloriko, the Bloret assistant.
    ///
    /// Sends MESSAGE and prints the answer, or starts an interactive chat
    /// when no message is given.
    Chat {
        /// Message to send.
        message: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    /// Follow shell-specific instructions to install.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Supported shell types for completions.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
}

/// Presentation used by `bloret watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// Full prompt with account and request details.
    Phone,
    /// Compact prompt for a small companion screen.
    Watch,
}

/// Authentication subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in with a Bloret account.
    ///
    /// Opens the authorization page, then exchanges the code the provider
    /// redirects back with.
    Login {
        /// Authorization code, or the full redirect URL containing it.
        #[arg(short, long)]
        code: Option<String>,

        /// Skip opening the browser automatically.
        #[arg(long)]
        no_browser: bool,
    },

    /// Sign out and remove the stored identity.
    Logout,

    /// Show the signed-in account.
    Status,
}
