//! Verifier backed by an external command.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::biometric::Verifier;
use crate::error::Result;

/// Environment variable carrying the prompt reason to the command.
pub const REASON_ENV: &str = "BLORET_AUTH_REASON";

/// Runs a shell command; exit status 0 means verified.
///
/// An unset or blank command makes the verifier unavailable. The command
/// gets no stdin; the terminal's input belongs to the caller.
pub struct CommandVerifier {
    command: Option<String>,
}

impl CommandVerifier {
    /// Creates a verifier for an optional command line.
    #[must_use]
    pub fn new(command: Option<String>) -> Self {
        let command = command.filter(|c| !c.trim().is_empty());
        Self { command }
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    fn is_available(&self) -> bool {
        self.command.is_some()
    }

    async fn verify(&self, reason: &str) -> Result<bool> {
        let Some(command) = self.command.as_deref() else {
            return Ok(false);
        };

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };

        let status = cmd
            .arg(command)
            .env(REASON_ENV, reason)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        debug!(%command, ?status, "verification command finished");
        Ok(status.success())
    }
}
