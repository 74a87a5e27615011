//! Local possession check gating approvals.
//!
//! [`BiometricGate`] tries a strong verifier first and a passcode-equivalent
//! fallback second. When neither is available on this host the gate permits
//! the approval: an unverifiable device must still be able to answer its
//! own sign-in requests.

pub mod command;

pub use command::CommandVerifier;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::BiometricConfig;
use crate::error::Result;

/// One way of checking that the device owner is present.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Whether this check can run on this host.
    fn is_available(&self) -> bool;

    /// Runs the check. `Ok(false)` means the user failed or cancelled it.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be run at all.
    async fn verify(&self, reason: &str) -> Result<bool>;
}

/// Strong check with a weaker fallback.
pub struct BiometricGate {
    strong: Box<dyn Verifier>,
    fallback: Box<dyn Verifier>,
}

impl BiometricGate {
    /// Builds a gate from two verifiers.
    #[must_use]
    pub fn new(strong: Box<dyn Verifier>, fallback: Box<dyn Verifier>) -> Self {
        Self { strong, fallback }
    }

    /// Builds a gate from the configured verification commands.
    #[must_use]
    pub fn from_config(config: &BiometricConfig) -> Self {
        Self::new(
            Box::new(CommandVerifier::new(config.strong_command.clone())),
            Box::new(CommandVerifier::new(config.fallback_command.clone())),
        )
    }

    /// Checks the device owner is present.
    ///
    /// Never fails: every error path resolves to `false`, and a host with no
    /// available verifier resolves to `true`.
    pub async fn authenticate(&self, reason: &str) -> bool {
        let strong_available = self.strong.is_available();
        if strong_available {
            match self.strong.verify(reason).await {
                Ok(true) => return true,
                Ok(false) => debug!("strong verification failed"),
                Err(e) => warn!(error = %e, "strong verification could not run"),
            }
        }

        if self.fallback.is_available() {
            return match self.fallback.verify(reason).await {
                Ok(passed) => passed,
                Err(e) => {
                    warn!(error = %e, "fallback verification could not run");
                    false
                }
            };
        }

        if strong_available {
            return false;
        }

        warn!("no local verification available; permitting approval");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BloretError;

    fn unavailable() -> MockVerifier {
        let mut verifier = MockVerifier::new();
        verifier.expect_is_available().return_const(false);
        verifier.expect_verify().never();
        verifier
    }

    fn answering(passed: bool) -> MockVerifier {
        let mut verifier = MockVerifier::new();
        verifier.expect_is_available().return_const(true);
        verifier
            .expect_verify()
            .times(1)
            .returning(move |_| Ok(passed));
        verifier
    }

    fn broken() -> MockVerifier {
        let mut verifier = MockVerifier::new();
        verifier.expect_is_available().return_const(true);
        verifier
            .expect_verify()
            .times(1)
            .returning(|_| Err(BloretError::Io(std::io::Error::other("no sensor"))));
        verifier
    }

    fn gate(strong: MockVerifier, fallback: MockVerifier) -> BiometricGate {
        BiometricGate::new(Box::new(strong), Box::new(fallback))
    }

    #[tokio::test]
    async fn strong_success_skips_fallback() {
        let mut fallback = MockVerifier::new();
        fallback.expect_is_available().never();
        fallback.expect_verify().never();

        assert!(gate(answering(true), fallback).authenticate("approve").await);
    }

    #[tokio::test]
    async fn strong_failure_falls_back() {
        assert!(gate(answering(false), answering(true)).authenticate("approve").await);
        assert!(!gate(answering(false), answering(false)).authenticate("approve").await);
    }

    #[tokio::test]
    async fn strong_failure_without_fallback_denies() {
        assert!(!gate(answering(false), unavailable()).authenticate("approve").await);
    }

    #[tokio::test]
    async fn strong_error_falls_back() {
        assert!(gate(broken(), answering(true)).authenticate("approve").await);
    }

    #[tokio::test]
    async fn fallback_error_denies() {
        assert!(!gate(unavailable(), broken()).authenticate("approve").await);
    }

    #[tokio::test]
    async fn fallback_only_host_uses_fallback() {
        assert!(gate(unavailable(), answering(true)).authenticate("approve").await);
    }

    #[tokio::test]
    async fn no_verifier_permits() {
        assert!(gate(unavailable(), unavailable()).authenticate("approve").await);
    }
}
