//! Authentication module for bloret.
//!
//! This module provides the signed-in identity, its persistence, and the
//! OAuth authorization-code helpers used to obtain it.

pub mod credentials;
pub mod identity;
pub mod oauth;

pub use credentials::{
    open_backend, ChangeOrigin, CredentialStore, IdentityChange, MemoryStore, SecretStore,
};
pub use identity::Identity;
pub use oauth::{authorize_url, extract_code, open_browser};
