//! Identity persistence.
//!
//! This module provides the credential store used by the session:
//! - [`SecretStore`] - Trait for the persistence backend (enables mocking)
//! - [`KeyringStore`] - OS keyring (Keychain, Secret Service, Credential Manager)
//! - [`FileStore`] - JSON file for headless hosts
//! - [`MemoryStore`] - Process-lifetime storage for companion sessions
//! - [`CredentialStore`] - In-memory identity plus best-effort persistence
//!
//! The identity is stored as a single JSON document so a reader never
//! observes a partially written value.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use keyring::Entry;
use tracing::{info, warn};

use crate::auth::identity::Identity;
use crate::config::paths::identity_file;
use crate::config::{CredentialBackend, CredentialsConfig};
use crate::error::{BloretError, Result};

const SERVICE_NAME: &str = "ink.eno.bloret";
const IDENTITY_KEY: &str = "identity";

/// Persistence backend for the signed-in identity.
#[cfg_attr(test, mockall::automock)]
pub trait SecretStore: Send {
    /// Stores the identity, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the backend is inaccessible.
    fn write(&self, identity: &Identity) -> Result<()>;

    /// Reads the stored identity, `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::InvalidCredentials`] if stored data cannot be parsed.
    fn read(&self) -> Result<Option<Identity>>;

    /// Removes the stored identity. No-op if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is inaccessible.
    fn remove(&self) -> Result<()>;
}

/// Identity storage backed by the OS keyring.
pub struct KeyringStore {
    entry: Entry,
}

impl KeyringStore {
    /// Opens the keyring entry for bloret.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::CredentialStorage`] if the keyring entry cannot be created,
    /// which may occur if the keyring service is unavailable or locked.
    pub fn new() -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, IDENTITY_KEY)?;
        Ok(Self { entry })
    }
}

impl SecretStore for KeyringStore {
    fn write(&self, identity: &Identity) -> Result<()> {
        let json = serde_json::to_string(identity)?;
        self.entry.set_password(&json)?;
        Ok(())
    }

    fn read(&self) -> Result<Option<Identity>> {
        match self.entry.get_password() {
            Ok(json) => {
                let identity =
                    serde_json::from_str(&json).map_err(|_| BloretError::InvalidCredentials)?;
                Ok(Some(identity))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Identity storage in a JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a file store at the default identity path.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::at(identity_file()?))
    }

    /// Creates a file store at a specific path.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SecretStore for FileStore {
    fn write(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(identity)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read(&self) -> Result<Option<Identity>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let identity =
            serde_json::from_str(&contents).map_err(|_| BloretError::InvalidCredentials)?;
        Ok(Some(identity))
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Identity storage that lives as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Identity>>,
}

impl MemoryStore {
    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Identity>>> {
        self.slot
            .lock()
            .map_err(|_| BloretError::CredentialStorage("memory store poisoned".to_string()))
    }
}

impl SecretStore for MemoryStore {
    fn write(&self, identity: &Identity) -> Result<()> {
        *self.slot()? = Some(identity.clone());
        Ok(())
    }

    fn read(&self) -> Result<Option<Identity>> {
        Ok(self.slot()?.clone())
    }

    fn remove(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Opens the backend selected in configuration.
///
/// # Errors
///
/// Returns an error if the backend cannot be opened.
pub fn open_backend(config: &CredentialsConfig) -> Result<Box<dyn SecretStore>> {
    Ok(match config.backend {
        CredentialBackend::Keyring => Box::new(KeyringStore::new()?),
        CredentialBackend::File => Box::new(FileStore::new()?),
        CredentialBackend::Memory => Box::new(MemoryStore::default()),
    })
}

/// Who initiated an identity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Login, logout or startup load on this device.
    Local,
    /// Received from the paired device.
    Remote,
}

/// Notification produced by every save or clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChange {
    /// The identity after the change, `None` when signed out.
    pub identity: Option<Identity>,
    /// Who initiated the change.
    pub origin: ChangeOrigin,
}

/// The current identity plus its persistence.
///
/// Persistence is best effort: a failed write is logged and the in-memory
/// identity stays valid for the rest of the process.
pub struct CredentialStore {
    backend: Box<dyn SecretStore>,
    current: Option<Identity>,
}

impl CredentialStore {
    /// Creates a store over a backend. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(backend: Box<dyn SecretStore>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    /// The identity currently in effect.
    #[must_use]
    pub const fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Loads the persisted identity into memory.
    ///
    /// Unreadable or corrupted storage is logged and treated as signed out.
    pub fn load(&mut self) -> Option<Identity> {
        self.current = match self.backend.read() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "could not read stored identity");
                None
            }
        };
        self.current.clone()
    }

    /// Replaces the identity and persists it.
    pub fn save(&mut self, identity: Identity, origin: ChangeOrigin) -> IdentityChange {
        if let Err(e) = self.backend.write(&identity) {
            warn!(
                error = %e,
                username = %identity.username,
                "identity not persisted; it will not survive a restart"
            );
        }
        info!(username = %identity.username, ?origin, "identity saved");
        self.current = Some(identity);
        IdentityChange {
            identity: self.current.clone(),
            origin,
        }
    }

    /// Removes the identity from memory and storage.
    pub fn clear(&mut self, origin: ChangeOrigin) -> IdentityChange {
        if let Err(e) = self.backend.remove() {
            warn!(error = %e, "stored identity could not be removed");
        }
        if let Some(previous) = self.current.take() {
            info!(username = %previous.username, ?origin, "identity cleared");
        }
        IdentityChange {
            identity: None,
            origin,
        }
    }
}
