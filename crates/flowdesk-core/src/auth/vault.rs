use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "flowdesk";

/// Remembered login passwords, kept in the OS keychain.
///
/// Only passwords a user typed are stored here, keyed by username. Bearer
/// tokens live in the credential store.
#[derive(Debug, Clone)]
pub struct PasswordVault {
    service: String,
}

impl Default for PasswordVault {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl PasswordVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, username: &str) -> Result<Entry> {
        Entry::new(&self.service, username).context("Failed to create keyring entry")
    }

    pub fn remember(&self, username: &str, password: &str) -> Result<()> {
        self.entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// The remembered password, or `None` if nothing is stored for `username`
    pub fn recall(&self, username: &str) -> Result<Option<String>> {
        match self.entry(username)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Drop the remembered password. Returns whether one was stored.
    pub fn forget(&self, username: &str) -> Result<bool> {
        match self.entry(username)?.delete_credential() {
            Ok(()) => {
                debug!(username, "Forgot remembered password");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
