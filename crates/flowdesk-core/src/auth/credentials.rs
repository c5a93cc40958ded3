use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a credential store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Session storage lock poisoned")]
    Poisoned,
}

/// The keys a credential store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Token,
    Identity,
    Role,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::Token,
        CredentialKey::Identity,
        CredentialKey::Role,
    ];

    /// Name the value is persisted under
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKey::Token => "token",
            CredentialKey::Identity => "username",
            CredentialKey::Role => "role",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session identity data: bearer token, username and role label.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: Option<String>,
    #[serde(rename = "username")]
    pub identity: Option<String>,
    pub role: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, identity: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            identity: Some(identity.into()),
            role: Some(role.into()),
        }
    }

    /// A token is present
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.identity.is_none() && self.role.is_none()
    }

    pub fn field(&self, key: CredentialKey) -> Option<&str> {
        match key {
            CredentialKey::Token => self.token.as_deref(),
            CredentialKey::Identity => self.identity.as_deref(),
            CredentialKey::Role => self.role.as_deref(),
        }
    }

    pub(crate) fn field_mut(&mut self, key: CredentialKey) -> &mut Option<String> {
        match key {
            CredentialKey::Token => &mut self.token,
            CredentialKey::Identity => &mut self.identity,
            CredentialKey::Role => &mut self.role,
        }
    }
}

// The token never ends up in logs through Debug.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("identity", &self.identity)
            .field("role", &self.role)
            .finish()
    }
}

/// Key-value storage for the session credential.
///
/// Implementations only provide per-key access. The grouped operations
/// (`get`, `set`, `clear`) are what the pipeline, guard and login flow use,
/// so the three fields always move together.
pub trait CredentialStore: Send + Sync {
    fn read(&self, key: CredentialKey) -> Result<Option<String>, StoreError>;

    fn write(&self, key: CredentialKey, value: &str) -> Result<(), StoreError>;

    fn delete(&self, key: CredentialKey) -> Result<(), StoreError>;

    fn token(&self) -> Result<Option<String>, StoreError> {
        self.read(CredentialKey::Token)
    }

    fn get(&self) -> Result<Credential, StoreError> {
        Ok(Credential {
            token: self.read(CredentialKey::Token)?,
            identity: self.read(CredentialKey::Identity)?,
            role: self.read(CredentialKey::Role)?,
        })
    }

    /// Replace the whole credential. Fields that are `None` are deleted.
    fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        for key in CredentialKey::ALL {
            match credential.field(key) {
                Some(value) => self.write(key, value)?,
                None => self.delete(key)?,
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        for key in CredentialKey::ALL {
            self.delete(key)?;
        }
        Ok(())
    }
}

/// Handle shared by the request pipeline, the navigation guard and the host.
pub type SharedStore = Arc<dyn CredentialStore>;

/// In-process credential store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: RwLock::new(credential),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }
}

impl CredentialStore for MemoryStore {
    fn read(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.field(key).map(str::to_string))
    }

    fn write(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        *guard.field_mut(key) = Some(value.to_string());
        Ok(())
    }

    fn delete(&self, key: CredentialKey) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        *guard.field_mut(key) = None;
        Ok(())
    }

    fn get(&self) -> Result<Credential, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        *guard = credential.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        *guard = Credential::default();
        Ok(())
    }
}
