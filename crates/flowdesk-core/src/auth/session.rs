use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::{Credential, CredentialKey, CredentialStore, SharedStore, StoreError};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionData {
    #[serde(flatten)]
    credential: Credential,
    saved_at: DateTime<Utc>,
}

/// Credential store persisted to `session.json`, so a login survives restarts.
///
/// Every mutation rewrites the file. An empty credential removes the file.
/// A missing file reads as anonymous; an unreadable one is an error.
pub struct FileStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    /// When the stored credential was last written
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let _guard = self.lock()?;
        Ok(self.load()?.map(|d| d.saved_at))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn load(&self) -> Result<Option<SessionData>, StoreError> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let data: SessionData = serde_json::from_str(&contents)?;
        Ok(Some(data))
    }

    fn load_credential(&self) -> Result<Credential, StoreError> {
        Ok(self.load()?.map(|d| d.credential).unwrap_or_default())
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let path = self.session_path();
        if credential.is_empty() {
            remove_if_exists(&path)?;
            debug!(path = %path.display(), "Session file removed");
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = SessionData {
            credential: credential.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(&path, contents)?;
        debug!(path = %path.display(), "Session saved");
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl CredentialStore for FileStore {
    fn read(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock()?;
        let credential = self.load_credential()?;
        Ok(credential.field(key).map(str::to_string))
    }

    fn write(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut credential = self.load_credential()?;
        *credential.field_mut(key) = Some(value.to_string());
        self.save(&credential)
    }

    fn delete(&self, key: CredentialKey) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut credential = self.load_credential()?;
        if credential.field(key).is_none() {
            return Ok(());
        }
        *credential.field_mut(key) = None;
        self.save(&credential)
    }

    fn get(&self) -> Result<Credential, StoreError> {
        let _guard = self.lock()?;
        self.load_credential()
    }

    fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        self.save(credential)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        self.save(&Credential::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_anonymous() {
        let (_dir, store) = temp_store();
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(store.saved_at().unwrap(), None);
    }

    #[test]
    fn test_credential_survives_reopen() {
        let (dir, store) = temp_store();
        store.set(&Credential::new("abc", "u", "admin")).unwrap();
        drop(store);

        let reopened = FileStore::new(dir.path().to_path_buf());
        let cred = reopened.get().unwrap();
        assert_eq!(cred, Credential::new("abc", "u", "admin"));
        assert!(reopened.saved_at().unwrap().is_some());
    }

    #[test]
    fn test_file_uses_original_key_names() {
        let (_dir, store) = temp_store();
        store.set(&Credential::new("abc", "u", "admin")).unwrap();

        let raw = std::fs::read_to_string(store.session_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["token"], "abc");
        assert_eq!(value["username"], "u");
        assert_eq!(value["role"], "admin");
    }

    #[test]
    fn test_clear_removes_file() {
        let (_dir, store) = temp_store();
        store.set(&Credential::new("abc", "u", "admin")).unwrap();
        assert!(store.session_path().exists());

        store.clear().unwrap();
        assert!(!store.session_path().exists());
        assert!(store.get().unwrap().is_empty());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_per_key_write_and_delete() {
        let (_dir, store) = temp_store();
        store.write(CredentialKey::Token, "abc").unwrap();
        store.write(CredentialKey::Role, "user").unwrap();
        assert_eq!(store.read(CredentialKey::Role).unwrap().as_deref(), Some("user"));

        store.delete(CredentialKey::Token).unwrap();
        store.delete(CredentialKey::Role).unwrap();
        assert!(!store.session_path().exists());
    }

    #[test]
    fn test_shared_handles_see_same_file() {
        let (dir, store) = temp_store();
        let shared = store.shared();
        shared.set(&Credential::new("abc", "u", "user")).unwrap();

        let other = FileStore::new(dir.path().to_path_buf());
        assert_eq!(other.token().unwrap().as_deref(), Some("abc"));
        other.clear().unwrap();
        assert_eq!(shared.token().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_fails_closed() {
        let (_dir, store) = temp_store();
        std::fs::write(store.session_path(), "{not json").unwrap();

        let err = store.token().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
