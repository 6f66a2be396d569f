//! Credential storage: a small string key/value store for the signed-in
//! identity. Token lifecycle is out of scope; tokens are stored opaquely.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

pub const USER_ID_KEY: &str = "userId";
pub const NAME_KEY: &str = "name";
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file is not a JSON object of strings: {0}")]
    Format(#[from] serde_json::Error),
}

pub trait CredentialStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    fn clear(&self) -> Result<(), CredentialError>;
}

// ─── Identity ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: Option<String>,
}

impl Identity {
    pub fn load(store: &dyn CredentialStore) -> Result<Option<Self>, CredentialError> {
        let Some(user_id) = store.get_item(USER_ID_KEY)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            user_id,
            name: store.get_item(NAME_KEY)?,
        }))
    }

    pub fn save(&self, store: &dyn CredentialStore) -> Result<(), CredentialError> {
        store.set_item(USER_ID_KEY, &self.user_id)?;
        if let Some(name) = &self.name {
            store.set_item(NAME_KEY, name)?;
        }
        Ok(())
    }
}

// ─── In-memory ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user_id: &str) -> Self {
        let store = Self::default();
        store
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(USER_ID_KEY.to_owned(), user_id.to_owned());
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CredentialError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

// ─── JSON file ────────────────────────────────────────────────────

/// Persists items as a flat JSON object. A missing file reads as empty.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_all()?;
        items.insert(key.to_owned(), value.to_owned());
        self.write_all(&items)
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip_and_clear() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get_item(TOKEN_KEY).expect("get"), None);
        store.set_item(TOKEN_KEY, "abc").expect("set");
        assert_eq!(store.get_item(TOKEN_KEY).expect("get").as_deref(), Some("abc"));
        store.clear().expect("clear");
        assert_eq!(store.get_item(TOKEN_KEY).expect("get"), None);
    }

    #[test]
    fn identity_requires_user_id() {
        let store = MemoryCredentialStore::new();
        store.set_item(NAME_KEY, "Dana").expect("set");
        assert_eq!(Identity::load(&store).expect("load"), None);

        let store = MemoryCredentialStore::with_user("u-1");
        let identity = Identity::load(&store).expect("load").expect("identity");
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(identity.name, None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("credentials.json");

        let identity = Identity {
            user_id: "u-9".into(),
            name: Some("Dana".into()),
        };
        identity.save(&FileCredentialStore::new(&path)).expect("save");

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(Identity::load(&reopened).expect("load"), Some(identity));

        reopened.clear().expect("clear");
        reopened.clear().expect("clear twice");
        assert_eq!(reopened.get_item(USER_ID_KEY).expect("get"), None);
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "[1, 2]").expect("write");
        let err = FileCredentialStore::new(&path)
            .get_item(USER_ID_KEY)
            .expect_err("reject");
        assert!(matches!(err, CredentialError::Format(_)));
    }
}
