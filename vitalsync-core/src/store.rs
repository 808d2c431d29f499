//! Credential storage.
//!
//! This module provides:
//! - [`CredentialStore`] - Trait for credential storage backends
//! - [`MemoryCredentialStore`] - In-memory implementation for tests/dev
//! - [`FileCredentialStore`] - Disk-backed JSON implementation
//!
//! All writes are atomic with respect to concurrent reads: a reader never
//! observes a half-written credential. The file store serializes writers
//! under a write lock and publishes each version with a rename.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::model::{AccountKey, Credential};

/// Abstraction over credential storage backends.
///
/// The store holds at most one credential per account key; `put` is an
/// upsert and `delete` is idempotent.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve the credential for an account.
    ///
    /// Returns `Ok(None)` if the account is not connected.
    async fn get(&self, account: &AccountKey) -> Result<Option<Credential>, StoreError>;

    /// Store a credential, replacing any existing record for its account.
    async fn put(&self, credential: Credential) -> Result<(), StoreError>;

    /// Delete the credential for an account.
    ///
    /// Returns `Ok(())` even if no credential existed.
    async fn delete(&self, account: &AccountKey) -> Result<(), StoreError>;
}

/// In-memory credential store for testing and development.
///
/// Not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// Uses interior mutability via `RwLock` and is safe to share across
/// threads.
pub struct MemoryCredentialStore {
    data: RwLock<HashMap<AccountKey, Credential>>,
}

impl MemoryCredentialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.data.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("MemoryCredentialStore")
            .field("accounts", &count)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, account: &AccountKey) -> Result<Option<Credential>, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::Lock {
            message: format!("read lock poisoned: {}", e),
        })?;
        Ok(data.get(account).cloned())
    }

    async fn put(&self, credential: Credential) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|e| StoreError::Lock {
            message: format!("write lock poisoned: {}", e),
        })?;
        data.insert(credential.account.clone(), credential);
        Ok(())
    }

    async fn delete(&self, account: &AccountKey) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|e| StoreError::Lock {
            message: format!("write lock poisoned: {}", e),
        })?;
        data.remove(account);
        Ok(())
    }
}

/// Internal storage format for the file store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialFile {
    /// Version of the store format (for future migrations).
    version: u32,

    /// All stored credentials, at most one per account key.
    credentials: Vec<Credential>,
}

impl Default for CredentialFile {
    fn default() -> Self {
        Self {
            version: 1,
            credentials: Vec::new(),
        }
    }
}

/// Disk-backed credential store.
///
/// Holds the full record set in memory and writes the JSON document back
/// on every mutation. Each write lands in a sibling temp file first and is
/// published with a rename, so a crash mid-write never leaves a corrupt
/// store visible.
pub struct FileCredentialStore {
    path: PathBuf,
    data: RwLock<CredentialFile>,
}

impl FileCredentialStore {
    /// Load the store from a path, creating parent directories and an
    /// empty document if nothing exists yet.
    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            CredentialFile::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Write the current state to disk. Callers must hold the write lock.
    fn save(&self, data: &CredentialFile) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl std::fmt::Debug for FileCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCredentialStore")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, account: &AccountKey) -> Result<Option<Credential>, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::Lock {
            message: format!("read lock poisoned: {}", e),
        })?;
        Ok(data
            .credentials
            .iter()
            .find(|c| &c.account == account)
            .cloned())
    }

    async fn put(&self, credential: Credential) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|e| StoreError::Lock {
            message: format!("write lock poisoned: {}", e),
        })?;
        data.credentials.retain(|c| c.account != credential.account);
        data.credentials.push(credential);
        self.save(&data)
    }

    async fn delete(&self, account: &AccountKey) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|e| StoreError::Lock {
            message: format!("write lock poisoned: {}", e),
        })?;
        let before = data.credentials.len();
        data.credentials.retain(|c| &c.account != account);
        if data.credentials.len() == before {
            // Nothing removed; deleting a non-existent credential is not
            // an error and needs no write.
            return Ok(());
        }
        self.save(&data)
    }
}
