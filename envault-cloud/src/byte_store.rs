//! Platform-neutral secure byte storage.
//!
//! The crypto core never talks to an OS keychain directly; anything that
//! wants to park bytes between invocations (the unwrapped private key,
//! a persisted session) goes through this capability interface. Platform
//! backends live with the embedding application; tests use the in-memory
//! implementation.

use crate::error::{VaultError, VaultResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Capability interface over a secure byte store.
pub trait SecureByteStore: Send + Sync {
    fn put(&self, id: &str, bytes: &[u8]) -> VaultResult<()>;
    fn get(&self, id: &str) -> VaultResult<Option<Vec<u8>>>;
    fn delete(&self, id: &str) -> VaultResult<()>;
}

/// In-memory byte store. Process-local; contents die with the process.
#[derive(Clone, Default)]
pub struct InMemoryByteStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureByteStore for InMemoryByteStore {
    fn put(&self, id: &str, bytes: &[u8]) -> VaultResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VaultError::InvalidState("byte store lock poisoned".to_string()))?;
        entries.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> VaultResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| VaultError::InvalidState("byte store lock poisoned".to_string()))?;
        Ok(entries.get(id).cloned())
    }

    fn delete(&self, id: &str) -> VaultResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VaultError::InvalidState("byte store lock poisoned".to_string()))?;
        entries.remove(id);
        Ok(())
    }
}
