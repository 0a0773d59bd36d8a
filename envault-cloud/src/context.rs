//! Unlocked user context.
//!
//! Holds the unwrapped private key for the current user with an explicit
//! lifetime: created at unlock, passed into every operation that needs the
//! key, dropped at logout. There is no global credential state anywhere in
//! the engine. The secret key zeroizes on drop (crypto_box).

use crate::byte_store::SecureByteStore;
use crate::error::{VaultError, VaultResult};
use envault_crypto::KeyPair;
use uuid::Uuid;

/// An unlocked identity: who the user is plus their private key.
pub struct UserContext {
    pub user_id: Uuid,
    pub email: String,
    pub keypair: KeyPair,
}

impl UserContext {
    pub fn new(user_id: Uuid, email: String, keypair: KeyPair) -> Self {
        Self {
            user_id,
            email,
            keypair,
        }
    }

    /// The published public key for this identity.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.keypair.public_bytes()
    }

    fn store_id(email: &str) -> String {
        format!("envault.private_key.{email}")
    }

    /// Parks the unwrapped private key in the secure byte store so a later
    /// invocation can restore the context without the password.
    pub fn persist(&self, store: &dyn SecureByteStore) -> VaultResult<()> {
        store.put(&Self::store_id(&self.email), &self.keypair.secret_bytes())
    }

    /// Restores a context from the secure byte store.
    pub fn restore(
        store: &dyn SecureByteStore,
        user_id: Uuid,
        email: &str,
    ) -> VaultResult<Self> {
        let bytes = store
            .get(&Self::store_id(email))?
            .ok_or_else(|| VaultError::NotFound(format!("no stored key for {email}")))?;

        if bytes.len() != 32 {
            return Err(VaultError::InvalidState(format!(
                "stored private key has invalid length {}",
                bytes.len()
            )));
        }

        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        Ok(Self::new(
            user_id,
            email.to_string(),
            KeyPair::from_secret_bytes(secret),
        ))
    }

    /// Removes the parked private key (logout).
    pub fn evict(store: &dyn SecureByteStore, email: &str) -> VaultResult<()> {
        store.delete(&Self::store_id(email))
    }
}

impl std::fmt::Debug for UserContext {
    /// Key material never appears in debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserContext")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_store::InMemoryByteStore;
    use envault_crypto::generate_keypair;

    #[test]
    fn persist_restore_roundtrip() {
        let store = InMemoryByteStore::new();
        let user_id = Uuid::new_v4();
        let ctx = UserContext::new(user_id, "a@example.com".into(), generate_keypair());
        let public = ctx.public_bytes();

        ctx.persist(&store).unwrap();
        let restored = UserContext::restore(&store, user_id, "a@example.com").unwrap();

        assert_eq!(restored.public_bytes(), public);
    }

    #[test]
    fn restore_missing_fails() {
        let store = InMemoryByteStore::new();
        let err = UserContext::restore(&store, Uuid::new_v4(), "nobody@example.com").unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn evict_removes_key() {
        let store = InMemoryByteStore::new();
        let user_id = Uuid::new_v4();
        let ctx = UserContext::new(user_id, "a@example.com".into(), generate_keypair());
        ctx.persist(&store).unwrap();

        UserContext::evict(&store, "a@example.com").unwrap();
        assert!(UserContext::restore(&store, user_id, "a@example.com").is_err());
    }
}
