//! Workspace key generation, wrapping, and the version-checked cache.
//!
//! Plaintext workspace keys exist only inside this process: generated
//! here, sealed for specific recipients before they travel, and cached
//! keyed by `(workspace_id, key_version)` once unwrapped. The reported
//! `key_version` of a workspace is the sole arbiter of freshness — a
//! cached entry behind the current version is invalidated, never served.

use crate::api_client::ApiClient;
use crate::context::UserContext;
use crate::error::{VaultError, VaultResult};
use crate::types::{Workspace, WorkspaceKeyRecord};
use crypto_box::PublicKey;
use envault_crypto::{
    generate_workspace_key, open_workspace_key, seal_key, SealedKey, SymmetricKey,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Generates, wraps, unwraps, and caches workspace keys.
#[derive(Clone)]
pub struct WorkspaceKeyService {
    api: Arc<ApiClient>,
    cache: Arc<RwLock<HashMap<(Uuid, u64), SymmetricKey>>>,
}

impl WorkspaceKeyService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fresh random workspace key. Never reused across workspaces or
    /// versions.
    pub fn create_workspace_key(&self) -> SymmetricKey {
        generate_workspace_key()
    }

    /// Seals a workspace key for a recipient's public key.
    ///
    /// Anonymous: the sender needs no keypair of their own, which is why
    /// inviting a member never requires an out-of-band secret exchange.
    pub fn wrap_for(&self, key: &SymmetricKey, recipient_pk: &PublicKey) -> VaultResult<SealedKey> {
        Ok(seal_key(key.as_bytes(), recipient_pk)?)
    }

    /// Seals a workspace key for a member, fetching their published
    /// public key from the directory.
    pub async fn wrap_for_member(
        &self,
        key: &SymmetricKey,
        member_id: Uuid,
    ) -> VaultResult<SealedKey> {
        let pk_bytes = self.api.get_public_key(member_id).await?;
        self.wrap_for(key, &PublicKey::from(pk_bytes))
    }

    /// Opens a wrapped key record with the context's private key.
    ///
    /// Fails with a `Decryption` error if the record was not sealed for
    /// this keypair.
    pub fn unwrap_for_self(
        &self,
        record: &WorkspaceKeyRecord,
        ctx: &UserContext,
    ) -> VaultResult<SymmetricKey> {
        let sealed = record.sealed_key()?;
        Ok(open_workspace_key(&sealed, &ctx.keypair.secret)?)
    }

    /// Registers an unwrapped key (login seeding, migration commit).
    pub async fn insert(&self, workspace_id: Uuid, key_version: u64, key: SymmetricKey) {
        self.cache
            .write()
            .await
            .insert((workspace_id, key_version), key);
    }

    /// Drops every cached entry for a workspace.
    pub async fn invalidate(&self, workspace_id: Uuid) {
        self.cache
            .write()
            .await
            .retain(|(id, _), _| *id != workspace_id);
    }

    /// Returns the cached key at an exact version, if present.
    pub async fn cached(&self, workspace_id: Uuid, key_version: u64) -> Option<SymmetricKey> {
        self.cache
            .read()
            .await
            .get(&(workspace_id, key_version))
            .cloned()
    }

    /// Returns the key at the workspace's current version, fetching and
    /// unwrapping it if not cached.
    ///
    /// Entries behind the reported version are invalidated before the
    /// fetch — removed outright, not read through — so a failed fetch can
    /// never leave a stale key servable.
    pub async fn get_or_fetch(
        &self,
        workspace: &Workspace,
        ctx: &UserContext,
    ) -> VaultResult<SymmetricKey> {
        {
            let cache = self.cache.read().await;
            if let Some(key) = cache.get(&(workspace.id, workspace.key_version)) {
                return Ok(key.clone());
            }
        }

        {
            let mut cache = self.cache.write().await;
            let before = cache.len();
            cache.retain(|(id, version), _| {
                *id != workspace.id || *version >= workspace.key_version
            });
            let dropped = before - cache.len();
            if dropped > 0 {
                debug!(
                    "invalidated {dropped} stale key cache entries for workspace {} (current version {})",
                    workspace.id, workspace.key_version
                );
            }
        }

        let record = self
            .api
            .get_workspace_key(workspace.id, workspace.key_version)
            .await?;
        let key = self.unwrap_for_self(&record, ctx)?;

        self.insert(workspace.id, workspace.key_version, key.clone())
            .await;
        debug!(
            "unwrapped workspace key for {} at version {}",
            workspace.id, workspace.key_version
        );
        Ok(key)
    }

    /// Returns the key at an explicit version (decryption of records that
    /// carry an older tag). Stale versions are never used to encrypt.
    pub async fn key_for_version(
        &self,
        workspace_id: Uuid,
        key_version: u64,
        ctx: &UserContext,
    ) -> VaultResult<SymmetricKey> {
        if let Some(key) = self.cached(workspace_id, key_version).await {
            return Ok(key);
        }

        let record = self.api.get_workspace_key(workspace_id, key_version).await?;
        let key = self.unwrap_for_self(&record, ctx)?;
        self.insert(workspace_id, key_version, key.clone()).await;
        Ok(key)
    }

    /// Seeds the cache from login-returned wrapped keys.
    ///
    /// Entries that fail to unwrap are skipped with a warning rather than
    /// failing the whole login; they will surface as `KeyNotFound` or a
    /// `Decryption` error when actually used.
    pub async fn seed_from_login(
        &self,
        workspaces: &[crate::types::LoginWorkspace],
        ctx: &UserContext,
    ) -> usize {
        let mut seeded = 0;
        for ws in workspaces {
            let sealed = match SealedKey::from_base64(&ws.wrapped_key) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("skipping malformed wrapped key for workspace {}: {e}", ws.id);
                    continue;
                }
            };
            match open_workspace_key(&sealed, &ctx.keypair.secret) {
                Ok(key) => {
                    self.insert(ws.id, ws.key_version, key).await;
                    seeded += 1;
                }
                Err(e) => {
                    tracing::warn!("cannot unwrap key for workspace {}: {e}", ws.id);
                }
            }
        }
        seeded
    }

    /// Number of cached keys.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Clears the whole cache (logout).
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}
