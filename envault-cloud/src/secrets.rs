//! Secret encryption, push, and pull.
//!
//! Every ciphertext is tagged with the key version it was produced under,
//! and the pair is always written together. Encryption always uses the
//! workspace's current key; decryption compares versions first, then
//! fetches whichever version the record names.

use crate::api_client::ApiClient;
use crate::context::UserContext;
use crate::error::VaultResult;
use crate::key_service::WorkspaceKeyService;
use crate::session::SessionGuard;
use crate::types::{Project, PushSecretRequest, SecretRecord, Workspace};
use envault_crypto::{decrypt_string, encrypt_string, EncryptedData};
use std::sync::Arc;
use tracing::debug;

/// Encrypts, pushes, pulls, and decrypts secret values.
pub struct SecretService {
    api: Arc<ApiClient>,
    keys: WorkspaceKeyService,
    guard: Arc<SessionGuard>,
}

impl SecretService {
    pub fn new(api: Arc<ApiClient>, keys: WorkspaceKeyService, guard: Arc<SessionGuard>) -> Self {
        Self { api, keys, guard }
    }

    /// Encrypts a secret value under the workspace's current key and
    /// returns the record, tagged with the version used.
    pub async fn encrypt_secret(
        &self,
        project: &Project,
        workspace: &Workspace,
        key: &str,
        value: &str,
        ctx: &UserContext,
    ) -> VaultResult<SecretRecord> {
        self.guard.authenticated().await?;

        let workspace_key = self.keys.get_or_fetch(workspace, ctx).await?;
        let encrypted = encrypt_string(&workspace_key, value)?;

        Ok(SecretRecord {
            project_id: project.id,
            key: key.to_string(),
            ciphertext: encrypted.to_base64(),
            key_version: workspace.key_version,
        })
    }

    /// Decrypts a secret record.
    ///
    /// The record's version is compared with the workspace's current
    /// version first — that comparison, not the decrypt error, is how a
    /// stale record is told apart from tampering. The key for the
    /// record's own version is fetched if needed; a tag mismatch then
    /// surfaces as a `Crypto` decryption error, never as not-found.
    pub async fn decrypt_secret(
        &self,
        record: &SecretRecord,
        workspace: &Workspace,
        ctx: &UserContext,
    ) -> VaultResult<String> {
        if record.key_version < workspace.key_version {
            debug!(
                "secret '{}' carries stale key version {} (workspace at {})",
                record.key, record.key_version, workspace.key_version
            );
        }

        let key = self
            .keys
            .key_for_version(workspace.id, record.key_version, ctx)
            .await?;

        let encrypted = EncryptedData::from_base64(&record.ciphertext)?;
        Ok(decrypt_string(&key, &encrypted)?)
    }

    /// Pushes one record. Idempotent per secret: re-sending the same
    /// key/ciphertext/version overwrites.
    pub async fn push_secret(&self, record: &SecretRecord) -> VaultResult<()> {
        self.guard.authenticated().await?;

        self.api
            .push_secret(&PushSecretRequest {
                project_id: record.project_id,
                key: record.key.clone(),
                ciphertext: record.ciphertext.clone(),
                key_version: record.key_version,
            })
            .await?;

        debug!(
            "pushed secret '{}' for project {} at key version {}",
            record.key, record.project_id, record.key_version
        );
        Ok(())
    }

    /// Encrypts and pushes in one step (the `set` flow).
    pub async fn set_secret(
        &self,
        project: &Project,
        workspace: &Workspace,
        key: &str,
        value: &str,
        ctx: &UserContext,
    ) -> VaultResult<SecretRecord> {
        let record = self.encrypt_secret(project, workspace, key, value, ctx).await?;
        self.push_secret(&record).await?;
        Ok(record)
    }

    /// Pushes a batch, one upsert per secret. Not atomic across the wire;
    /// a mid-batch failure is safe to retry because each upsert is
    /// idempotent.
    pub async fn push_secrets(&self, records: &[SecretRecord]) -> VaultResult<()> {
        for record in records {
            self.push_secret(record).await?;
        }
        Ok(())
    }

    /// Lists and decrypts every secret in a project.
    pub async fn pull_secrets(
        &self,
        project: &Project,
        workspace: &Workspace,
        ctx: &UserContext,
    ) -> VaultResult<Vec<(String, String)>> {
        self.guard.authenticated().await?;

        let records = self.api.list_secrets(project.id).await?;
        let mut out = Vec::with_capacity(records.len());

        for record in &records {
            let value = self.decrypt_secret(record, workspace, ctx).await?;
            out.push((record.key.clone(), value));
        }

        debug!("pulled {} secrets for project {}", out.len(), project.id);
        Ok(out)
    }
}
