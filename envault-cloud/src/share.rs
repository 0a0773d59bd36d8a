//! Workspace sharing state machine.
//!
//! A project starts bound to a personal workspace (one member). The first
//! invite migrates it: new key, full local re-encryption, one remote
//! transaction. Later invites wrap the existing key for the new member
//! and touch nothing else. The states are Private → Migrating (transient,
//! all-or-nothing) → Shared.

use crate::api_client::ApiClient;
use crate::context::UserContext;
use crate::error::{VaultError, VaultResult};
use crate::key_service::WorkspaceKeyService;
use crate::session::SessionGuard;
use crate::types::*;
use envault_crypto::{encrypt, EncryptedData, SymmetricKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a completed migration: the rebound project and the new
/// shared workspace.
#[derive(Clone, Debug)]
pub struct MigrationOutcome {
    pub project: Project,
    pub workspace: Workspace,
}

/// Result of an invite, which either migrated or just added a member.
#[derive(Clone, Debug)]
pub enum InviteOutcome {
    /// Personal workspace: key rotated, secrets re-encrypted, project
    /// rebound to a new shared workspace.
    Migrated(MigrationOutcome),
    /// Shared workspace: existing key wrapped for the new member at the
    /// current version; no ciphertext changed.
    MemberAdded,
}

/// Orchestrates workspace creation, invitation, and personal→shared
/// migration.
pub struct ShareProtocol {
    api: Arc<ApiClient>,
    keys: WorkspaceKeyService,
    guard: Arc<SessionGuard>,
}

impl ShareProtocol {
    pub fn new(api: Arc<ApiClient>, keys: WorkspaceKeyService, guard: Arc<SessionGuard>) -> Self {
        Self { api, keys, guard }
    }

    /// Invites a user to the workspace a project is bound to, migrating
    /// first if the workspace is still personal.
    pub async fn invite(
        &self,
        project: &Project,
        workspace: &Workspace,
        invitee_id: Uuid,
        role: MemberRole,
        ctx: &UserContext,
    ) -> VaultResult<InviteOutcome> {
        match workspace.kind {
            WorkspaceKind::Personal => {
                let outcome = self
                    .migrate_to_shared(project, workspace, invitee_id, role, ctx)
                    .await?;
                Ok(InviteOutcome::Migrated(outcome))
            }
            WorkspaceKind::Shared => {
                self.add_member(workspace, invitee_id, role, ctx).await?;
                Ok(InviteOutcome::MemberAdded)
            }
        }
    }

    /// Private → Shared transition: rotate the key, re-encrypt every
    /// secret, commit as one remote transaction.
    ///
    /// The re-encryption loop runs fully locally before the commit, so a
    /// failure there aborts with nothing changed anywhere. The abort is
    /// fatal to this invite: retrying would mint a fresh key that cannot
    /// match anything already sealed, so the caller must restart from
    /// scratch.
    pub async fn migrate_to_shared(
        &self,
        project: &Project,
        workspace: &Workspace,
        invitee_id: Uuid,
        role: MemberRole,
        ctx: &UserContext,
    ) -> VaultResult<MigrationOutcome> {
        self.guard.authenticated().await?;

        if workspace.kind != WorkspaceKind::Personal {
            return Err(VaultError::InvalidState(format!(
                "workspace {} is already shared; use add_member",
                workspace.id
            )));
        }
        if project.workspace_id != workspace.id {
            return Err(VaultError::InvalidState(format!(
                "project {} is not bound to workspace {}",
                project.id, workspace.id
            )));
        }

        let secrets = self.api.list_secrets(project.id).await?;

        // Gather every key version the records reference before starting
        // the local loop; after this point no remote call happens until
        // the commit.
        let mut old_keys: HashMap<u64, SymmetricKey> = HashMap::new();
        for record in &secrets {
            if !old_keys.contains_key(&record.key_version) {
                let key = self
                    .keys
                    .key_for_version(workspace.id, record.key_version, ctx)
                    .await?;
                old_keys.insert(record.key_version, key);
            }
        }

        let new_key = self.keys.create_workspace_key();
        let new_key_version = workspace.key_version + 1;

        let re_encrypted_secrets = reencrypt_all(&secrets, &old_keys, &new_key)?;

        // Wrap the new key for the owner and the invitee. Still nothing
        // committed; a failure here leaves no partial state.
        let owner_wrapped = self.keys.wrap_for(&new_key, &ctx.keypair.public)?;
        let invitee_wrapped = self.keys.wrap_for_member(&new_key, invitee_id).await?;

        let request = MigrateRequest {
            new_key_version,
            re_encrypted_secrets,
            wrapped_keys: vec![
                WrappedKeyEntry {
                    user_id: ctx.user_id,
                    wrapped_key: owner_wrapped.to_base64(),
                },
                WrappedKeyEntry {
                    user_id: invitee_id,
                    wrapped_key: invitee_wrapped.to_base64(),
                },
            ],
        };

        let response = self.api.migrate_project(project.id, &request).await?;

        // Commit succeeded: the new key is live, the personal workspace's
        // key records are unreachable.
        self.keys
            .insert(response.new_workspace_id, new_key_version, new_key)
            .await;
        self.keys.invalidate(workspace.id).await;

        info!(
            "migrated project {} to shared workspace {} at key version {new_key_version}",
            project.id, response.new_workspace_id
        );

        Ok(MigrationOutcome {
            project: Project {
                id: project.id,
                name: project.name.clone(),
                workspace_id: response.new_workspace_id,
            },
            workspace: Workspace {
                id: response.new_workspace_id,
                kind: WorkspaceKind::Shared,
                key_version: new_key_version,
            },
        })
    }

    /// Invite into an already-shared workspace. The active key is not
    /// rotated: the existing key is wrapped for the new member at the
    /// current version and no ciphertext changes.
    pub async fn add_member(
        &self,
        workspace: &Workspace,
        invitee_id: Uuid,
        role: MemberRole,
        ctx: &UserContext,
    ) -> VaultResult<()> {
        self.guard.authenticated().await?;

        if workspace.kind != WorkspaceKind::Shared {
            return Err(VaultError::InvalidState(format!(
                "workspace {} is personal; the first invite must migrate",
                workspace.id
            )));
        }

        let key = self.keys.get_or_fetch(workspace, ctx).await?;
        let wrapped = self.keys.wrap_for_member(&key, invitee_id).await?;

        self.api
            .add_member(
                workspace.id,
                &AddMemberRequest {
                    user_id: invitee_id,
                    role,
                    wrapped_key: wrapped.to_base64(),
                    key_version: workspace.key_version,
                },
            )
            .await?;

        info!(
            "added member {invitee_id} to workspace {} at key version {}",
            workspace.id, workspace.key_version
        );
        Ok(())
    }

    /// Revokes a member's key record, cutting off future distribution.
    ///
    /// The workspace key is not rotated: a removed member who cached the
    /// plaintext key can still read every secret encrypted under the
    /// current version until a rotation happens.
    pub async fn remove_member(&self, workspace: &Workspace, user_id: Uuid) -> VaultResult<()> {
        self.guard.authenticated().await?;

        self.api.remove_member(workspace.id, user_id).await?;

        warn!(
            "removed member {user_id} from workspace {}; key version {} remains readable \
             to them until the key is rotated",
            workspace.id, workspace.key_version
        );
        Ok(())
    }
}

/// Re-encrypts every secret under the new key, all-or-nothing.
///
/// Runs fully locally. Any failure — missing key version, tag mismatch,
/// malformed ciphertext — aborts the whole batch with `MigrationAborted`
/// and nothing is committed anywhere.
fn reencrypt_all(
    secrets: &[SecretRecord],
    old_keys: &HashMap<u64, SymmetricKey>,
    new_key: &SymmetricKey,
) -> VaultResult<Vec<ReEncryptedSecret>> {
    let mut out = Vec::with_capacity(secrets.len());

    for record in secrets {
        let reencrypted = reencrypt_one(record, old_keys, new_key).map_err(|e| {
            VaultError::MigrationAborted(format!(
                "re-encryption failed for secret '{}': {e}",
                record.key
            ))
        })?;
        out.push(reencrypted);
    }

    Ok(out)
}

fn reencrypt_one(
    record: &SecretRecord,
    old_keys: &HashMap<u64, SymmetricKey>,
    new_key: &SymmetricKey,
) -> VaultResult<ReEncryptedSecret> {
    let old_key = old_keys
        .get(&record.key_version)
        .ok_or_else(|| VaultError::NotFound(format!("key version {}", record.key_version)))?;

    let encrypted = EncryptedData::from_base64(&record.ciphertext)?;
    let plaintext = envault_crypto::decrypt(old_key, &encrypted)?;
    let reencrypted = encrypt(new_key, &plaintext)?;

    Ok(ReEncryptedSecret {
        key: record.key.clone(),
        ciphertext: reencrypted.to_base64(),
    })
}
