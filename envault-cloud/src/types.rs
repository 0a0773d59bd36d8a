//! Shared types for vault operations.
//!
//! Binary material crosses the JSON boundary as base64 strings: secret
//! ciphertexts use the `EncryptedData` wire form, wrapped keys the
//! `SealedKey` wire form. Plaintext keys never appear in any of these
//! types.

use chrono::{DateTime, Utc};
use envault_crypto::SealedKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account as known to the directory.
///
/// `salt` and `encrypted_private_key` are immutable after registration
/// (barring a password change); `public_key` is published once and never
/// re-derived.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// Hex-encoded KDF salt.
    pub salt: String,
    /// Base64 `EncryptedData` wire form.
    pub encrypted_private_key: String,
    /// Base64 X25519 public key (32 bytes).
    pub public_key: String,
}

/// Workspace kind. Personal workspaces have exactly one member for their
/// whole lifetime; shared workspaces have one or more.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceKind {
    Personal,
    Shared,
}

/// A workspace as reported by the service.
///
/// `key_version` increments monotonically on every rotation and is the
/// sole arbiter of key freshness across clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub kind: WorkspaceKind,
    pub key_version: u64,
}

/// One wrapped-key row per (workspace, member, version) tuple.
///
/// Every member has exactly one record at the workspace's current
/// version; stale versions are audit-only and never used for new
/// encryption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceKeyRecord {
    pub workspace_id: Uuid,
    pub member_id: Uuid,
    pub key_version: u64,
    /// Base64 `SealedKey` wire form.
    pub wrapped_key: String,
}

impl WorkspaceKeyRecord {
    pub fn sealed_key(&self) -> Result<SealedKey, envault_crypto::CryptoError> {
        SealedKey::from_base64(&self.wrapped_key)
    }
}

/// A project bound to a workspace.
///
/// The binding is set once and changes only through migration, never
/// because a user's selected workspace changed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub workspace_id: Uuid,
}

/// An encrypted secret row. `ciphertext` and `key_version` are always
/// written together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretRecord {
    pub project_id: Uuid,
    pub key: String,
    /// Base64 `EncryptedData` wire form.
    pub ciphertext: String,
    /// Version of the workspace key this ciphertext was produced under.
    pub key_version: u64,
}

/// Member role within a workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
    ReadOnly,
}

/// Member status within a workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Invited,
    Revoked,
}

/// Workspace membership row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub status: MemberStatus,
}

/// Authentication session. Ephemeral — held for the process lifetime
/// plus whatever the byte store persists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns true if the session will expire within the given seconds.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(secs) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Typed proof of a valid session, produced by the session guard.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub access_token: String,
}

// ── Wire payloads ──

/// `POST /api/auth/register`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password_derived_salt: String,
    pub public_key: String,
    pub encrypted_private_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub account_id: Uuid,
    pub personal_workspace_id: Uuid,
}

/// Workspace entry in the login response, carrying the caller's wrapped
/// key at the current version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginWorkspace {
    pub id: Uuid,
    pub kind: WorkspaceKind,
    pub key_version: u64,
    /// Base64 `SealedKey` wire form.
    pub wrapped_key: String,
}

/// `POST /api/auth/login`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub tokens: Session,
    pub user_id: Uuid,
    pub salt: String,
    pub encrypted_private_key: String,
    pub workspaces: Vec<LoginWorkspace>,
}

/// `POST /api/secrets` — idempotent upsert per (project, key, version).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushSecretRequest {
    pub project_id: Uuid,
    pub key: String,
    pub ciphertext: String,
    pub key_version: u64,
}

/// `POST /api/workspaces/{id}/members`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: MemberRole,
    /// Base64 `SealedKey` wire form, sealed for `user_id`.
    pub wrapped_key: String,
    pub key_version: u64,
}

/// One re-encrypted secret in a migration payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReEncryptedSecret {
    pub key: String,
    pub ciphertext: String,
}

/// One wrapped-key entry in a migration payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WrappedKeyEntry {
    pub user_id: Uuid,
    /// Base64 `SealedKey` wire form, sealed for `user_id`.
    pub wrapped_key: String,
}

/// `POST /api/projects/{id}/migrate` — committed as one remote
/// transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrateRequest {
    pub new_key_version: u64,
    pub re_encrypted_secrets: Vec<ReEncryptedSecret>,
    pub wrapped_keys: Vec<WrappedKeyEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrateResponse {
    pub new_workspace_id: Uuid,
}
