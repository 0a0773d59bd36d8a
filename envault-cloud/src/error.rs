//! Error taxonomy for vault operations.
//!
//! Cryptographic failures are never swallowed or downgraded to not-found;
//! callers see exactly one classified error per failure mode.

use thiserror::Error;
use uuid::Uuid;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur in vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Bad credentials at login. Not distinguishable from a corrupted
    /// keyring until the private-key unwrap is attempted.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Session expired and the single refresh attempt failed.
    #[error("authentication required")]
    AuthRequired,

    /// No cached or fetchable workspace key at the required version.
    #[error("no workspace key for workspace {workspace_id} at version {key_version}")]
    KeyNotFound { workspace_id: Uuid, key_version: u64 },

    /// Fatal: re-encryption failed before commit. The caller must restart
    /// the migration from scratch; retrying with a new key would not match
    /// the already-sealed material.
    #[error("migration aborted: {0}")]
    MigrationAborted(String),

    /// Wrong key, wrong key version, or tampered data (among others) —
    /// see the inner error for the exact classification.
    #[error("crypto error: {0}")]
    Crypto(#[from] envault_crypto::CryptoError),

    /// Operation is invalid for the workspace's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Non-2xx API response.
    #[error("API request failed: {0}")]
    Api(String),

    /// Transport failure. Retryable by the caller only — never retried
    /// automatically inside crypto operations.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}
