//! Zero-knowledge workspace engine for Envault.
//!
//! Provides the client side of the secret-sharing protocol:
//! - Typed API client for the control plane (JWT auth, refresh on 401)
//! - Session guard with margin-based refresh
//! - Registration/login flows that unlock the keyring locally
//! - Workspace key service with a version-checked plaintext-key cache
//! - Share protocol: personal→shared migration, invites, removal
//! - Secret encrypt/push/pull tagged by key version
//!
//! The remote service only ever sees wrapped keys and ciphertext; every
//! plaintext key lives inside this process, inside an explicit
//! [`context::UserContext`] or the key cache, both cleared at logout.

pub mod api_client;
pub mod auth;
pub mod byte_store;
pub mod config;
pub mod context;
pub mod error;
pub mod key_service;
pub mod secrets;
pub mod session;
pub mod share;
pub mod types;

pub use api_client::ApiClient;
pub use auth::{unlock_keyring, AuthService};
pub use byte_store::{InMemoryByteStore, SecureByteStore};
pub use config::VaultConfig;
pub use context::UserContext;
pub use error::{VaultError, VaultResult};
pub use key_service::WorkspaceKeyService;
pub use secrets::SecretService;
pub use session::SessionGuard;
pub use share::{InviteOutcome, MigrationOutcome, ShareProtocol};
pub use types::*;
