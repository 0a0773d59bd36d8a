//! Cryptographic layer for Envault.
//!
//! Provides the client-side key hierarchy using:
//! - Argon2id for key derivation from passwords
//! - ChaCha20-Poly1305 for authenticated encryption
//! - X25519 sealed envelopes for workspace key distribution
//! - Secure key management with zeroization
//!
//! # Architecture
//!
//! The key hierarchy has three tiers:
//!
//! 1. **User Key**: Derived from the login password with Argon2id.
//!    Never stored — re-derived at every unlock.
//!
//! 2. **Account Keypair**: A long-term X25519 keypair generated at
//!    registration. The private key is wrapped under the user key;
//!    the public key is published to the directory.
//!
//! 3. **Workspace Key**: A random symmetric key per workspace and key
//!    version. Secret values are encrypted under it; it travels between
//!    members only as a sealed envelope for a specific recipient.
//!
//! The remote service stores only wrapped keys and ciphertext, so no
//! single actor other than a member's own process can read a secret.

mod cipher;
pub mod envelope;
mod error;
mod key;

pub use cipher::{
    decrypt, decrypt_string, encrypt, encrypt_string, EncryptedData, NONCE_SIZE, TAG_SIZE,
};
pub use envelope::{
    generate_keypair, open_key, open_workspace_key, seal_key, unwrap_private_key,
    unwrap_protected_key, wrap_private_key, KeyPair, PasswordProtectedKey, SealedKey,
    SEAL_NONCE_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_workspace_key, KdfParams, Salt, SymmetricKey, KEY_SIZE, SALT_SIZE};
