//! Key derivation and key material.
//!
//! User keys are derived from the login password with Argon2id; workspace
//! keys are random. Both are 32-byte ChaCha20-Poly1305 keys and share the
//! [`SymmetricKey`] type, which zeroizes its bytes on drop.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key size in bytes (ChaCha20-Poly1305).
pub const KEY_SIZE: usize = 32;

/// KDF salt size in bytes.
pub const SALT_SIZE: usize = 32;

/// A 32-byte symmetric key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    /// Key bytes never appear in debug output or logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        // Test/equality use only; key comparison is not a hot path.
        self.0 == other.0
    }
}
impl Eq for SymmetricKey {}

/// Random KDF salt, generated at registration and stored server-side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn from_hex(hex: &str) -> CryptoResult<Self> {
        if hex.len() != SALT_SIZE * 2 {
            return Err(CryptoError::Encoding(format!(
                "salt hex must be {} chars, got {}",
                SALT_SIZE * 2,
                hex.len()
            )));
        }
        let mut bytes = [0u8; SALT_SIZE];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk)
                .map_err(|e| CryptoError::Encoding(e.to_string()))?;
            bytes[i] = u8::from_str_radix(s, 16)
                .map_err(|e| CryptoError::Encoding(format!("invalid salt hex: {e}")))?;
        }
        Ok(Self(bytes))
    }
}

/// Argon2id parameters for password hardening.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of iterations.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use outside test code.
    pub fn fast_insecure() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derives a 32-byte user key from a password and salt using Argon2id.
///
/// Deterministic: the same password and salt always produce the same key.
/// The password and the derived key must never be logged or persisted.
pub fn derive_key(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<SymmetricKey> {
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SymmetricKey::from_bytes(out))
}

/// Generates a fresh random workspace key.
///
/// Never reused across workspaces or key versions.
pub fn generate_workspace_key() -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SymmetricKey::from_bytes(bytes)
}
