//! Asymmetric keyring and sealed key envelopes.
//!
//! Each account owns one long-term X25519 keypair. The private key is
//! wrapped with the password-derived user key (ChaCha20-Poly1305) before
//! it ever leaves the process; the public key is published. Workspace keys
//! travel between members as sealed envelopes: ephemeral X25519 key
//! exchange + XSalsa20-Poly1305, so the sender needs no keypair of their
//! own, only the recipient's public key.

use crate::cipher::{decrypt, encrypt, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, KdfParams, Salt, SymmetricKey, KEY_SIZE};
use base64::{engine::general_purpose::STANDARD, Engine};
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// XSalsa20 nonce size in bytes.
pub const SEAL_NONCE_SIZE: usize = 24;

/// Long-term account keypair.
///
/// The secret key implements `ZeroizeOnDrop` automatically (from crypto_box).
#[derive(Debug)]
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Returns the public key as raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Returns the secret key as raw 32-byte array.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Reconstructs a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }
}

/// A workspace key sealed with a recipient's X25519 public key.
///
/// The ephemeral public key is included so the recipient can reconstruct
/// the shared secret. Only the recipient's private key can open it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; 32],
    /// XSalsa20 nonce (24 bytes).
    pub nonce: [u8; SEAL_NONCE_SIZE],
    /// Encrypted key material (XSalsa20-Poly1305 ciphertext + tag).
    pub ciphertext: Vec<u8>,
}

impl SealedKey {
    /// Encodes as standard base64 of `ephemeral_pk || nonce || ciphertext`.
    pub fn to_base64(&self) -> String {
        let mut buf = Vec::with_capacity(32 + SEAL_NONCE_SIZE + self.ciphertext.len());
        buf.extend_from_slice(&self.ephemeral_public_key);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        STANDARD.encode(buf)
    }

    /// Decodes the `ephemeral_pk || nonce || ciphertext` base64 form.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Encoding(format!("invalid sealed key encoding: {e}")))?;

        if bytes.len() <= 32 + SEAL_NONCE_SIZE {
            return Err(CryptoError::Encoding(format!(
                "sealed key too short: {} bytes",
                bytes.len()
            )));
        }

        let mut ephemeral_public_key = [0u8; 32];
        ephemeral_public_key.copy_from_slice(&bytes[..32]);
        let mut nonce = [0u8; SEAL_NONCE_SIZE];
        nonce.copy_from_slice(&bytes[32..32 + SEAL_NONCE_SIZE]);

        Ok(Self {
            ephemeral_public_key,
            nonce,
            ciphertext: bytes[32 + SEAL_NONCE_SIZE..].to_vec(),
        })
    }
}

/// Private key wrapped with the password-derived user key.
///
/// Bundles the KDF salt so the password is the only input needed to
/// unwrap. Created once at registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PasswordProtectedKey {
    pub salt: Salt,
    pub encrypted: EncryptedData,
}

/// Generates a new long-term account keypair. Called once, at registration.
pub fn generate_keypair() -> KeyPair {
    let secret = SecretKey::generate(&mut rand::rngs::OsRng);
    let public = secret.public_key();
    KeyPair { secret, public }
}

/// Seals a workspace key for a recipient using anonymous envelope encryption.
///
/// An ephemeral X25519 keypair is generated per seal, so inviting a member
/// never requires existing members to share anything out-of-band and the
/// sender's identity is not revealed.
pub fn seal_key(key: &[u8], recipient_pk: &PublicKey) -> CryptoResult<SealedKey> {
    let ephemeral = SecretKey::generate(&mut rand::rngs::OsRng);
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient_pk, &ephemeral);

    let mut nonce_bytes = [0u8; SEAL_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce_bytes), key)
        .map_err(|e| CryptoError::Encryption(format!("envelope seal failed: {e}")))?;

    Ok(SealedKey {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a sealed workspace key using the recipient's secret key.
pub fn open_key(sealed: &SealedKey, recipient_sk: &SecretKey) -> CryptoResult<Vec<u8>> {
    let ephemeral_pk = PublicKey::from(sealed.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient_sk);

    salsa_box
        .decrypt(
            crypto_box::Nonce::from_slice(&sealed.nonce),
            sealed.ciphertext.as_ref(),
        )
        .map_err(|_| {
            CryptoError::Decryption(
                "envelope open failed (wrong key or tampered data)".to_string(),
            )
        })
}

/// Opens a sealed workspace key, requiring exactly 32 bytes of material.
pub fn open_workspace_key(sealed: &SealedKey, recipient_sk: &SecretKey) -> CryptoResult<SymmetricKey> {
    let plaintext = open_key(sealed, recipient_sk)?;
    if plaintext.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: plaintext.len(),
        });
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    Ok(SymmetricKey::from_bytes(bytes))
}

/// Wraps a private key under the password-derived user key.
///
/// Used only at registration. The returned bundle carries the KDF salt.
pub fn wrap_private_key(
    sk: &SecretKey,
    password: &str,
    params: &KdfParams,
) -> CryptoResult<PasswordProtectedKey> {
    let salt = Salt::random();
    let user_key = derive_key(password, &salt, params)?;
    let encrypted = encrypt(&user_key, &sk.to_bytes())?;

    Ok(PasswordProtectedKey { salt, encrypted })
}

/// Unwraps a private key with an already-derived user key.
///
/// A `Decryption` error here is the sole wrong-password signal: there is
/// no separate password-verification step anywhere in the hierarchy.
pub fn unwrap_private_key(
    encrypted: &EncryptedData,
    user_key: &SymmetricKey,
) -> CryptoResult<SecretKey> {
    let plaintext = decrypt(user_key, encrypted)?;

    if plaintext.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: plaintext.len(),
        });
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&plaintext);
    Ok(SecretKey::from(bytes))
}

/// Unwraps a password-protected private key from its bundled form.
pub fn unwrap_protected_key(
    protected: &PasswordProtectedKey,
    password: &str,
    params: &KdfParams,
) -> CryptoResult<SecretKey> {
    let user_key = derive_key(password, &protected.salt, params)?;
    unwrap_private_key(&protected.encrypted, &user_key)
}
