//! Authenticated symmetric encryption with ChaCha20-Poly1305.
//!
//! Every call uses a fresh random nonce, so encrypting the same plaintext
//! twice under the same key yields different ciphertexts. Decryption fails
//! on any tag mismatch; the error does not distinguish a wrong key from
//! tampered data.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// ChaCha20-Poly1305 nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Nonce plus ciphertext (which includes the Poly1305 tag).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Encodes as standard base64 of `nonce || ciphertext`.
    ///
    /// This is the single-string form used for ciphertext fields on the
    /// wire and in stored secret records.
    pub fn to_base64(&self) -> String {
        let mut buf = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        STANDARD.encode(buf)
    }

    /// Decodes the `nonce || ciphertext` base64 form.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Encoding(format!("invalid ciphertext encoding: {e}")))?;

        // The shortest valid payload is an empty plaintext: nonce + tag.
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Encoding(format!(
                "ciphertext too short: {} bytes",
                bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }
}

/// Encrypts plaintext under a symmetric key with a fresh random nonce.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts and authenticates. Fails on wrong key or tampered data.
pub fn decrypt(key: &SymmetricKey, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            encrypted.ciphertext.as_ref(),
        )
        .map_err(|_| {
            CryptoError::Decryption("authentication failed (wrong key or tampered data)".to_string())
        })
}

/// Encrypts a UTF-8 string (secret values are strings).
pub fn encrypt_string(key: &SymmetricKey, plaintext: &str) -> CryptoResult<EncryptedData> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypts to a UTF-8 string.
pub fn decrypt_string(key: &SymmetricKey, encrypted: &EncryptedData) -> CryptoResult<String> {
    let bytes = decrypt(key, encrypted)?;
    String::from_utf8(bytes)
        .map_err(|e| CryptoError::Decryption(format!("plaintext is not valid UTF-8: {e}")))
}
