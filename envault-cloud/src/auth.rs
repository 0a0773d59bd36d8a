//! Registration, login, and keyring unlock.
//!
//! Registration is the only place a keypair is generated and wrapped; the
//! plaintext private key never leaves the process. Login derives the user
//! key from the server-stored salt and unwraps the private key — the
//! unwrap is the password check, since the hierarchy has no separate
//! verification step.

use crate::api_client::ApiClient;
use crate::byte_store::SecureByteStore;
use crate::context::UserContext;
use crate::error::{VaultError, VaultResult};
use crate::key_service::WorkspaceKeyService;
use crate::types::{RegisterRequest, RegisterResponse};
use base64::{engine::general_purpose::STANDARD, Engine};
use envault_crypto::{
    derive_key, generate_keypair, unwrap_private_key, wrap_private_key, CryptoError,
    EncryptedData, KdfParams, KeyPair, Salt,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Unlocks a keyring from its stored form.
///
/// Derives the user key from `password` and the account salt, then
/// unwraps the private key. A wrong password surfaces as `AuthFailed` —
/// indistinguishable from a corrupted keyring, by construction.
pub fn unlock_keyring(
    salt_hex: &str,
    encrypted_private_key: &str,
    password: &str,
    kdf: &KdfParams,
) -> VaultResult<KeyPair> {
    let salt = Salt::from_hex(salt_hex)?;
    let user_key = derive_key(password, &salt, kdf)?;
    let encrypted = EncryptedData::from_base64(encrypted_private_key)?;

    let secret = unwrap_private_key(&encrypted, &user_key).map_err(|e| match e {
        CryptoError::Decryption(_) => {
            VaultError::AuthFailed("invalid password or corrupted keyring".to_string())
        }
        other => VaultError::Crypto(other),
    })?;

    Ok(KeyPair::from_secret_bytes(secret.to_bytes()))
}

/// Account registration and session establishment.
pub struct AuthService {
    api: Arc<ApiClient>,
    keys: WorkspaceKeyService,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>, keys: WorkspaceKeyService) -> Self {
        Self { api, keys }
    }

    /// Registers a new account.
    ///
    /// Generates the keypair (exactly once per account), wraps the
    /// private key under the password-derived user key, and publishes
    /// salt, wrapped key, and public key. Returns the server's response
    /// and the already-unlocked context.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> VaultResult<(RegisterResponse, UserContext)> {
        let kdf = self.api.config().kdf.clone();
        let keypair = generate_keypair();
        let protected = wrap_private_key(&keypair.secret, password, &kdf)?;

        let public_bytes = keypair.public_bytes();
        let request = RegisterRequest {
            email: email.to_string(),
            password_derived_salt: protected.salt.to_hex(),
            public_key: STANDARD.encode(public_bytes),
            encrypted_private_key: protected.encrypted.to_base64(),
        };

        let response = self.api.register(&request).await?;

        info!(
            "registered account {} with public key fingerprint {}",
            response.account_id,
            hex::encode(Sha256::digest(public_bytes))
        );

        let ctx = UserContext::new(response.account_id, email.to_string(), keypair);
        Ok((response, ctx))
    }

    /// Logs in, unlocks the keyring, and seeds the workspace key cache
    /// from the wrapped keys the server returned.
    pub async fn login(&self, email: &str, password: &str) -> VaultResult<UserContext> {
        let response = self.api.login(email, password).await?;

        let keypair = unlock_keyring(
            &response.salt,
            &response.encrypted_private_key,
            password,
            &self.api.config().kdf,
        )?;

        let ctx = UserContext::new(response.user_id, email.to_string(), keypair);

        let seeded = self.keys.seed_from_login(&response.workspaces, &ctx).await;
        info!(
            "logged in as {} and unwrapped {seeded} of {} workspace keys",
            ctx.user_id,
            response.workspaces.len()
        );

        Ok(ctx)
    }

    /// Logs out: best-effort remote revocation, then clears the session,
    /// the key cache, and the parked private key. Consumes the context so
    /// the unwrapped keypair's lifetime visibly ends here.
    pub async fn logout(&self, ctx: UserContext, store: &dyn SecureByteStore) -> VaultResult<()> {
        self.api.logout().await;
        self.keys.clear().await;
        UserContext::evict(store, &ctx.email)?;
        info!("logged out {}", ctx.user_id);
        Ok(())
    }
}
