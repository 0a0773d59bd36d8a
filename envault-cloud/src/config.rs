//! Vault engine configuration.

use envault_crypto::KdfParams;
use serde::{Deserialize, Serialize};

/// Configuration for the vault engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base URL for the Envault API (e.g., "https://api.envault.dev").
    pub api_base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Session refresh margin in seconds (refresh before expiry).
    pub refresh_margin_secs: i64,

    /// Argon2id parameters for password-derived keys.
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.envault.dev".to_string(),
            request_timeout_secs: 30,
            refresh_margin_secs: 60, // 1 minute before expiry
            kdf: KdfParams::default(),
        }
    }
}

impl VaultConfig {
    /// Creates a config for tests: local mock server, cheap KDF.
    pub fn test(api_base_url: String) -> Self {
        Self {
            api_base_url,
            request_timeout_secs: 5,
            refresh_margin_secs: 60,
            kdf: KdfParams::fast_insecure(),
        }
    }
}
