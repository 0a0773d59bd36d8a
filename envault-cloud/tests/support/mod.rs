//! Shared test helpers for the wiremock-backed engine tests.
#![allow(dead_code)] // not every test binary uses every helper

use chrono::{Duration, Utc};
use envault_cloud::{
    ApiClient, Session, SessionGuard, UserContext, VaultConfig, WorkspaceKeyService,
};
use envault_crypto::{encrypt_string, seal_key, generate_keypair, SymmetricKey};
use std::sync::Arc;
use uuid::Uuid;
use wiremock::MockServer;

/// API client pointed at a mock server, with the cheap test KDF.
pub fn test_client(server: &MockServer) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(VaultConfig::test(server.uri())))
}

/// A session expiring the given number of seconds from now.
pub fn make_session(expires_in_secs: i64) -> Session {
    Session {
        access_token: "at-test".to_string(),
        refresh_token: "rt-test".to_string(),
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
    }
}

/// Client with a healthy session already installed.
pub async fn authed_client(server: &MockServer, user_id: Uuid) -> Arc<ApiClient> {
    let client = test_client(server);
    client.set_session(make_session(3600), user_id).await;
    client
}

/// An unlocked context with a fresh keypair.
pub fn make_ctx(email: &str) -> UserContext {
    UserContext::new(Uuid::new_v4(), email.to_string(), generate_keypair())
}

/// Guard with the test refresh margin (60s).
pub fn make_guard(api: Arc<ApiClient>) -> Arc<SessionGuard> {
    Arc::new(SessionGuard::new(api, 60))
}

pub fn make_key_service(api: Arc<ApiClient>) -> WorkspaceKeyService {
    WorkspaceKeyService::new(api)
}

/// Wraps a workspace key for a context's public key, in wire form.
pub fn wrap_for_ctx(key: &SymmetricKey, ctx: &UserContext) -> String {
    seal_key(key.as_bytes(), &ctx.keypair.public)
        .expect("seal must succeed")
        .to_base64()
}

/// An encrypted secret record in wire form.
pub fn make_secret_json(
    project_id: Uuid,
    name: &str,
    value: &str,
    key: &SymmetricKey,
    key_version: u64,
) -> serde_json::Value {
    let ciphertext = encrypt_string(key, value).expect("encrypt must succeed").to_base64();
    serde_json::json!({
        "project_id": project_id,
        "key": name,
        "ciphertext": ciphertext,
        "key_version": key_version,
    })
}
