//! Registration, login/unlock, and logout flows.

mod support;

use chrono::{Duration, Utc};
use envault_cloud::{
    unlock_keyring, AuthService, InMemoryByteStore, RegisterRequest, UserContext, VaultError,
};
use envault_crypto::{generate_keypair, generate_workspace_key, wrap_private_key, KdfParams, seal_key};
use support::*;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_kdf() -> KdfParams {
    KdfParams::fast_insecure()
}

/// Builds the server-side view of an account: what the directory stores
/// after registration.
fn stored_account(password: &str) -> (envault_crypto::KeyPair, String, String) {
    let keypair = generate_keypair();
    let protected = wrap_private_key(&keypair.secret, password, &fast_kdf()).unwrap();
    let salt_hex = protected.salt.to_hex();
    let encrypted_b64 = protected.encrypted.to_base64();
    (keypair, salt_hex, encrypted_b64)
}

// ── Keyring Unlock ──

#[test]
fn unlock_keyring_roundtrip() {
    let (keypair, salt_hex, encrypted) = stored_account("hunter2hunter2");

    let unlocked = unlock_keyring(&salt_hex, &encrypted, "hunter2hunter2", &fast_kdf()).unwrap();
    assert_eq!(unlocked.public_bytes(), keypair.public_bytes());
}

#[test]
fn unlock_keyring_wrong_password_is_auth_failed() {
    let (_keypair, salt_hex, encrypted) = stored_account("correct-password");

    let err = unlock_keyring(&salt_hex, &encrypted, "wrong-password", &fast_kdf()).unwrap_err();
    assert!(matches!(err, VaultError::AuthFailed(_)));
}

// ── Register ──

#[tokio::test]
async fn register_publishes_wrapped_key_material_only() {
    let server = MockServer::start().await;
    let account_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "account_id": account_id,
            "personal_workspace_id": Uuid::new_v4(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = test_client(&server);
    let auth = AuthService::new(api.clone(), make_key_service(api.clone()));

    let (response, ctx) = auth.register("new@example.com", "hunter2hunter2").await.unwrap();
    assert_eq!(response.account_id, account_id);
    assert_eq!(ctx.user_id, account_id);

    // Everything that left the process is derivable-without-password only
    let requests = server.received_requests().await.unwrap();
    let sent: RegisterRequest = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent.email, "new@example.com");
    assert_eq!(sent.password_derived_salt.len(), 64); // 32-byte salt, hex

    // The wrapped private key unwraps with the password back to the
    // published public key
    let unlocked = unlock_keyring(
        &sent.password_derived_salt,
        &sent.encrypted_private_key,
        "hunter2hunter2",
        &fast_kdf(),
    )
    .unwrap();
    assert_eq!(unlocked.public_bytes(), ctx.public_bytes());

    use base64::{engine::general_purpose::STANDARD, Engine};
    assert_eq!(STANDARD.decode(&sent.public_key).unwrap(), ctx.public_bytes());
}

// ── Login ──

fn login_body(
    user_id: Uuid,
    salt_hex: &str,
    encrypted_b64: &str,
    workspaces: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "tokens": {
            "access_token": "at-login",
            "refresh_token": "rt-login",
            "expires_at": Utc::now() + Duration::hours(1),
        },
        "user_id": user_id,
        "salt": salt_hex,
        "encrypted_private_key": encrypted_b64,
        "workspaces": workspaces,
    })
}

#[tokio::test]
async fn login_unlocks_keyring_and_seeds_cache() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let workspace_id = Uuid::new_v4();
    let (keypair, salt_hex, encrypted_b64) = stored_account("hunter2hunter2");
    let workspace_key = generate_workspace_key();
    let wrapped = seal_key(workspace_key.as_bytes(), &keypair.public).unwrap().to_base64();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(
            user_id,
            &salt_hex,
            &encrypted_b64,
            serde_json::json!([{
                "id": workspace_id,
                "kind": "personal",
                "key_version": 1,
                "wrapped_key": wrapped,
            }]),
        )))
        .mount(&server)
        .await;

    let api = test_client(&server);
    let keys = make_key_service(api.clone());
    let auth = AuthService::new(api.clone(), keys.clone());

    let ctx = auth.login("a@example.com", "hunter2hunter2").await.unwrap();

    assert_eq!(ctx.user_id, user_id);
    assert_eq!(ctx.public_bytes(), keypair.public_bytes());
    assert!(api.is_authenticated().await);

    // The login-returned wrapped key is already unwrapped and cached
    assert_eq!(keys.cached(workspace_id, 1).await, Some(workspace_key));
}

#[tokio::test]
async fn login_wrong_password_is_auth_failed_after_unwrap() {
    let server = MockServer::start().await;
    let (_keypair, salt_hex, encrypted_b64) = stored_account("correct-password");

    // The server has no way to check the password; it returns the blob
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(
            Uuid::new_v4(),
            &salt_hex,
            &encrypted_b64,
            serde_json::json!([]),
        )))
        .mount(&server)
        .await;

    let api = test_client(&server);
    let auth = AuthService::new(api.clone(), make_key_service(api.clone()));

    let err = auth.login("a@example.com", "wrong-password").await.unwrap_err();
    assert!(matches!(err, VaultError::AuthFailed(_)));
}

// ── Logout ──

#[tokio::test]
async fn logout_clears_session_cache_and_parked_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let api = authed_client(&server, Uuid::new_v4()).await;
    let keys = make_key_service(api.clone());
    let auth = AuthService::new(api.clone(), keys.clone());

    let store = InMemoryByteStore::new();
    let ctx = make_ctx("a@example.com");
    let email = ctx.email.clone();
    ctx.persist(&store).unwrap();
    keys.insert(Uuid::new_v4(), 1, generate_workspace_key()).await;

    auth.logout(ctx, &store).await.unwrap();

    assert!(!api.is_authenticated().await);
    assert!(keys.is_empty().await);
    assert!(UserContext::restore(&store, Uuid::new_v4(), &email).is_err());
}
