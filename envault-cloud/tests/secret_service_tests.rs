//! Secret encrypt/push/pull against a mock control plane.

mod support;

use envault_cloud::{
    Project, PushSecretRequest, SecretRecord, SecretService, VaultError, Workspace,
    WorkspaceKeyService, WorkspaceKind,
};
use envault_crypto::{decrypt_string, generate_workspace_key, EncryptedData};
use support::*;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn secret_service(
    server: &MockServer,
    user_id: Uuid,
) -> (SecretService, WorkspaceKeyService) {
    let api = authed_client(server, user_id).await;
    let keys = make_key_service(api.clone());
    let guard = make_guard(api.clone());
    (SecretService::new(api, keys.clone(), guard), keys)
}

fn shared_workspace(key_version: u64) -> Workspace {
    Workspace {
        id: Uuid::new_v4(),
        kind: WorkspaceKind::Shared,
        key_version,
    }
}

fn project_in(workspace: &Workspace) -> Project {
    Project {
        id: Uuid::new_v4(),
        name: "web-app".to_string(),
        workspace_id: workspace.id,
    }
}

#[tokio::test]
async fn set_secret_encrypts_under_current_version() {
    let server = MockServer::start().await;
    let ctx = make_ctx("owner@example.com");
    let workspace = shared_workspace(3);
    let project = project_in(&workspace);
    let k3 = generate_workspace_key();

    Mock::given(method("POST"))
        .and(path("/api/secrets"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (secrets, keys) = secret_service(&server, ctx.user_id).await;
    keys.insert(workspace.id, 3, k3.clone()).await;

    let record = secrets
        .set_secret(&project, &workspace, "API_KEY", "sk-42", &ctx)
        .await
        .unwrap();

    // Ciphertext and version are written together
    assert_eq!(record.key_version, 3);
    let encrypted = EncryptedData::from_base64(&record.ciphertext).unwrap();
    assert_eq!(decrypt_string(&k3, &encrypted).unwrap(), "sk-42");

    // The pushed payload carries the same pair
    let requests = server.received_requests().await.unwrap();
    let pushed: PushSecretRequest = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(pushed.key_version, 3);
    assert_eq!(pushed.ciphertext, record.ciphertext);
    assert_eq!(pushed.project_id, project.id);
}

#[tokio::test]
async fn push_is_idempotent_per_secret() {
    let server = MockServer::start().await;
    let ctx = make_ctx("owner@example.com");
    let workspace = shared_workspace(1);
    let project = project_in(&workspace);
    let k1 = generate_workspace_key();

    Mock::given(method("POST"))
        .and(path("/api/secrets"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let (secrets, keys) = secret_service(&server, ctx.user_id).await;
    keys.insert(workspace.id, 1, k1).await;

    let record = secrets
        .encrypt_secret(&project, &workspace, "API_KEY", "sk-42", &ctx)
        .await
        .unwrap();

    // A retry after a presumed mid-push failure re-sends the same record
    secrets.push_secret(&record).await.unwrap();
    secrets.push_secret(&record).await.unwrap();
}

#[tokio::test]
async fn decrypt_secret_uses_the_records_own_version() {
    let server = MockServer::start().await;
    let ctx = make_ctx("owner@example.com");
    // Workspace has rotated to version 2; the record still carries 1
    let workspace = shared_workspace(2);
    let project = project_in(&workspace);
    let k1 = generate_workspace_key();

    let (secrets, keys) = secret_service(&server, ctx.user_id).await;
    keys.insert(workspace.id, 1, k1.clone()).await;

    let record = SecretRecord {
        project_id: project.id,
        key: "API_KEY".to_string(),
        ciphertext: envault_crypto::encrypt_string(&k1, "sk-42").unwrap().to_base64(),
        key_version: 1,
    };

    let value = secrets.decrypt_secret(&record, &workspace, &ctx).await.unwrap();
    assert_eq!(value, "sk-42");

    // Served entirely from the cache
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn decrypt_tampered_secret_is_crypto_error() {
    let server = MockServer::start().await;
    let ctx = make_ctx("owner@example.com");
    let workspace = shared_workspace(1);
    let project = project_in(&workspace);
    let k1 = generate_workspace_key();

    let (secrets, keys) = secret_service(&server, ctx.user_id).await;
    keys.insert(workspace.id, 1, k1.clone()).await;

    let mut encrypted = envault_crypto::encrypt_string(&k1, "sk-42").unwrap();
    if let Some(byte) = encrypted.ciphertext.last_mut() {
        *byte ^= 0x01;
    }
    let record = SecretRecord {
        project_id: project.id,
        key: "API_KEY".to_string(),
        ciphertext: encrypted.to_base64(),
        key_version: 1,
    };

    let err = secrets.decrypt_secret(&record, &workspace, &ctx).await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Crypto(envault_crypto::CryptoError::Decryption(_))
    ));
}

#[tokio::test]
async fn missing_key_version_is_key_not_found_not_crypto() {
    let server = MockServer::start().await;
    let ctx = make_ctx("owner@example.com");
    let workspace = shared_workspace(2);
    let project = project_in(&workspace);

    Mock::given(method("GET"))
        .and(path(format!("/api/workspaces/{}/key", workspace.id)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (secrets, _keys) = secret_service(&server, ctx.user_id).await;

    let record = SecretRecord {
        project_id: project.id,
        key: "API_KEY".to_string(),
        ciphertext: envault_crypto::encrypt_string(&generate_workspace_key(), "x")
            .unwrap()
            .to_base64(),
        key_version: 1,
    };

    let err = secrets.decrypt_secret(&record, &workspace, &ctx).await.unwrap_err();
    assert!(matches!(err, VaultError::KeyNotFound { key_version: 1, .. }));
}

#[tokio::test]
async fn pull_decrypts_every_secret() {
    let server = MockServer::start().await;
    let ctx = make_ctx("owner@example.com");
    let workspace = shared_workspace(2);
    let project = project_in(&workspace);
    let k2 = generate_workspace_key();

    Mock::given(method("GET"))
        .and(path("/api/secrets"))
        .and(query_param("project_id", project.id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secrets": [
                make_secret_json(project.id, "API_KEY", "sk-42", &k2, 2),
                make_secret_json(project.id, "DB_URL", "postgres://x", &k2, 2),
            ],
        })))
        .mount(&server)
        .await;

    let (secrets, keys) = secret_service(&server, ctx.user_id).await;
    keys.insert(workspace.id, 2, k2).await;

    let pulled = secrets.pull_secrets(&project, &workspace, &ctx).await.unwrap();

    assert_eq!(pulled.len(), 2);
    assert!(pulled.contains(&("API_KEY".to_string(), "sk-42".to_string())));
    assert!(pulled.contains(&("DB_URL".to_string(), "postgres://x".to_string())));
}
