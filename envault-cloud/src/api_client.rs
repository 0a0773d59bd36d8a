//! HTTP client for the Envault control plane API.
//!
//! Handles JWT authentication, token refresh on 401, and the vault API
//! endpoints. Uses reqwest with JSON serialization. The client only ever
//! transmits wrapped keys and ciphertext; plaintext key material never
//! appears in a request body.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::types::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// State shared across API client clones.
struct AuthState {
    session: Option<Session>,
    user_id: Option<Uuid>,
    /// Monotonically increasing counter bumped on every successful refresh.
    /// Used to detect when a concurrent refresh has already updated tokens.
    refresh_generation: u64,
}

/// HTTP client for the Envault control plane.
pub struct ApiClient {
    client: Client,
    config: VaultConfig,
    auth: Arc<RwLock<AuthState>>,
    /// Serializes refresh operations to prevent rotation race conditions.
    /// Without this, concurrent 401s all read the same old refresh token;
    /// the server rotates on the first call, and subsequent calls fail.
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    tokens: Session,
}

impl ApiClient {
    pub fn new(config: VaultConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            config,
            auth: Arc::new(RwLock::new(AuthState {
                session: None,
                user_id: None,
                refresh_generation: 0,
            })),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Sets the session directly (for restoring a saved session).
    pub async fn set_session(&self, session: Session, user_id: Uuid) {
        let mut auth = self.auth.write().await;
        auth.session = Some(session);
        auth.user_id = Some(user_id);
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.session.is_some()
    }

    pub async fn user_id(&self) -> Option<Uuid> {
        self.auth.read().await.user_id
    }

    /// Returns the current session for persistence or expiry checks.
    pub async fn current_session(&self) -> Option<Session> {
        self.auth.read().await.session.clone()
    }

    pub async fn clear_session(&self) {
        let mut auth = self.auth.write().await;
        auth.session = None;
        auth.user_id = None;
    }

    // ── Auth ──

    /// `POST /api/auth/register`. Unauthenticated.
    pub async fn register(&self, req: &RegisterRequest) -> VaultResult<RegisterResponse> {
        let url = format!("{}/api/auth/register", self.config.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        Ok(resp.json().await?)
    }

    /// `POST /api/auth/login`. On success the returned tokens become the
    /// client's session.
    pub async fn login(&self, email: &str, password: &str) -> VaultResult<LoginResponse> {
        let url = format!("{}/api/auth/login", self.config.api_base_url);
        let resp: LoginResponse = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| VaultError::AuthFailed(e.to_string()))?
            .json()
            .await?;

        self.set_session(resp.tokens.clone(), resp.user_id).await;
        Ok(resp)
    }

    /// `POST /api/auth/refresh`. Serialized; concurrent callers reuse the
    /// winner's tokens instead of racing the rotation.
    pub async fn refresh_session(&self) -> VaultResult<Session> {
        // Capture the generation before acquiring the lock so we can
        // detect if a concurrent refresh already completed.
        let pre_gen = self.auth.read().await.refresh_generation;

        let _guard = self.refresh_lock.lock().await;

        {
            let auth = self.auth.read().await;
            if auth.refresh_generation > pre_gen {
                return auth.session.clone().ok_or(VaultError::AuthRequired);
            }
        }

        let refresh_token = {
            let auth = self.auth.read().await;
            auth.session
                .as_ref()
                .map(|s| s.refresh_token.clone())
                .ok_or(VaultError::AuthRequired)?
        };

        let url = format!("{}/api/auth/refresh", self.config.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            // Refresh token is expired/revoked — clear stale session
            self.clear_session().await;
            return Err(VaultError::AuthRequired);
        }

        let resp: RefreshResponse = resp
            .error_for_status()
            .map_err(|e| VaultError::AuthFailed(format!("token refresh failed: {e}")))?
            .json()
            .await?;

        let mut auth = self.auth.write().await;
        auth.session = Some(resp.tokens.clone());
        auth.refresh_generation += 1;

        Ok(resp.tokens)
    }

    /// `POST /api/auth/logout`. Best effort; local state is cleared even
    /// if the request fails.
    pub async fn logout(&self) {
        if let Ok(token) = self.get_token().await {
            let url = format!("{}/api/auth/logout", self.config.api_base_url);
            if let Err(e) = self.client.post(&url).bearer_auth(&token).send().await {
                debug!("logout request failed (ignored): {e}");
            }
        }
        self.clear_session().await;
    }

    /// Makes an authenticated GET request, retrying once on 401.
    async fn auth_get(&self, path: &str) -> VaultResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let token = self.get_token().await?;

        let resp = self.client.get(&url).bearer_auth(&token).send().await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on GET {path}, refreshing token");
            let session = self.refresh_session().await?;
            return Ok(self
                .client
                .get(&url)
                .bearer_auth(&session.access_token)
                .send()
                .await?);
        }

        Ok(resp)
    }

    /// Makes an authenticated POST request, retrying once on 401.
    async fn auth_post(&self, path: &str, body: &impl Serialize) -> VaultResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let token = self.get_token().await?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on POST {path}, refreshing token");
            let session = self.refresh_session().await?;
            return Ok(self
                .client
                .post(&url)
                .bearer_auth(&session.access_token)
                .json(body)
                .send()
                .await?);
        }

        Ok(resp)
    }

    /// Makes an authenticated DELETE request, retrying once on 401.
    async fn auth_delete(&self, path: &str) -> VaultResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let token = self.get_token().await?;

        let resp = self.client.delete(&url).bearer_auth(&token).send().await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on DELETE {path}, refreshing token");
            let session = self.refresh_session().await?;
            return Ok(self
                .client
                .delete(&url)
                .bearer_auth(&session.access_token)
                .send()
                .await?);
        }

        Ok(resp)
    }

    async fn get_token(&self) -> VaultResult<String> {
        self.auth
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(VaultError::AuthRequired)
    }

    // ── Directory ──

    /// `GET /api/users/{id}/public_key` — the published X25519 key for a
    /// user, needed to wrap workspace keys for them.
    pub async fn get_public_key(&self, user_id: Uuid) -> VaultResult<[u8; 32]> {
        let resp = self
            .auth_get(&format!("/api/users/{user_id}/public_key"))
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        #[derive(Deserialize)]
        struct Resp {
            public_key: String,
        }
        let data: Resp = resp.json().await?;

        use base64::{engine::general_purpose::STANDARD, Engine};
        let bytes = STANDARD
            .decode(&data.public_key)
            .map_err(|e| VaultError::Api(format!("invalid public key encoding: {e}")))?;

        if bytes.len() != 32 {
            return Err(VaultError::Api(format!(
                "invalid public key length: expected 32, got {}",
                bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);

        use sha2::{Digest, Sha256};
        debug!(
            "fetched public key for user {user_id}, fingerprint {}",
            hex::encode(Sha256::digest(key))
        );
        Ok(key)
    }

    // ── Workspaces ──

    pub async fn get_workspace(&self, workspace_id: Uuid) -> VaultResult<Workspace> {
        let resp = self
            .auth_get(&format!("/api/workspaces/{workspace_id}"))
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        Ok(resp.json().await?)
    }

    /// Fetches the caller's wrapped key record at a specific version.
    /// A 404 means there is no record for this member at that version.
    pub async fn get_workspace_key(
        &self,
        workspace_id: Uuid,
        key_version: u64,
    ) -> VaultResult<WorkspaceKeyRecord> {
        let resp = self
            .auth_get(&format!(
                "/api/workspaces/{workspace_id}/key?key_version={key_version}"
            ))
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VaultError::KeyNotFound {
                workspace_id,
                key_version,
            });
        }

        let resp = resp
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        Ok(resp.json().await?)
    }

    // ── Members ──

    pub async fn add_member(
        &self,
        workspace_id: Uuid,
        req: &AddMemberRequest,
    ) -> VaultResult<()> {
        self.auth_post(&format!("/api/workspaces/{workspace_id}/members"), req)
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;
        Ok(())
    }

    pub async fn list_members(&self, workspace_id: Uuid) -> VaultResult<Vec<Member>> {
        let resp = self
            .auth_get(&format!("/api/workspaces/{workspace_id}/members"))
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        #[derive(Deserialize)]
        struct Resp {
            members: Vec<Member>,
        }
        let data: Resp = resp.json().await?;
        Ok(data.members)
    }

    /// Revokes a member's key record. Does not rotate the workspace key.
    pub async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> VaultResult<()> {
        self.auth_delete(&format!("/api/workspaces/{workspace_id}/members/{user_id}"))
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;
        Ok(())
    }

    // ── Projects ──

    pub async fn get_project(&self, project_id: Uuid) -> VaultResult<Project> {
        let resp = self.auth_get(&format!("/api/projects/{project_id}")).await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VaultError::NotFound(format!("project {project_id}")));
        }

        let resp = resp
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        Ok(resp.json().await?)
    }

    /// `POST /api/projects/{id}/migrate` — the remote side of the
    /// personal→shared transition, committed as a single transaction.
    pub async fn migrate_project(
        &self,
        project_id: Uuid,
        req: &MigrateRequest,
    ) -> VaultResult<MigrateResponse> {
        let resp = self
            .auth_post(&format!("/api/projects/{project_id}/migrate"), req)
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        Ok(resp.json().await?)
    }

    // ── Secrets ──

    /// Idempotent upsert: re-sending the same key/ciphertext/version
    /// simply overwrites, so a failed push can be retried per secret.
    pub async fn push_secret(&self, req: &PushSecretRequest) -> VaultResult<()> {
        self.auth_post("/api/secrets", req)
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;
        Ok(())
    }

    pub async fn list_secrets(&self, project_id: Uuid) -> VaultResult<Vec<SecretRecord>> {
        let resp = self
            .auth_get(&format!("/api/secrets?project_id={project_id}"))
            .await?
            .error_for_status()
            .map_err(|e| VaultError::Api(e.to_string()))?;

        #[derive(Deserialize)]
        struct Resp {
            secrets: Vec<SecretRecord>,
        }
        let data: Resp = resp.json().await?;
        Ok(data.secrets)
    }
}
