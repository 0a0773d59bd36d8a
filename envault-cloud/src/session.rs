//! Session guard: every operation that touches remote state goes through
//! here first.
//!
//! Checks token expiry against a refresh margin before the guarded
//! operation starts, attempts at most one refresh, and fails with
//! `AuthRequired` otherwise — so a guarded operation never begins a
//! remote mutation with a session that is about to die.

use crate::api_client::ApiClient;
use crate::error::{VaultError, VaultResult};
use crate::types::AuthContext;
use std::sync::Arc;
use tracing::{debug, warn};

/// Guards operations that require an authenticated identity.
pub struct SessionGuard {
    api: Arc<ApiClient>,
    refresh_margin_secs: i64,
}

impl SessionGuard {
    pub fn new(api: Arc<ApiClient>, refresh_margin_secs: i64) -> Self {
        Self {
            api,
            refresh_margin_secs,
        }
    }

    /// Returns a typed authenticated context, refreshing the session if
    /// it expires within the margin.
    ///
    /// Exactly one refresh is attempted. A dead refresh token surfaces as
    /// `AuthRequired`; a transport failure during refresh stays `Http` so
    /// the caller can retry at its own layer.
    pub async fn authenticated(&self) -> VaultResult<AuthContext> {
        let session = self
            .api
            .current_session()
            .await
            .ok_or(VaultError::AuthRequired)?;
        let user_id = self.api.user_id().await.ok_or(VaultError::AuthRequired)?;

        // Fast path: session is comfortably valid
        if !session.expires_within_secs(self.refresh_margin_secs) {
            return Ok(AuthContext {
                user_id,
                access_token: session.access_token,
            });
        }

        debug!(
            "session expiring within {}s, refreshing",
            self.refresh_margin_secs
        );

        let refreshed = self.api.refresh_session().await.map_err(|e| match e {
            VaultError::Http(e) => VaultError::Http(e),
            other => {
                warn!("session refresh failed: {other}");
                VaultError::AuthRequired
            }
        })?;

        Ok(AuthContext {
            user_id,
            access_token: refreshed.access_token,
        })
    }

    /// Returns true if a session is present and outside the refresh margin.
    pub async fn has_valid_session(&self) -> bool {
        match self.api.current_session().await {
            Some(s) => !s.expires_within_secs(self.refresh_margin_secs),
            None => false,
        }
    }

    /// Clears the session (on logout).
    pub async fn clear(&self) {
        self.api.clear_session().await;
    }
}
