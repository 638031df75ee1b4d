//! Session entry points: bootstrap, login, logout, and the request path.
//!
//! [`Session`] owns the one [`RefreshCoordinator`] of the process and wires
//! it to the shared [`AuthorizationStore`] and credential persistence. Build
//! it once at startup and hand out `Arc<Session>`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use timeclock_auth::{AuthorizationState, AuthorizationStore, decode_unverified};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::ClientError;
use crate::navigation::Navigator;
use crate::refresh::{RefreshCoordinator, RefreshListener, extract_token};
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::Transport;

/// Re-derives the authorization state from each refreshed token.
///
/// Tokens whose claims cannot be read leave the current state in place; the
/// server remains the authority either way.
struct ClaimsStateSync {
    authz: AuthorizationStore,
}

impl RefreshListener for ClaimsStateSync {
    fn credential_refreshed(&self, token: &str) {
        match decode_unverified(token) {
            Ok(claims) => self.authz.replace(claims.into_state()),
            Err(err) => {
                tracing::debug!(error = %err, "refreshed token has no readable claims; keeping state")
            }
        }
    }
}

pub struct Session {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    authz: AuthorizationStore,
    coordinator: RefreshCoordinator,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("authz", &self.authz)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        authz: AuthorizationStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(
            &config,
            transport.clone(),
            credentials.clone(),
            authz.clone(),
            navigator,
        )
        .with_listener(Arc::new(ClaimsStateSync {
            authz: authz.clone(),
        }));

        Self {
            config,
            transport,
            credentials,
            authz,
            coordinator,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn authorization(&self) -> &AuthorizationStore {
        &self.authz
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.load().is_some()
    }

    /// Restore the session from the persisted credential.
    ///
    /// A token whose claims cannot be read is discarded and the store is left
    /// absent. An expired token is kept: the first request will refresh it.
    pub fn bootstrap(&self) -> Option<Arc<AuthorizationState>> {
        let Some(token) = self.credentials.load() else {
            tracing::debug!("no stored credential; starting unauthenticated");
            self.authz.clear_state();
            return None;
        };

        match decode_unverified(&token) {
            Ok(claims) => {
                if claims.is_expired(Utc::now()) {
                    tracing::info!(principal_id = %claims.principal_id, "stored credential has expired; it will be refreshed on first use");
                }
                self.authz.replace(claims.into_state());
                self.authz.get_state()
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored credential is unreadable; discarding it");
                self.credentials.clear();
                self.authz.clear_state();
                None
            }
        }
    }

    /// Exchange user credentials for a bearer token and start a session.
    ///
    /// Goes straight to the transport: a 401 here means "wrong password",
    /// never "refresh and retry".
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<Arc<AuthorizationState>, ClientError> {
        let request = ApiRequest::post(self.config.login_path.clone())
            .with_json(json!({ "username": identifier, "password": secret }));

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            tracing::info!(status = response.status.as_u16(), "login rejected");
            return Err(ClientError::Login {
                status: response.status.as_u16(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .map_err(|e| ClientError::LoginResponse(e.to_string()))?;
        let token = extract_token(&body, &self.config.token_field).map_err(ClientError::LoginResponse)?;
        let claims = decode_unverified(&token)?;

        self.credentials.save(&token);
        let principal_id = claims.principal_id.clone();
        let state = Arc::new(claims.into_state());
        self.authz.replace((*state).clone());

        tracing::info!(%principal_id, scopes = state.scopes().len(), "signed in");
        Ok(state)
    }

    /// End the session locally: discard the credential and clear the store.
    pub fn logout(&self) {
        self.credentials.clear();
        self.authz.clear_state();
        tracing::info!("signed out");
    }

    /// Issue an application request.
    ///
    /// Attaches the held credential when the request carries no
    /// `Authorization` header, then routes through the refresh coordinator.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let request = match self.credentials.load() {
            Some(token) if !request.has_authorization() => request
                .with_bearer(&token)
                .map_err(|_| ClientError::InvalidCredential)?,
            _ => request,
        };

        self.coordinator.execute(&request).await
    }
}
