//! Single-flight credential refresh with replay.
//!
//! [`RefreshCoordinator`] sits behind every outgoing request. When a request
//! comes back `401` and a credential is held:
//!
//! - if no refresh cycle is running, the caller becomes the cycle's leader
//!   and issues the one refresh call;
//! - otherwise it joins the running cycle as a waiter.
//!
//! When the cycle resolves, the new credential is persisted and every caller
//! replays its own request once with the new bearer token. If the refresh
//! fails the session is torn down (state cleared, credential discarded, one
//! navigation to the unauthenticated route) and every caller gets the
//! refresh error.
//!
//! ## Invariants
//!
//! - At most one refresh call in flight at any instant. "Is a cycle
//!   running?" and "start a cycle" happen under one lock, with no await in
//!   between.
//! - Waiters are released only after the cycle has resolved, and only after
//!   the coordinator is back to idle.
//! - Requests to the refresh endpoint itself are never intercepted.
//! - Successful (and non-401) responses are returned untouched.
//! - A replayed request is not retried again, whatever its outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::header::HeaderValue;
use serde_json::Value;
use tokio::sync::watch;

use timeclock_auth::AuthorizationStore;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, RefreshError};
use crate::navigation::Navigator;
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::Transport;

type Outcome = Result<String, RefreshError>;

/// Notified after a refreshed credential has been persisted, before waiters
/// are released.
pub trait RefreshListener: Send + Sync {
    fn credential_refreshed(&self, token: &str);
}

/// The in-flight cycle: a receiver for waiters to clone, and how many have.
struct Cycle {
    outcome: watch::Receiver<Option<Outcome>>,
    waiters: usize,
}

enum Role {
    Leader(watch::Sender<Option<Outcome>>),
    Waiter(watch::Receiver<Option<Outcome>>),
}

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    authz: AuthorizationStore,
    navigator: Arc<dyn Navigator>,
    listener: Option<Arc<dyn RefreshListener>>,
    refresh_path: String,
    unauthenticated_route: String,
    token_field: String,
    /// `Some` while a cycle is in flight.
    cycle: Mutex<Option<Cycle>>,
}

impl core::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_path", &self.refresh_path)
            .field("unauthenticated_route", &self.unauthenticated_route)
            .field("in_flight", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        authz: AuthorizationStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            credentials,
            authz,
            navigator,
            listener: None,
            refresh_path: config.refresh_path.clone(),
            unauthenticated_route: config.unauthenticated_route.clone(),
            token_field: config.token_field.clone(),
            cycle: Mutex::new(None),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn RefreshListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Whether a refresh cycle is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock_cycle().is_some()
    }

    /// Callers parked on the in-flight cycle, not counting its leader.
    pub fn pending_waiters(&self) -> usize {
        self.lock_cycle().as_ref().map_or(0, |c| c.waiters)
    }

    pub fn is_refresh_request(&self, request: &ApiRequest) -> bool {
        request.route() == self.refresh_path
    }

    /// Send `request`, transparently recovering from an expired credential.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.transport.send(request).await?;
        self.recover(request, response).await
    }

    /// Apply the refresh protocol to a response already obtained for
    /// `request`.
    pub async fn recover(
        &self,
        request: &ApiRequest,
        response: ApiResponse,
    ) -> Result<ApiResponse, ClientError> {
        if !response.is_unauthorized() {
            return Ok(response);
        }

        if self.is_refresh_request(request) {
            tracing::debug!(request_id = %request.id(), "refresh endpoint returned 401; not intercepting");
            return Ok(response);
        }

        if self.credentials.load().is_none() {
            tracing::debug!(request_id = %request.id(), "401 without a held credential; passing through");
            return Ok(response);
        }

        let token = self.refreshed_credential(request).await?;

        let replay = request
            .with_bearer(&token)
            .map_err(|_| ClientError::InvalidCredential)?;

        tracing::debug!(
            request_id = %request.id(),
            method = %request.method,
            path = %request.path,
            "replaying request with refreshed credential"
        );

        Ok(self.transport.send(&replay).await?)
    }

    /// Join the running cycle or start one, and wait for its outcome.
    async fn refreshed_credential(&self, request: &ApiRequest) -> Result<String, RefreshError> {
        match self.join_or_start() {
            Role::Leader(tx) => {
                tracing::info!(request_id = %request.id(), "credential rejected; starting refresh");
                self.lead(tx).await
            }
            Role::Waiter(mut rx) => {
                tracing::debug!(request_id = %request.id(), "credential rejected; joining refresh in flight");
                match rx.wait_for(Option::is_some).await {
                    Ok(outcome) => (*outcome).clone().unwrap_or(Err(RefreshError::Interrupted)),
                    Err(_) => Err(RefreshError::Interrupted),
                }
            }
        }
    }

    fn join_or_start(&self) -> Role {
        let mut cycle = self.lock_cycle();
        if let Some(running) = cycle.as_mut() {
            running.waiters += 1;
            return Role::Waiter(running.outcome.clone());
        }
        let (tx, rx) = watch::channel(None);
        *cycle = Some(Cycle {
            outcome: rx,
            waiters: 0,
        });
        Role::Leader(tx)
    }

    async fn lead(&self, tx: watch::Sender<Option<Outcome>>) -> Outcome {
        let cycle = CycleGuard { coordinator: self };

        let outcome = self.request_new_credential().await;

        match &outcome {
            Ok(token) => {
                self.credentials.save(token);
                if let Some(listener) = &self.listener {
                    listener.credential_refreshed(token);
                }
                let waiters = cycle.finish();
                tracing::info!(waiters, "credential refreshed; releasing waiters");
            }
            Err(err) => {
                tracing::warn!(error = %err, "credential refresh failed; ending session");
                // Tear down before going idle: a 401 landing in between must
                // see "no credential" and pass through, not start a new cycle.
                self.authz.clear_state();
                self.credentials.clear();
                let waiters = cycle.finish();
                tracing::debug!(waiters, "failing waiters");
                self.navigator.navigate(&self.unauthenticated_route);
            }
        }

        // Waiters hold their own receivers; nobody listening is fine.
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    async fn request_new_credential(&self) -> Outcome {
        let mut request = ApiRequest::post(self.refresh_path.clone());
        if let Some(current) = self.credentials.load() {
            if let Ok(with_current) = request.with_bearer(&current) {
                request = with_current;
            }
        }

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;

        extract_token(&body, &self.token_field).map_err(RefreshError::MalformedResponse)
    }

    fn lock_cycle(&self) -> MutexGuard<'_, Option<Cycle>> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to idle when the leader finishes or is dropped
/// mid-refresh. In the latter case the sender is dropped too and waiters
/// resolve with [`RefreshError::Interrupted`].
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
}

impl CycleGuard<'_> {
    /// Back to idle; returns how many waiters the cycle collected.
    fn finish(self) -> usize {
        self.coordinator
            .lock_cycle()
            .take()
            .map_or(0, |c| c.waiters)
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.lock_cycle().take();
    }
}

/// Pull a non-blank, header-safe token out of a login/refresh response body.
///
/// The token is opaque: it is returned exactly as the server sent it.
pub(crate) fn extract_token(body: &Value, field: &str) -> Result<String, String> {
    let token = body
        .get(field)
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| format!("missing string field '{field}'"))?;

    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| "token contains characters not allowed in a header".to_string())?;

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn extracts_token_field() {
        assert_eq!(
            extract_token(&json!({ "token": "abc.DEF-_~+/=" }), "token"),
            Ok("abc.DEF-_~+/=".to_string())
        );
        assert_eq!(
            extract_token(&json!({ "access_token": "xyz" }), "access_token"),
            Ok("xyz".to_string())
        );
    }

    #[test]
    fn token_is_kept_verbatim() {
        assert_eq!(
            extract_token(&json!({ "token": "opaque token " }), "token"),
            Ok("opaque token ".to_string())
        );
    }

    #[test]
    fn rejects_missing_or_unusable_tokens() {
        assert!(extract_token(&json!({}), "token").is_err());
        assert!(extract_token(&json!({ "token": "" }), "token").is_err());
        assert!(extract_token(&json!({ "token": "   " }), "token").is_err());
        assert!(extract_token(&json!({ "token": 42 }), "token").is_err());
        assert!(extract_token(&json!({ "token": "a\nb" }), "token").is_err());
    }
}
