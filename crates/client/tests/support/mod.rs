#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use timeclock_auth::AuthorizationStore;
use timeclock_client::{
    ApiRequest, ApiResponse, ClientConfig, CredentialStore, MemoryCredentialStore, Navigator, RefreshCoordinator,
    Transport, TransportError,
};

pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGIN_PATH: &str = "/auth/login";

/// Any request to this path is rejected with 401, whatever it carries.
pub const ALWAYS_UNAUTHORIZED: &str = "/always-401";
/// Any request to this path gets a 404.
pub const MISSING: &str = "/missing";

/// What the fake server answers to the refresh call.
#[derive(Debug, Clone)]
pub enum RefreshReply {
    /// 200 with `{"token": ..}`; the token becomes the one the server accepts.
    Token(String),
    Status(u16),
    /// 200 with a body that carries no token.
    Malformed,
}

/// In-memory API server.
///
/// Resource requests succeed only when their bearer token is the currently
/// valid one. With `hold_refresh`, the refresh call blocks until
/// [`ScriptedTransport::release_refresh`] is called, keeping a cycle open
/// while a test piles requests onto it.
pub struct ScriptedTransport {
    valid_token: Mutex<String>,
    refresh_replies: Mutex<VecDeque<RefreshReply>>,
    login_reply: Mutex<(u16, Value)>,
    refresh_gate: Semaphore,
    log: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(valid_token: &str, replies: impl IntoIterator<Item = RefreshReply>, hold_refresh: bool) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh_replies: Mutex::new(replies.into_iter().collect()),
            login_reply: Mutex::new((401, json!({ "error": "invalid credentials" }))),
            refresh_gate: Semaphore::new(if hold_refresh { 0 } else { Semaphore::MAX_PERMITS }),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn release_refresh(&self) {
        self.refresh_gate.add_permits(1);
    }

    pub fn set_login_reply(&self, status: u16, body: Value) {
        *self.login_reply.lock().unwrap() = (status, body);
    }

    /// Server-side expiry: nothing presented from now on is accepted.
    pub fn expire_all(&self) {
        *self.valid_token.lock().unwrap() = "<expired>".to_string();
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    /// Requests whose path, ignoring any query string, is `route`.
    pub fn requests_on_route(&self, route: &str) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.route() == route).collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.requests_on_route(REFRESH_PATH).len()
    }

    async fn refresh(&self) -> ApiResponse {
        let permit = self.refresh_gate.acquire().await.unwrap();
        permit.forget();

        let reply = {
            let mut replies = self.refresh_replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };

        match reply.unwrap_or(RefreshReply::Status(401)) {
            RefreshReply::Token(token) => {
                *self.valid_token.lock().unwrap() = token.clone();
                ApiResponse::new(StatusCode::OK).with_json(&json!({ "token": token }))
            }
            RefreshReply::Status(status) => ApiResponse::new(StatusCode::from_u16(status).unwrap()),
            RefreshReply::Malformed => ApiResponse::new(StatusCode::OK).with_json(&json!({ "ok": true })),
        }
    }

    fn resource(&self, request: &ApiRequest) -> ApiResponse {
        if request.path == MISSING {
            return ApiResponse::new(StatusCode::NOT_FOUND);
        }
        let valid = self.valid_token.lock().unwrap().clone();
        if request.path == ALWAYS_UNAUTHORIZED || request.bearer_token() != Some(valid.as_str()) {
            return ApiResponse::new(StatusCode::UNAUTHORIZED);
        }
        ApiResponse::new(StatusCode::OK).with_json(&json!({ "path": request.path, "body": request.body }))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.log.lock().unwrap().push(request.clone());
        // Let other callers interleave, like a real network hop would.
        tokio::task::yield_now().await;

        match request.route() {
            REFRESH_PATH => Ok(self.refresh().await),
            LOGIN_PATH => {
                let (status, body) = self.login_reply.lock().unwrap().clone();
                Ok(ApiResponse::new(StatusCode::from_u16(status).unwrap()).with_json(&body))
            }
            _ => Ok(self.resource(request)),
        }
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

pub struct Harness {
    pub config: ClientConfig,
    pub transport: Arc<ScriptedTransport>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub authz: AuthorizationStore,
    pub navigator: Arc<RecordingNavigator>,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl Harness {
    pub fn new(stored: Option<&str>, transport: ScriptedTransport) -> Self {
        let config = ClientConfig::default();
        let transport = Arc::new(transport);
        let credentials = Arc::new(match stored {
            Some(token) => MemoryCredentialStore::with_token(token),
            None => MemoryCredentialStore::new(),
        });
        let authz = AuthorizationStore::new();
        let navigator = Arc::new(RecordingNavigator::default());

        let coordinator = Arc::new(RefreshCoordinator::new(
            &config,
            transport.clone(),
            credentials.clone(),
            authz.clone(),
            navigator.clone(),
        ));

        Self {
            config,
            transport,
            credentials,
            authz,
            navigator,
            coordinator,
        }
    }

    pub fn stored(&self) -> Option<String> {
        self.credentials.load()
    }

    /// Wait until `n` callers are parked behind the cycle's leader, then let
    /// the refresh call answer.
    pub async fn release_after_waiters(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.coordinator.pending_waiters() < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("waiters never joined the refresh cycle");
        self.transport.release_refresh();
    }
}

pub fn authed(request: ApiRequest, token: &str) -> ApiRequest {
    request.with_bearer(token).unwrap()
}

/// Unsigned JWT-shaped token carrying `payload` as its claims.
pub fn jwt(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}
