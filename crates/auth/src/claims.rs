//! Session claims read from a bearer token at bootstrap.
//!
//! The console reads scopes and principal out of the persisted token once at
//! startup (and again after login/refresh) so the UI can gate itself before
//! the first request. The signature is NOT verified here: the server
//! re-validates the token on every request, and this crate only uses the
//! claims to decide what to render.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::{AuthorizationState, Permission, PrincipalId};

/// Claims the console cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject / badge identifier.
    pub principal_id: PrincipalId,

    /// Granted scopes.
    pub scopes: Vec<Permission>,

    /// Expiration timestamp, if the token carries one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionClaims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    pub fn into_state(self) -> AuthorizationState {
        AuthorizationState::new(self.scopes, self.principal_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Encoding(String),

    #[error("token payload is not valid claims JSON: {0}")]
    Payload(String),

    #[error("token has no subject")]
    MissingSubject,
}

/// Wire shape of the payload; tolerant of the few spellings the backend has
/// used for the same fields.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(alias = "badge")]
    sub: Option<String>,

    #[serde(default, alias = "permissions")]
    scopes: Vec<String>,

    /// OAuth-style space-delimited scope string.
    #[serde(default)]
    scope: Option<String>,

    #[serde(default)]
    exp: Option<i64>,
}

/// Extract session claims from `token` without verifying its signature.
pub fn decode_unverified(token: &str) -> Result<SessionClaims, ClaimsError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    // Some issuers keep the padding; URL_SAFE_NO_PAD rejects it.
    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ClaimsError::Encoding(e.to_string()))?;

    let raw: RawClaims =
        serde_json::from_slice(&payload).map_err(|e| ClaimsError::Payload(e.to_string()))?;

    let principal_id = raw
        .sub
        .filter(|s| !s.trim().is_empty())
        .map(PrincipalId::new)
        .ok_or(ClaimsError::MissingSubject)?;

    let mut scopes: Vec<Permission> = raw.scopes.into_iter().map(Permission::from).collect();
    if let Some(scope) = raw.scope {
        scopes.extend(scope.split_whitespace().map(|s| Permission::from(s.to_string())));
    }

    let expires_at = raw.exp.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Ok(SessionClaims {
        principal_id,
        scopes,
        expires_at,
    })
}
