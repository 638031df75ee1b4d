use thiserror::Error;

use timeclock_auth::ClaimsError;

/// The request never produced a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Terminal outcome of a failed refresh cycle.
///
/// `Clone` so a single outcome can be handed to every waiter of the cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh response did not contain a usable token: {0}")]
    MalformedResponse(String),

    /// The task driving the refresh was dropped before it resolved.
    #[error("refresh was interrupted before completing")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("session refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("login rejected with status {status}")]
    Login { status: u16 },

    #[error("login response did not contain a usable token: {0}")]
    LoginResponse(String),

    #[error(transparent)]
    Claims(#[from] ClaimsError),

    #[error("credential cannot be sent as an Authorization header")]
    InvalidCredential,
}

impl ClientError {
    /// The session is gone and the user has been sent back to sign in.
    pub fn is_session_terminated(&self) -> bool {
        matches!(self, ClientError::Refresh(err) if *err != RefreshError::Interrupted)
    }
}
