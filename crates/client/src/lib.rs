//! `timeclock-client`: request pipeline for the timeclock admin console.
//!
//! **Responsibility:** issue API requests on behalf of the signed-in session
//! and keep that session alive.
//!
//! - [`RefreshCoordinator`]: one refresh at a time, replay for every request
//!   that hit an expired credential
//! - [`Session`]: bootstrap from the stored token, login, logout
//! - [`Transport`] / [`CredentialStore`] / [`Navigator`]: seams to the HTTP
//!   stack, device storage and the router

pub mod config;
pub mod credentials;
pub mod error;
pub mod navigation;
pub mod refresh;
pub mod request;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ClientError, RefreshError, TransportError};
pub use navigation::{Navigator, TracingNavigator};
pub use refresh::{RefreshCoordinator, RefreshListener};
pub use request::{ApiRequest, ApiResponse};
pub use session::Session;
pub use transport::{ReqwestTransport, Transport};
