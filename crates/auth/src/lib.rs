//! `timeclock-auth`: session authorization state for the admin console.
//!
//! Pure and I/O-free: scopes, the reactive [`AuthorizationStore`], claim
//! extraction for session bootstrap, and the permission-gated view bindings
//! built on top of the store.

pub mod authorize;
pub mod claims;
pub mod gate;
pub mod permissions;
pub mod principal;
pub mod state;
pub mod store;

pub use authorize::{AuthzError, DenialKind, GateDecision, GateMode, explain};
pub use claims::{ClaimsError, SessionClaims, decode_unverified};
pub use gate::{
    GateTarget, Interactivity, PermissionGate, Visibility, bind_interactivity, bind_visibility,
};
pub use permissions::Permission;
pub use principal::PrincipalId;
pub use state::AuthorizationState;
pub use store::{AuthorizationStore, Subscription};
