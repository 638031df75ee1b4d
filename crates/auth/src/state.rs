//! Authorization state of the current session.

use std::collections::HashSet;

use crate::{Permission, PrincipalId};

/// Scopes granted to the current session plus its principal.
///
/// A value of this type is always fully populated. "No session" is modeled
/// as `Option::<AuthorizationState>::None` by the store, never as an empty
/// principal or a half-built state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationState {
    scopes: HashSet<Permission>,
    principal_id: PrincipalId,
}

impl AuthorizationState {
    pub fn new<I, P>(scopes: I, principal_id: impl Into<PrincipalId>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            principal_id: principal_id.into(),
        }
    }

    pub fn scopes(&self) -> &HashSet<Permission> {
        &self.scopes
    }

    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    pub fn has_permission(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// `false` for an empty candidate list: nothing can match.
    pub fn has_any_permission<I, S>(&self, scopes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        scopes.into_iter().any(|s| self.has_permission(s.as_ref()))
    }

    /// `true` for an empty requirement list (vacuous truth).
    pub fn has_all_permissions<I, S>(&self, scopes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        scopes.into_iter().all(|s| self.has_permission(s.as_ref()))
    }

    /// Scopes sorted for stable display/logging.
    pub fn sorted_scopes(&self) -> Vec<&str> {
        let mut scopes: Vec<&str> = self.scopes.iter().map(Permission::as_str).collect();
        scopes.sort_unstable();
        scopes
    }
}
