use serde::Serialize;
use thiserror::Error;

use crate::{AuthorizationState, Permission, PrincipalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("no authenticated session")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// How a list of required scopes is combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// At least one required scope must be granted.
    Any,
    /// Every required scope must be granted.
    #[default]
    All,
}

impl GateMode {
    /// Evaluate `required` against `state`.
    ///
    /// No session always denies, regardless of mode or of `required` being
    /// empty.
    pub fn evaluate(self, state: Option<&AuthorizationState>, required: &[Permission]) -> bool {
        let Some(state) = state else {
            return false;
        };
        match self {
            GateMode::Any => state.has_any_permission(required),
            GateMode::All => state.has_all_permissions(required),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation (debugging gated UI)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of a gate evaluation.
///
/// Answers "why is this button disabled?" without re-deriving anything at
/// the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub mode: GateMode,
    pub granted: bool,
    /// `None` when there is no session.
    pub principal_id: Option<PrincipalId>,
    /// Required scopes the session holds.
    pub matched: Vec<String>,
    /// Required scopes the session lacks (all of them when absent).
    pub missing: Vec<String>,
    pub denial: Option<DenialKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NoSession,
    MissingPermission,
    /// `Any` mode with an empty candidate list.
    NothingToMatch,
}

/// Explain how `required` evaluates under `mode` against `state`.
pub fn explain(
    state: Option<&AuthorizationState>,
    required: &[Permission],
    mode: GateMode,
) -> GateDecision {
    let granted = mode.evaluate(state, required);

    let Some(state) = state else {
        return GateDecision {
            mode,
            granted,
            principal_id: None,
            matched: Vec::new(),
            missing: required.iter().map(|p| p.as_str().to_string()).collect(),
            denial: Some(DenialKind::NoSession),
        };
    };

    let (matched, missing): (Vec<&Permission>, Vec<&Permission>) = required
        .iter()
        .partition(|p| state.has_permission(p.as_str()));

    let denial = if granted {
        None
    } else if required.is_empty() {
        Some(DenialKind::NothingToMatch)
    } else {
        Some(DenialKind::MissingPermission)
    };

    GateDecision {
        mode,
        granted,
        principal_id: Some(state.principal_id().clone()),
        matched: matched.iter().map(|p| p.as_str().to_string()).collect(),
        missing: missing.iter().map(|p| p.as_str().to_string()).collect(),
        denial,
    }
}
