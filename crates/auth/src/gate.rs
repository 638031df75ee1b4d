//! Permission-gated view bindings.
//!
//! Two flavors, both driven by an [`AuthorizationStore`] subscription:
//!
//! - [`bind_visibility`]: show or remove bound content.
//! - [`bind_interactivity`]: keep content visible but disable it.
//!
//! Both re-evaluate on every store notification (no caching across state
//! changes) and deny when there is no session.

use std::sync::Arc;

use crate::authorize::{GateMode, explain};
use crate::store::{AuthorizationStore, Subscription};
use crate::{AuthorizationState, Permission};

/// Scopes a piece of UI requires, and how they combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGate {
    required: Arc<[Permission]>,
    mode: GateMode,
}

impl PermissionGate {
    pub fn new<I, P>(required: I, mode: GateMode) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            mode,
        }
    }

    pub fn any<I, P>(required: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self::new(required, GateMode::Any)
    }

    pub fn all<I, P>(required: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self::new(required, GateMode::All)
    }

    pub fn required(&self) -> &[Permission] {
        &self.required
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn allows(&self, state: Option<&AuthorizationState>) -> bool {
        self.mode.evaluate(state, &self.required)
    }
}

/// Structural presence of gated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Removed,
}

impl Visibility {
    pub fn is_shown(self) -> bool {
        self == Visibility::Shown
    }
}

/// Interactivity of gated content that stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interactivity {
    Enabled,
    /// Rendered with the `disabled` attribute and non-interactive styling.
    Disabled,
}

impl Interactivity {
    /// CSS class applied to disabled controls.
    pub const DISABLED_CLASS: &'static str = "permission-disabled";

    pub fn is_disabled(self) -> bool {
        self == Interactivity::Disabled
    }

    /// Value for the element's `disabled` attribute, if it should carry one.
    pub fn disabled_attribute(self) -> Option<&'static str> {
        self.is_disabled().then_some("disabled")
    }

    pub fn css_class(self) -> Option<&'static str> {
        self.is_disabled().then_some(Self::DISABLED_CLASS)
    }
}

/// Something a binding drives (a DOM node, a widget, a test probe).
pub trait GateTarget<V>: Send + Sync + 'static {
    fn apply(&self, value: V);
}

impl<V, F> GateTarget<V> for F
where
    F: Fn(V) + Send + Sync + 'static,
{
    fn apply(&self, value: V) {
        self(value)
    }
}

/// Show `target` while `gate` allows, remove it otherwise.
///
/// `target` is driven immediately with the current state and again on every
/// store change until the returned subscription is dropped.
pub fn bind_visibility<T>(store: &AuthorizationStore, gate: PermissionGate, target: T) -> Subscription
where
    T: GateTarget<Visibility>,
{
    store.subscribe(move |state| {
        let visibility = if gate.allows(state) {
            Visibility::Shown
        } else {
            Visibility::Removed
        };
        trace_decision(&gate, state, "visibility");
        target.apply(visibility);
    })
}

/// Enable `target` while `gate` allows, disable it otherwise.
pub fn bind_interactivity<T>(store: &AuthorizationStore, gate: PermissionGate, target: T) -> Subscription
where
    T: GateTarget<Interactivity>,
{
    store.subscribe(move |state| {
        let interactivity = if gate.allows(state) {
            Interactivity::Enabled
        } else {
            Interactivity::Disabled
        };
        trace_decision(&gate, state, "interactivity");
        target.apply(interactivity);
    })
}

fn trace_decision(gate: &PermissionGate, state: Option<&AuthorizationState>, binding: &'static str) {
    if tracing::enabled!(tracing::Level::TRACE) {
        let decision = explain(state, gate.required(), gate.mode());
        tracing::trace!(
            binding,
            granted = decision.granted,
            missing = ?decision.missing,
            "gate re-evaluated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    fn probe<V: Copy + Send + 'static>() -> (Arc<Mutex<Vec<V>>>, impl Fn(V) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v| sink.lock().unwrap().push(v))
    }

    #[test]
    fn visibility_follows_state_changes() {
        let store = AuthorizationStore::new();
        let (seen, target) = probe::<Visibility>();
        let _binding = bind_visibility(&store, PermissionGate::all(["employee.delete"]), target);

        store.set_state(["employee.delete"], "B-1");
        store.set_state(["employee.read"], "B-1");
        store.clear_state();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Visibility::Removed,
                Visibility::Shown,
                Visibility::Removed,
                Visibility::Removed
            ]
        );
    }

    #[test]
    fn any_mode_needs_one_match() {
        let store = AuthorizationStore::new();
        store.set_state(["holiday.update"], "B-1");

        let (seen, target) = probe::<Visibility>();
        let _binding = bind_visibility(
            &store,
            PermissionGate::any(["holiday.create", "holiday.update"]),
            target,
        );

        assert_eq!(*seen.lock().unwrap(), vec![Visibility::Shown]);
    }

    #[test]
    fn disablement_keeps_content_and_marks_it() {
        let store = AuthorizationStore::new();
        let (seen, target) = probe::<Interactivity>();
        let _binding = bind_interactivity(&store, PermissionGate::all(["user.update"]), target);

        store.set_state(["user.update"], "B-1");

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![Interactivity::Disabled, Interactivity::Enabled]);
        assert_eq!(seen[0].disabled_attribute(), Some("disabled"));
        assert_eq!(seen[0].css_class(), Some(Interactivity::DISABLED_CLASS));
        assert_eq!(seen[1].disabled_attribute(), None);
    }

    #[test]
    fn no_session_is_treated_like_missing_scope() {
        let gate = PermissionGate::all(Vec::<Permission>::new());
        assert!(!gate.allows(None));

        let state = AuthorizationState::new(Vec::<Permission>::new(), "B-1");
        assert!(gate.allows(Some(&state)));
    }

    #[test]
    fn dropped_binding_stops_updating() {
        let store = AuthorizationStore::new();
        let (seen, target) = probe::<Visibility>();
        let binding = bind_visibility(&store, PermissionGate::all(["role.read"]), target);
        drop(binding);

        store.set_state(["role.read"], "B-1");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
