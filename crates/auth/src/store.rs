//! Process-wide, reactively observable authorization state.
//!
//! [`AuthorizationStore`] is the single source of truth for "what can the
//! current session do". It is constructed once at startup and handed (by
//! clone, it is a cheap `Arc` handle) to every component that needs it.
//!
//! ## Notification model
//!
//! - `set_state` / `clear_state` notify every subscriber synchronously, in
//!   subscription order, before returning.
//! - `subscribe` invokes the new callback once with the current state, then
//!   on every later change.
//! - Deliveries are serialized. A mutation issued from inside a callback is
//!   queued and applied after the fan-out in progress finishes; a mutation
//!   from another thread waits until the running fan-out is done. Either way
//!   every subscriber observes each state exactly once, in mutation order.
//! - A subscription cancelled while a fan-out is running is skipped by it
//!   unless its own call has already started.
//! - Callbacks run without the internal lock held, so they may freely call
//!   `get_state`, the permission queries, `subscribe`, or cancel handles.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use crate::authorize::{AuthzError, GateDecision, GateMode, explain};
use crate::{AuthorizationState, Permission, PrincipalId};

type Callback = Arc<dyn Fn(Option<&AuthorizationState>) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

enum Job {
    Replace(Option<Arc<AuthorizationState>>),
    Register(Subscriber),
}

#[derive(Default)]
struct Inner {
    state: Option<Arc<AuthorizationState>>,
    subscribers: Vec<Subscriber>,
    pending: VecDeque<Job>,
    /// Thread currently fanning out notifications, if any.
    deliverer: Option<ThreadId>,
    next_id: u64,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Callbacks never run under this lock, so poisoning can only come
        // from a panic inside our own bookkeeping; the data is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(&self, job: Job) {
        let me = thread::current().id();
        let mut inner = self.lock();

        if inner.deliverer == Some(me) {
            // Re-entrant call from a callback: runs after the current fan-out.
            inner.pending.push_back(job);
            return;
        }

        while inner.deliverer.is_some() {
            inner = self
                .idle
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }

        inner.pending.push_back(job);
        inner.deliverer = Some(me);
        drop(inner);

        let _release = DelivererGuard(self);
        self.deliver_pending();
    }

    fn deliver_pending(&self) {
        loop {
            let (callbacks, state) = {
                let mut inner = self.lock();
                match inner.pending.pop_front() {
                    None => return,
                    Some(Job::Replace(state)) => {
                        inner.state = state.clone();
                        let callbacks: Vec<(u64, Callback)> = inner
                            .subscribers
                            .iter()
                            .map(|s| (s.id, s.callback.clone()))
                            .collect();
                        (callbacks, state)
                    }
                    Some(Job::Register(subscriber)) => {
                        let callback = (subscriber.id, subscriber.callback.clone());
                        inner.subscribers.push(subscriber);
                        (vec![callback], inner.state.clone())
                    }
                }
            };

            for (id, callback) in callbacks {
                // An earlier callback (or another thread) may have cancelled
                // this one since the snapshot was taken.
                if !self.is_subscribed(id) {
                    continue;
                }
                callback(state.as_deref());
            }
        }
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.lock().subscribers.iter().any(|s| s.id == id)
    }

    fn unsubscribe(&self, id: u64) {
        let mut inner = self.lock();
        inner.subscribers.retain(|s| s.id != id);
        inner
            .pending
            .retain(|job| !matches!(job, Job::Register(s) if s.id == id));
    }
}

/// Hands delivery back even if a callback panics, so the store never wedges.
struct DelivererGuard<'a>(&'a Shared);

impl Drop for DelivererGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.deliverer = None;
        drop(inner);
        self.0.idle.notify_all();
    }
}

/// Reactive authorization state store.
///
/// Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct AuthorizationStore {
    shared: Arc<Shared>,
}

impl core::fmt::Debug for AuthorizationStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("AuthorizationStore")
            .field("state", &inner.state)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl AuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the state and notify all subscribers.
    pub fn set_state<I, P>(&self, scopes: I, principal_id: impl Into<PrincipalId>)
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.replace(AuthorizationState::new(scopes, principal_id));
    }

    /// Replace the state with an already-built value.
    pub fn replace(&self, state: AuthorizationState) {
        tracing::debug!(
            principal_id = %state.principal_id(),
            scopes = state.scopes().len(),
            "authorization state set"
        );
        self.shared.submit(Job::Replace(Some(Arc::new(state))));
    }

    /// Drop the state. Clearing an absent state still notifies (with `None`).
    pub fn clear_state(&self) {
        tracing::debug!("authorization state cleared");
        self.shared.submit(Job::Replace(None));
    }

    /// Current snapshot; `None` when there is no session.
    pub fn get_state(&self) -> Option<Arc<AuthorizationState>> {
        self.shared.lock().state.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.lock().state.is_some()
    }

    /// Register `callback`; it is called immediately with the current state
    /// and then on every change until the returned handle is cancelled.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&AuthorizationState>) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.shared.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            id
        };

        self.shared.submit(Job::Register(Subscriber {
            id,
            callback: Arc::new(callback),
        }));

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
            active: true,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    pub fn has_permission(&self, scope: &str) -> bool {
        self.get_state()
            .is_some_and(|state| state.has_permission(scope))
    }

    /// `false` when absent or when `scopes` is empty.
    pub fn has_any_permission<I, S>(&self, scopes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_state()
            .is_some_and(|state| state.has_any_permission(scopes))
    }

    /// `false` when absent; `true` for an empty requirement list otherwise.
    pub fn has_all_permissions<I, S>(&self, scopes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_state()
            .is_some_and(|state| state.has_all_permissions(scopes))
    }

    /// `Result` flavor of [`has_permission`](Self::has_permission).
    pub fn require(&self, scope: &str) -> Result<(), AuthzError> {
        match self.get_state() {
            None => Err(AuthzError::Unauthenticated),
            Some(state) if state.has_permission(scope) => Ok(()),
            Some(_) => Err(AuthzError::Forbidden(scope.to_string())),
        }
    }

    /// Explain how `required` evaluates against the current state.
    pub fn explain(&self, required: &[Permission], mode: GateMode) -> GateDecision {
        explain(self.get_state().as_deref(), required, mode)
    }
}

/// Handle for a registered subscriber.
///
/// Dropping the handle cancels the subscription. Use [`detach`](Self::detach)
/// to keep the callback registered for the lifetime of the store.
#[must_use = "dropping a Subscription cancels it; call `detach` to keep it"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(mut self) {
        self.release();
    }

    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(shared) = self.shared.upgrade() {
            shared.unsubscribe(self.id);
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
