//! Per-caller sessions.
//!
//! # Lifecycle
//!
//! ```text
//!        new()                      expire() / expiry passed / registry
//!   ─────────────► Active ─────────────────────────────────────────► Expired
//!                    │  ▲                                              (final)
//!                    └──┘ extend(d)
//! ```
//!
//! Expiry is detected lazily, by the next call that looks at it. Once
//! expired, a session refuses every data-plane call, delivers no more
//! notifications and fires its expiration listeners exactly once.
//!
//! # Two-Phase Authorization
//!
//! Every data-plane call first asks the [`PreAuthorizer`]. A definitive
//! denial fails before the twin is touched. An undecided answer is settled
//! inside the twin command, once the target's model is known. A caller
//! therefore never learns whether a forbidden element exists.

mod guard;
mod listeners;
mod resources;
mod snapshots;

pub use listeners::{Listeners, NotificationCallback};

pub(crate) use guard::AccessGuard;

use crate::{ActivityChecker, SessionError};
use chrono::{DateTime, Duration, Utc};
use gantry_auth::{Authorizer, PreAuthorizer};
use gantry_event::ResourceNotification;
use gantry_twin::TwinExecutor;
use gantry_types::{SessionId, SubscriptionId, UserInfo};
use listeners::ListenerTable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Callback run once when a session expires.
pub type ExpirationListener = Box<dyn FnOnce(&Session) + Send>;

/// An authorized handle onto the twin for one user.
///
/// Data-plane methods are `async`: they queue a command on the twin
/// executor and wait for it. Listener and expiry methods are synchronous.
pub struct Session {
    id: SessionId,
    user: UserInfo,
    authorizer: Arc<dyn Authorizer>,
    pre_authorizer: Arc<dyn PreAuthorizer>,
    guard: AccessGuard,
    executor: Arc<dyn TwinExecutor>,
    activity_checker: Option<Arc<dyn ActivityChecker>>,
    state: Mutex<SessionState>,
}

struct SessionState {
    /// `None` means the session never expires.
    expiry: Option<DateTime<Utc>>,
    expired: bool,
    listeners: ListenerTable,
    on_expired: Vec<ExpirationListener>,
}

impl SessionState {
    /// Moves to the expired state, handing back the listeners to fire.
    fn mark_expired(&mut self) -> Vec<ExpirationListener> {
        self.expired = true;
        self.listeners.clear();
        std::mem::take(&mut self.on_expired)
    }

    fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|at| at <= now)
    }
}

impl Session {
    /// Creates a session that never expires.
    #[must_use]
    pub fn new(
        user: UserInfo,
        authorizer: Arc<dyn Authorizer>,
        pre_authorizer: Arc<dyn PreAuthorizer>,
        executor: Arc<dyn TwinExecutor>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            guard: AccessGuard::new(user.user_id(), Arc::clone(&authorizer)),
            user,
            authorizer,
            pre_authorizer,
            executor,
            activity_checker: None,
            state: Mutex::new(SessionState {
                expiry: None,
                expired: false,
                listeners: ListenerTable::default(),
                on_expired: Vec::new(),
            }),
        }
    }

    /// Sets the session to expire `lifetime` from now. `None` keeps it unlimited.
    #[must_use]
    pub fn with_lifetime(self, lifetime: Option<Duration>) -> Self {
        self.state.lock().expiry = lifetime.and_then(|d| Utc::now().checked_add_signed(d));
        self
    }

    /// Attaches the checker consulted by the registry's activity monitor.
    #[must_use]
    pub fn with_activity_checker(mut self, checker: Arc<dyn ActivityChecker>) -> Self {
        self.activity_checker = Some(checker);
        self
    }

    /// Returns the session id.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Returns the user this session acts for.
    #[must_use]
    pub fn user_info(&self) -> &UserInfo {
        &self.user
    }

    pub(crate) fn activity_checker(&self) -> Option<&Arc<dyn ActivityChecker>> {
        self.activity_checker.as_ref()
    }

    // === Expiry ===

    /// Returns `true` once the session has expired. Detecting a passed
    /// expiry here performs the transition.
    pub fn is_expired(&self) -> bool {
        let fired = {
            let mut state = self.state.lock();
            if state.expired {
                return true;
            }
            if !state.is_past_expiry(Utc::now()) {
                return false;
            }
            state.mark_expired()
        };
        debug!(session = %self.id, user = %self.user, "Session reached its expiry");
        self.fire_expiration_listeners(fired);
        true
    }

    /// Instant the session expires at. `None` if it already expired or
    /// never expires.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        if self.is_expired() {
            return None;
        }
        self.state.lock().expiry
    }

    /// Pushes the expiry to `duration` from now. An unlimited session
    /// stays unlimited.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidArgument`] if `duration` is not positive
    /// - [`SessionError::Expired`] if the session already expired
    pub fn extend(&self, duration: Duration) -> Result<(), SessionError> {
        if duration <= Duration::zero() {
            return Err(SessionError::InvalidArgument(format!(
                "extension must be positive, got {duration}"
            )));
        }
        self.ensure_live()?;

        let mut state = self.state.lock();
        if state.expired {
            return Err(SessionError::Expired(self.id));
        }
        if state.expiry.is_some() {
            state.expiry = Utc::now().checked_add_signed(duration);
        }
        Ok(())
    }

    /// Expires the session now. Calling it again has no effect.
    pub fn expire(&self) {
        let fired = {
            let mut state = self.state.lock();
            if state.expired {
                return;
            }
            state.mark_expired()
        };
        debug!(session = %self.id, user = %self.user, "Session expired");
        self.fire_expiration_listeners(fired);
    }

    /// Registers `listener` to run once when this session expires. Runs it
    /// immediately if the session already expired.
    pub fn add_expiration_listener(&self, listener: impl FnOnce(&Session) + Send + 'static) {
        {
            let mut state = self.state.lock();
            if !state.expired {
                state.on_expired.push(Box::new(listener));
                return;
            }
        }
        self.fire_expiration_listeners(vec![Box::new(listener)]);
    }

    fn fire_expiration_listeners(&self, listeners: Vec<ExpirationListener>) {
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(self))).is_err() {
                error!(session = %self.id, "Expiration listener panicked");
            }
        }
    }

    pub(crate) fn ensure_live(&self) -> Result<(), SessionError> {
        if self.is_expired() {
            Err(SessionError::Expired(self.id))
        } else {
            Ok(())
        }
    }

    // === Listeners ===

    /// Subscribes `listeners` to `topics`.
    ///
    /// Topics are relative to the notification kind: `"sensor1/temp/*"`
    /// receives `DATA/sensor1/temp/...` through the data callback and
    /// `LIFECYCLE/sensor1/temp/...` through the lifecycle callback. A
    /// trailing `*` matches any suffix.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Expired`] if the session expired.
    pub fn add_listener<I, T>(&self, topics: I, listeners: Listeners) -> Result<SubscriptionId, SessionError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ensure_live()?;
        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        let id = SubscriptionId::new();

        let mut state = self.state.lock();
        if state.expired {
            return Err(SessionError::Expired(self.id));
        }
        state.listeners.add(id, topics, &listeners, &self.authorizer);
        debug!(session = %self.id, subscription = %id, ?listeners, "Listener added");
        Ok(id)
    }

    /// Unsubscribes `id`. Unknown ids are ignored.
    pub fn remove_listener(&self, id: SubscriptionId) {
        if self.state.lock().listeners.remove(id) {
            debug!(session = %self.id, subscription = %id, "Listener removed");
        }
    }

    /// Active subscriptions and the topics each was registered with.
    #[must_use]
    pub fn active_listeners(&self) -> HashMap<SubscriptionId, Vec<String>> {
        self.state.lock().listeners.active()
    }

    /// Delivers `event` to the subscriptions matching `topic`.
    ///
    /// Matching registrations are collected under the session lock, then
    /// called without it. Each one re-checks the caller's permission on
    /// the event's target.
    pub fn notify(&self, topic: &str, event: &ResourceNotification) {
        if self.is_expired() {
            return;
        }
        let matched = {
            let state = self.state.lock();
            if state.expired {
                return;
            }
            state.listeners.matching(topic)
        };
        for registration in matched {
            registration.deliver(topic, event);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("expiry", &state.expiry)
            .field("expired", &state.expired)
            .field("activity_checker", &self.activity_checker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_auth::{DefaultAuthPolicy, PolicyEngine};
    use gantry_auth::AuthorizationEngine;
    use gantry_twin::{ExecutorError, TwinCommand};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoExecutor;

    impl TwinExecutor for NoExecutor {
        fn submit(&self, _: TwinCommand) -> Result<(), ExecutorError> {
            Err(ExecutorError::Stopped)
        }
    }

    fn session(lifetime: Option<Duration>) -> Session {
        let user = UserInfo::new("alice");
        let engine = PolicyEngine::new(DefaultAuthPolicy::AllowAll);
        Session::new(
            user.clone(),
            engine.create_authorizer(&user),
            gantry_auth::pre_authorizer_for(&engine, &user),
            Arc::new(NoExecutor),
        )
        .with_lifetime(lifetime)
    }

    #[test]
    fn unlimited_session_stays_live() {
        let session = session(None);
        assert!(!session.is_expired());
        assert_eq!(session.expiry(), None);
    }

    #[test]
    fn passed_expiry_is_detected_lazily() {
        let session = session(Some(Duration::milliseconds(-1)));
        assert!(session.is_expired());
        assert_eq!(session.expiry(), None);
    }

    #[test]
    fn expired_is_sticky() {
        let session = session(Some(Duration::minutes(5)));
        session.expire();
        assert!(session.is_expired());
        assert!(matches!(
            session.extend(Duration::minutes(5)),
            Err(SessionError::Expired(_))
        ));
        assert!(session.is_expired());
    }

    #[test]
    fn extend_rejects_non_positive_durations() {
        let session = session(Some(Duration::minutes(5)));
        assert!(matches!(
            session.extend(Duration::zero()),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.extend(Duration::seconds(-3)),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn extend_moves_expiry_from_now() {
        let session = session(Some(Duration::seconds(1)));
        session.extend(Duration::hours(1)).unwrap();
        let expiry = session.expiry().unwrap();
        assert!(expiry > Utc::now() + Duration::minutes(59));
    }

    #[test]
    fn expiration_listeners_fire_once() {
        let session = session(Some(Duration::minutes(5)));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        session.add_expiration_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.expire();
        session.expire();
        assert!(session.is_expired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_expiration_listener_runs_immediately() {
        let session = session(None);
        session.expire();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        session.add_expiration_listener(move |s| {
            assert!(s.is_expired());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expiration_listener_may_query_the_session() {
        let session = session(Some(Duration::milliseconds(-1)));
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        session.add_expiration_listener(move |s| {
            *slot.lock() = Some((s.session_id(), s.expiry()));
        });

        assert!(session.is_expired());
        assert_eq!(*seen.lock(), Some((session.session_id(), None)));
    }

    #[test]
    fn expired_session_delivers_nothing() {
        let session = session(None);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        session
            .add_listener(
                ["p/*"],
                Listeners::new().on_data(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let event = ResourceNotification::data("p", "s", "r", None, None);
        session.notify("DATA/p/s/r", &event);
        session.expire();
        session.notify("DATA/p/s/r", &event);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(session.active_listeners().is_empty());
    }

    #[test]
    fn add_listener_on_expired_session_fails() {
        let session = session(None);
        session.expire();
        let result = session.add_listener(["p/*"], Listeners::new().on_data(|_, _| {}));
        assert!(matches!(result, Err(SessionError::Expired(_))));
    }

    #[test]
    fn removed_listener_gets_nothing() {
        let session = session(None);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = session
            .add_listener(
                ["p/s/r"],
                Listeners::new().on_data(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(session.active_listeners().len(), 1);

        session.remove_listener(id);
        session.notify("DATA/p/s/r", &ResourceNotification::data("p", "s", "r", None, None));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(session.active_listeners().is_empty());
    }
}
