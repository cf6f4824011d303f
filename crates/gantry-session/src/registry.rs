//! Session registry.
//!
//! # Indexes
//!
//! ```text
//! sessions            SessionId ──► Arc<Session>
//! sessions_by_user    user id   ──► [SessionId]   (creation order)
//! default_session_of  user id   ──► SessionId
//! ```
//!
//! All three are guarded by one lock. Every session the registry creates
//! carries an expiration listener that removes it from the indexes, so an
//! expired session disappears whichever way it expired.
//!
//! # Locking
//!
//! The registry lock is never held while a session's own lock is taken:
//! expiring a session runs its listeners, which take the registry lock.
//! Sessions are therefore collected under the lock and expired, queried
//! or notified after releasing it.
//!
//! # Authorization Engine
//!
//! Sessions are built from the engine registered at creation time, or
//! from the configured default policy when there is none. Replacing or
//! removing the engine expires every session, so no session outlives the
//! permissions it was built with.

use crate::config::SessionManagerConfig;
use chrono::{DateTime, TimeDelta, Utc};
use crate::{ActivityChecker, Session, SessionError};
use gantry_auth::{pre_authorizer_for, AuthorizationEngine, PolicyEngine};
use gantry_event::ResourceNotification;
use gantry_twin::TwinExecutor;
use gantry_types::{SessionId, UserInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Creates, indexes and expires sessions, and fans twin notifications out
/// to them.
///
/// # Example
///
/// ```
/// use gantry_session::config::SessionManagerConfig;
/// use gantry_session::SessionRegistry;
/// use gantry_twin::{GatewayThread, InMemoryTwin};
/// use gantry_types::UserInfo;
/// use std::sync::Arc;
///
/// let gateway = Arc::new(GatewayThread::spawn(InMemoryTwin::new()).unwrap());
/// let registry = SessionRegistry::new(SessionManagerConfig::default(), gateway);
///
/// let alice = UserInfo::new("alice");
/// let first = registry.get_default_session(&alice).unwrap();
/// let again = registry.get_default_session(&alice).unwrap();
/// assert_eq!(first.session_id(), again.session_id());
///
/// registry.close();
/// assert!(first.is_expired());
/// ```
pub struct SessionRegistry {
    config: SessionManagerConfig,
    executor: Arc<dyn TwinExecutor>,
    state: Mutex<RegistryState>,
    this: Weak<SessionRegistry>,
}

struct RegistryState {
    active: bool,
    engine: Option<Arc<dyn AuthorizationEngine>>,
    /// Bumped on every engine change.
    generation: u64,
    sessions: HashMap<SessionId, Arc<Session>>,
    sessions_by_user: HashMap<String, Vec<SessionId>>,
    default_session_of: HashMap<String, SessionId>,
}

impl RegistryState {
    fn check_active(&self) -> Result<(), SessionError> {
        if self.active {
            Ok(())
        } else {
            Err(SessionError::RegistryClosed)
        }
    }

    fn insert(&mut self, session: Arc<Session>) {
        let id = session.session_id();
        self.sessions_by_user
            .entry(session.user_info().user_id().to_string())
            .or_default()
            .push(id);
        self.sessions.insert(id, session);
    }

    fn forget(&mut self, id: SessionId, user_id: &str) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if let Some(ids) = self.sessions_by_user.get_mut(user_id) {
            ids.retain(|known| *known != id);
            if ids.is_empty() {
                self.sessions_by_user.remove(user_id);
            }
        }
        if self.default_session_of.get(user_id) == Some(&id) {
            self.default_session_of.remove(user_id);
        }
        removed
    }

    /// Empties every index, handing back the sessions to expire.
    fn drain(&mut self) -> Vec<Arc<Session>> {
        self.sessions_by_user.clear();
        self.default_session_of.clear();
        self.sessions.drain().map(|(_, session)| session).collect()
    }

    fn user_sessions(&self, user_id: &str) -> Vec<Arc<Session>> {
        self.sessions_by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sessions.get(id).cloned())
            .collect()
    }
}

impl SessionRegistry {
    /// Creates an active registry whose sessions run their twin commands
    /// on `executor`.
    #[must_use]
    pub fn new(config: SessionManagerConfig, executor: Arc<dyn TwinExecutor>) -> Arc<Self> {
        info!(
            expiry_secs = config.expiry_secs,
            auth_policy = %config.auth_policy,
            "Session registry started"
        );
        Arc::new_cyclic(|this| Self {
            config,
            executor,
            state: Mutex::new(RegistryState {
                active: true,
                engine: None,
                generation: 0,
                sessions: HashMap::new(),
                sessions_by_user: HashMap::new(),
                default_session_of: HashMap::new(),
            }),
            this: this.clone(),
        })
    }

    /// Returns the configuration this registry was built with.
    #[must_use]
    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Returns `false` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Number of tracked sessions.
    ///
    /// Sessions whose expiry passed unnoticed are counted until something
    /// looks at them.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    // === Session lookup and creation ===

    /// Returns the default session of `user`, creating it if needed.
    ///
    /// Concurrent callers for the same user all receive the same session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::RegistryClosed`] after [`close`](Self::close)
    /// - [`SessionError::EngineChurn`] if the session could not be settled
    ///   within the configured retries
    pub fn get_default_session(&self, user: &UserInfo) -> Result<Arc<Session>, SessionError> {
        let retries = self.config.max_create_retries;
        for _ in 0..=retries {
            let existing = {
                let state = self.state.lock();
                state.check_active()?;
                state
                    .default_session_of
                    .get(user.user_id())
                    .and_then(|id| state.sessions.get(id))
                    .cloned()
            };
            if let Some(session) = existing {
                // An expired default removes itself from the indexes.
                if !session.is_expired() {
                    return Ok(session);
                }
                continue;
            }

            let candidate = self.create_session(user, None)?;
            let installed = {
                let mut state = self.state.lock();
                match state.default_session_of.get(user.user_id()) {
                    None if state.sessions.contains_key(&candidate.session_id()) => {
                        state
                            .default_session_of
                            .insert(user.user_id().to_string(), candidate.session_id());
                        true
                    }
                    _ => {
                        state.forget(candidate.session_id(), user.user_id());
                        false
                    }
                }
            };
            if installed {
                debug!(session = %candidate.session_id(), user = %user, "Default session created");
                return Ok(candidate);
            }
            // Lost the race against another caller, or the engine changed.
            candidate.expire();
        }
        Err(SessionError::EngineChurn { retries })
    }

    /// Returns the session `id` of `user`, if it exists and has not expired.
    ///
    /// # Errors
    ///
    /// [`SessionError::RegistryClosed`] after [`close`](Self::close).
    pub fn get_session(
        &self,
        user: &UserInfo,
        id: SessionId,
    ) -> Result<Option<Arc<Session>>, SessionError> {
        let session = {
            let state = self.state.lock();
            state.check_active()?;
            state
                .sessions
                .get(&id)
                .filter(|s| s.user_info().user_id() == user.user_id())
                .cloned()
        };
        Ok(session.filter(|s| !s.is_expired()))
    }

    /// Ids of the live sessions of `user`, oldest first.
    ///
    /// # Errors
    ///
    /// [`SessionError::RegistryClosed`] after [`close`](Self::close).
    pub fn get_session_ids(&self, user: &UserInfo) -> Result<Vec<SessionId>, SessionError> {
        let sessions = {
            let state = self.state.lock();
            state.check_active()?;
            state.user_sessions(user.user_id())
        };
        Ok(sessions
            .into_iter()
            .filter(|s| !s.is_expired())
            .map(|s| s.session_id())
            .collect())
    }

    /// Creates a new session for `user`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::RegistryClosed`] after [`close`](Self::close)
    /// - [`SessionError::EngineChurn`] if the authorization engine kept
    ///   changing during creation
    pub fn create_new_session(&self, user: &UserInfo) -> Result<Arc<Session>, SessionError> {
        self.create_session(user, None)
    }

    /// Creates a new session for `user` that the activity monitor extends
    /// while `checker` reports the client active.
    ///
    /// # Errors
    ///
    /// As [`create_new_session`](Self::create_new_session).
    pub fn create_new_session_with_activity_checker(
        &self,
        user: &UserInfo,
        checker: Arc<dyn ActivityChecker>,
    ) -> Result<Arc<Session>, SessionError> {
        self.create_session(user, Some(checker))
    }

    // === Anonymous shortcuts ===

    /// [`get_default_session`](Self::get_default_session) for the anonymous user.
    ///
    /// # Errors
    ///
    /// As [`get_default_session`](Self::get_default_session).
    pub fn get_default_anonymous_session(&self) -> Result<Arc<Session>, SessionError> {
        self.get_default_session(&UserInfo::anonymous())
    }

    /// [`get_session`](Self::get_session) for the anonymous user.
    ///
    /// # Errors
    ///
    /// As [`get_session`](Self::get_session).
    pub fn get_anonymous_session(&self, id: SessionId) -> Result<Option<Arc<Session>>, SessionError> {
        self.get_session(&UserInfo::anonymous(), id)
    }

    /// [`get_session_ids`](Self::get_session_ids) for the anonymous user.
    ///
    /// # Errors
    ///
    /// As [`get_session_ids`](Self::get_session_ids).
    pub fn get_anonymous_session_ids(&self) -> Result<Vec<SessionId>, SessionError> {
        self.get_session_ids(&UserInfo::anonymous())
    }

    /// [`create_new_session`](Self::create_new_session) for the anonymous user.
    ///
    /// # Errors
    ///
    /// As [`create_new_session`](Self::create_new_session).
    pub fn create_new_anonymous_session(&self) -> Result<Arc<Session>, SessionError> {
        self.create_new_session(&UserInfo::anonymous())
    }

    /// Builds and indexes a session, retrying while the engine changes
    /// under it.
    fn create_session(
        &self,
        user: &UserInfo,
        checker: Option<Arc<dyn ActivityChecker>>,
    ) -> Result<Arc<Session>, SessionError> {
        let retries = self.config.max_create_retries;
        for attempt in 0..=retries {
            let (engine, generation) = {
                let state = self.state.lock();
                state.check_active()?;
                (state.engine.clone(), state.generation)
            };

            // Engines may be slow to build authorizers; stay unlocked.
            let session = self.build_session(user, engine.as_deref(), checker.clone());

            let outcome = {
                let mut state = self.state.lock();
                if !state.active {
                    Err(SessionError::RegistryClosed)
                } else if state.generation == generation {
                    state.insert(Arc::clone(&session));
                    Ok(())
                } else {
                    Err(SessionError::EngineChurn { retries: attempt })
                }
            };
            match outcome {
                Ok(()) => {
                    debug!(session = %session.session_id(), user = %user, "Session created");
                    return Ok(session);
                }
                Err(SessionError::EngineChurn { .. }) => {
                    debug!(user = %user, attempt, "Authorization engine changed during session creation, retrying");
                    session.expire();
                }
                Err(e) => {
                    session.expire();
                    return Err(e);
                }
            }
        }
        warn!(user = %user, retries, "Gave up creating a session");
        Err(SessionError::EngineChurn { retries })
    }

    fn build_session(
        &self,
        user: &UserInfo,
        engine: Option<&dyn AuthorizationEngine>,
        checker: Option<Arc<dyn ActivityChecker>>,
    ) -> Arc<Session> {
        let (authorizer, pre_authorizer) = match engine {
            Some(engine) => (engine.create_authorizer(user), pre_authorizer_for(engine, user)),
            None => {
                let fallback = PolicyEngine::new(self.config.auth_policy);
                (
                    fallback.create_authorizer(user),
                    pre_authorizer_for(&fallback, user),
                )
            }
        };

        let mut session = Session::new(
            user.clone(),
            authorizer,
            pre_authorizer,
            Arc::clone(&self.executor),
        )
        .with_lifetime(self.config.expiry());
        if let Some(checker) = checker {
            session = session.with_activity_checker(checker);
        }

        let session = Arc::new(session);
        let registry = self.this.clone();
        session.add_expiration_listener(move |expired| {
            if let Some(registry) = registry.upgrade() {
                registry.forget(expired);
            }
        });
        session
    }

    fn forget(&self, session: &Session) {
        let removed = self
            .state
            .lock()
            .forget(session.session_id(), session.user_info().user_id());
        if removed {
            debug!(session = %session.session_id(), "Expired session removed");
        }
    }

    // === Authorization engine ===

    /// Registers `engine` and expires every existing session.
    ///
    /// # Errors
    ///
    /// [`SessionError::RegistryClosed`] after [`close`](Self::close).
    pub fn set_authorization(&self, engine: Arc<dyn AuthorizationEngine>) -> Result<(), SessionError> {
        let stale = {
            let mut state = self.state.lock();
            state.check_active()?;
            state.engine = Some(engine);
            state.generation += 1;
            state.drain()
        };
        info!(invalidated = stale.len(), "Authorization engine registered");
        expire_all(stale);
        Ok(())
    }

    /// Removes `engine` if it is the registered one, expiring every
    /// session. Sessions created afterwards use the default policy.
    ///
    /// # Errors
    ///
    /// [`SessionError::RegistryClosed`] after [`close`](Self::close).
    pub fn unset_authorization(&self, engine: &Arc<dyn AuthorizationEngine>) -> Result<(), SessionError> {
        let stale = {
            let mut state = self.state.lock();
            state.check_active()?;
            let current = state.engine.as_ref().is_some_and(|e| same_engine(e, engine));
            if !current {
                return Ok(());
            }
            state.engine = None;
            state.generation += 1;
            state.drain()
        };
        info!(invalidated = stale.len(), "Authorization engine removed");
        expire_all(stale);
        Ok(())
    }

    // === Notifications ===

    /// Delivers a twin notification to every live session.
    ///
    /// A failure in one session is logged and does not stop delivery to
    /// the others.
    pub fn notify(&self, topic: &str, event: &ResourceNotification) {
        let sessions: Vec<Arc<Session>> = {
            let state = self.state.lock();
            if !state.active {
                return;
            }
            state.sessions.values().cloned().collect()
        };

        for session in sessions {
            if session.is_expired() {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| session.notify(topic, event))).is_err() {
                error!(
                    session = %session.session_id(),
                    topic = %topic,
                    "Notification delivery failed"
                );
            }
        }
    }

    // === Activity ===

    /// Extends every session close to expiry whose activity checker reports
    /// its client active. Returns the number of extended sessions.
    ///
    /// Does nothing when activity checks are disabled by configuration.
    pub fn check_sessions_liveness(&self) -> usize {
        if !self.config.activity_check_enabled() {
            return 0;
        }
        let Some(extension) = self.config.activity_extension() else {
            return 0;
        };
        let threshold = self.config.activity_threshold();

        let candidates: Vec<Arc<Session>> = {
            let state = self.state.lock();
            if !state.active {
                return 0;
            }
            state
                .sessions
                .values()
                .filter(|s| s.activity_checker().is_some())
                .cloned()
                .collect()
        };

        let now = Utc::now();
        let mut extended = 0;
        for session in candidates {
            let Some(expiry) = session.expiry() else {
                continue;
            };
            if !due_for_check(expiry, threshold, now) {
                continue;
            }
            let Some(checker) = session.activity_checker() else {
                continue;
            };
            if !checker.is_active(&session) || !self.is_active() || session.is_expired() {
                continue;
            }
            match session.extend(extension) {
                Ok(()) => {
                    debug!(session = %session.session_id(), "Active session extended");
                    extended += 1;
                }
                Err(e) => {
                    warn!(session = %session.session_id(), error = %e, "Could not extend session");
                }
            }
        }
        extended
    }

    // === Shutdown ===

    /// Stops the registry and expires every session. Further calls fail
    /// with [`SessionError::RegistryClosed`].
    pub fn close(&self) {
        let stale = {
            let mut state = self.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            state.engine = None;
            state.drain()
        };
        info!(expired = stale.len(), "Session registry closed");
        expire_all(stale);
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionRegistry")
            .field("active", &state.active)
            .field("sessions", &state.sessions.len())
            .field("custom_engine", &state.engine.is_some())
            .finish()
    }
}

fn expire_all(sessions: Vec<Arc<Session>>) {
    for session in sessions {
        session.expire();
    }
}

fn same_engine(a: &Arc<dyn AuthorizationEngine>, b: &Arc<dyn AuthorizationEngine>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

/// A session is due once its expiry is within `threshold` of `now`. A
/// threshold reaching past the representable range makes every session due.
fn due_for_check(expiry: DateTime<Utc>, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
    expiry
        .checked_sub_signed(threshold)
        .map_or(true, |start| start <= now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_within_threshold() {
        let now = Utc::now();
        let threshold = TimeDelta::seconds(5);
        assert!(due_for_check(now + TimeDelta::seconds(3), threshold, now));
        assert!(due_for_check(now + threshold, threshold, now));
        assert!(!due_for_check(now + TimeDelta::seconds(30), threshold, now));
    }

    #[test]
    fn out_of_range_threshold_is_due() {
        let now = Utc::now();
        let huge = TimeDelta::try_seconds(1_000_000_000_000_000).unwrap();
        assert!(due_for_check(now + TimeDelta::hours(1), huge, now));
    }
}
