//! Integration tests for the session registry.
//!
//! Covers:
//! - Default sessions, including concurrent creation
//! - Session lookup per user
//! - Expiry and expiration listeners
//! - Authorization engine swaps
//! - Shutdown
//! - Activity-driven extension

mod common;

use chrono::{Duration, Utc};
use common::*;
use gantry_auth::{AuthorizationEngine, Authorizer, PermissionLevel};
use gantry_session::config::{ActivityCheckConfig, SessionManagerConfig};
use gantry_session::{start_activity_monitor, Session, SessionError, SessionRegistry};
use gantry_types::UserInfo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

// =============================================================================
// Default sessions
// =============================================================================

#[test]
fn default_session_is_stable_until_expired() {
    let fx = Fixture::allow_all();
    let alice = user("alice");

    let first = fx.registry.get_default_session(&alice).unwrap();
    let again = fx.registry.get_default_session(&alice).unwrap();
    assert_eq!(first.session_id(), again.session_id());

    first.expire();
    let next = fx.registry.get_default_session(&alice).unwrap();
    assert_ne!(next.session_id(), first.session_id());
    assert_eq!(fx.registry.get_session_ids(&alice).unwrap(), vec![next.session_id()]);
}

#[test]
fn default_sessions_are_per_user() {
    let fx = Fixture::allow_all();
    let alice = fx.registry.get_default_session(&user("alice")).unwrap();
    let bob = fx.registry.get_default_session(&user("bob")).unwrap();
    assert_ne!(alice.session_id(), bob.session_id());
    assert_eq!(fx.registry.session_count(), 2);
}

#[test]
fn concurrent_default_session_requests_agree() {
    let fx = Fixture::allow_all();
    let registry = Arc::clone(&fx.registry);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                registry
                    .get_default_session(&UserInfo::new("alice"))
                    .unwrap()
                    .session_id()
            })
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(fx.registry.session_count(), 1);
    assert_eq!(fx.registry.get_session_ids(&user("alice")).unwrap(), vec![ids[0]]);
}

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn sessions_are_listed_in_creation_order() {
    let fx = Fixture::allow_all();
    let alice = user("alice");
    let a = fx.registry.create_new_session(&alice).unwrap();
    let b = fx.registry.create_new_session(&alice).unwrap();
    fx.registry.create_new_session(&user("bob")).unwrap();

    assert_eq!(
        fx.registry.get_session_ids(&alice).unwrap(),
        vec![a.session_id(), b.session_id()]
    );
}

#[test]
fn sessions_are_only_visible_to_their_user() {
    let fx = Fixture::allow_all();
    let session = fx.registry.create_new_session(&user("alice")).unwrap();

    let found = fx
        .registry
        .get_session(&user("alice"), session.session_id())
        .unwrap();
    assert_eq!(found.map(|s| s.session_id()), Some(session.session_id()));
    assert!(fx
        .registry
        .get_session(&user("bob"), session.session_id())
        .unwrap()
        .is_none());
}

#[test]
fn expired_sessions_leave_the_registry() {
    let fx = Fixture::allow_all();
    let alice = user("alice");
    let session = fx.registry.create_new_session(&alice).unwrap();
    assert_eq!(fx.registry.session_count(), 1);

    session.expire();
    assert_eq!(fx.registry.session_count(), 0);
    assert!(fx
        .registry
        .get_session(&alice, session.session_id())
        .unwrap()
        .is_none());
    assert!(fx.registry.get_session_ids(&alice).unwrap().is_empty());
}

#[test]
fn anonymous_shortcuts() {
    let fx = Fixture::allow_all();

    let default = fx.registry.get_default_anonymous_session().unwrap();
    assert!(default.user_info().is_anonymous());
    let same = fx
        .registry
        .get_default_session(&UserInfo::anonymous())
        .unwrap();
    assert_eq!(default.session_id(), same.session_id());

    let extra = fx.registry.create_new_anonymous_session().unwrap();
    assert_eq!(
        fx.registry.get_anonymous_session_ids().unwrap(),
        vec![default.session_id(), extra.session_id()]
    );
    assert!(fx
        .registry
        .get_anonymous_session(extra.session_id())
        .unwrap()
        .is_some());
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn sessions_expire_after_the_configured_lifetime() {
    let config = SessionManagerConfig {
        expiry_secs: 1,
        ..allow_all_config()
    };
    let fx = Fixture::new(config);
    let alice = user("alice");
    let session = fx.registry.create_new_session(&alice).unwrap();

    let expiry = session.expiry().unwrap();
    assert!(expiry <= Utc::now() + Duration::seconds(1));
    assert!(!session.is_expired());

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    assert!(session.is_expired());
    assert!(session.expiry().is_none());
    assert!(fx
        .registry
        .get_session(&alice, session.session_id())
        .unwrap()
        .is_none());
}

#[test]
fn non_positive_expiry_means_unlimited() {
    let config = SessionManagerConfig {
        expiry_secs: 0,
        ..allow_all_config()
    };
    let fx = Fixture::new(config);
    let session = fx.registry.create_new_session(&user("alice")).unwrap();

    assert!(session.expiry().is_none());
    session.extend(Duration::seconds(30)).unwrap();
    assert!(session.expiry().is_none());
    assert!(!session.is_expired());
}

#[test]
fn extend_pushes_the_expiry() {
    let fx = Fixture::allow_all();
    let session = fx.registry.create_new_session(&user("alice")).unwrap();

    session.extend(Duration::hours(2)).unwrap();
    assert!(session.expiry().unwrap() > Utc::now() + Duration::minutes(90));

    let err = session.extend(Duration::zero()).unwrap_err();
    assert!(matches!(err, SessionError::InvalidArgument(_)));

    session.expire();
    let err = session.extend(Duration::seconds(5)).unwrap_err();
    assert!(err.is_expired());
}

#[test]
fn expiration_listeners_fire_once() {
    let fx = Fixture::allow_all();
    let session = fx.registry.create_new_session(&user("alice")).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fired);
    session.add_expiration_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.expire();
    session.expire();
    assert!(session.is_expired());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let counter = Arc::clone(&fired);
    session.add_expiration_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Authorization engine
// =============================================================================

#[tokio::test]
async fn engine_swap_expires_existing_sessions() {
    let fx = Fixture::allow_all();
    let alice = user("alice");

    fx.registry.set_authorization(Rules::undecided().engine()).unwrap();
    let old = fx.registry.create_new_session(&alice).unwrap();
    let level: Option<f64> = old.get_resource_value("Sensor1", "temp", "level").await.unwrap();
    assert_eq!(level, Some(21.5));

    let strict = Rules::undecided().deny(PermissionLevel::Read, "Sensor1");
    fx.registry.set_authorization(strict.engine()).unwrap();
    assert!(old.is_expired());
    assert!(fx
        .registry
        .get_session(&alice, old.session_id())
        .unwrap()
        .is_none());

    let new = fx.registry.create_new_session(&alice).unwrap();
    let err = new
        .get_resource_value::<f64>("Sensor1", "temp", "level")
        .await
        .unwrap_err();
    assert!(err.is_not_permitted());
}

#[test]
fn unset_ignores_a_foreign_engine() {
    let fx = Fixture::new(SessionManagerConfig::default());
    let registered = Rules::undecided().engine();
    fx.registry.set_authorization(Arc::clone(&registered)).unwrap();
    let session = fx.registry.create_new_session(&user("alice")).unwrap();

    let foreign = Rules::undecided().engine();
    fx.registry.unset_authorization(&foreign).unwrap();
    assert!(!session.is_expired());

    fx.registry.unset_authorization(&registered).unwrap();
    assert!(session.is_expired());
    assert_eq!(fx.registry.session_count(), 0);
}

#[tokio::test]
async fn unset_falls_back_to_the_default_policy() {
    // Default policy is DENY_ALL.
    let fx = Fixture::new(SessionManagerConfig::default());
    let engine = Rules::undecided().engine();
    fx.registry.set_authorization(Arc::clone(&engine)).unwrap();
    fx.registry.unset_authorization(&engine).unwrap();

    let session = fx.registry.create_new_session(&user("alice")).unwrap();
    let err = session
        .get_resource_value::<f64>("Sensor1", "temp", "level")
        .await
        .unwrap_err();
    assert!(err.is_not_permitted());
}

/// Replaces itself with a fresh copy while building authorizers, as long
/// as it has swaps left.
struct ChurningEngine {
    registry: Arc<OnceLock<Weak<SessionRegistry>>>,
    swaps_left: Arc<AtomicUsize>,
}

impl ChurningEngine {
    fn install(registry: &Arc<SessionRegistry>, swaps: usize) {
        let cell = Arc::new(OnceLock::new());
        let _ = cell.set(Arc::downgrade(registry));
        let engine = ChurningEngine {
            registry: cell,
            swaps_left: Arc::new(AtomicUsize::new(swaps)),
        };
        registry.set_authorization(Arc::new(engine)).unwrap();
    }
}

impl AuthorizationEngine for ChurningEngine {
    fn create_authorizer(&self, _user: &UserInfo) -> Arc<dyn Authorizer> {
        let swap = self
            .swaps_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if swap {
            if let Some(registry) = self.registry.get().and_then(Weak::upgrade) {
                let next = ChurningEngine {
                    registry: Arc::clone(&self.registry),
                    swaps_left: Arc::clone(&self.swaps_left),
                };
                registry.set_authorization(Arc::new(next)).unwrap();
            }
        }
        Arc::new(Rules::undecided())
    }
}

#[test]
fn session_creation_retries_while_the_engine_changes() {
    let fx = Fixture::allow_all();
    ChurningEngine::install(&fx.registry, 2);

    let session = fx.registry.create_new_session(&user("alice")).unwrap();
    assert!(!session.is_expired());
    assert_eq!(fx.registry.session_count(), 1);
}

#[test]
fn session_creation_gives_up_under_constant_churn() {
    let config = SessionManagerConfig {
        max_create_retries: 2,
        ..allow_all_config()
    };
    let fx = Fixture::new(config);
    ChurningEngine::install(&fx.registry, usize::MAX);

    let err = fx.registry.create_new_session(&user("alice")).unwrap_err();
    assert!(matches!(err, SessionError::EngineChurn { retries: 2 }));
    assert_eq!(fx.registry.session_count(), 0);
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn close_expires_everything_and_refuses_further_calls() {
    let fx = Fixture::allow_all();
    let alice = user("alice");
    let session = fx.registry.create_new_session(&alice).unwrap();

    fx.registry.close();
    assert!(!fx.registry.is_active());
    assert!(session.is_expired());
    assert_eq!(fx.registry.session_count(), 0);

    assert!(matches!(
        fx.registry.get_default_session(&alice),
        Err(SessionError::RegistryClosed)
    ));
    assert!(matches!(
        fx.registry.create_new_session(&alice),
        Err(SessionError::RegistryClosed)
    ));
    assert!(matches!(
        fx.registry.get_session_ids(&alice),
        Err(SessionError::RegistryClosed)
    ));
    assert!(matches!(
        fx.registry.set_authorization(Rules::undecided().engine()),
        Err(SessionError::RegistryClosed)
    ));

    // Idempotent.
    fx.registry.close();
}

// =============================================================================
// Activity
// =============================================================================

fn activity_config() -> SessionManagerConfig {
    SessionManagerConfig {
        expiry_secs: 2,
        activity_check: ActivityCheckConfig {
            interval_secs: 1,
            threshold_secs: 5,
            extension_secs: 60,
        },
        ..allow_all_config()
    }
}

#[test]
fn active_sessions_near_expiry_are_extended() {
    let fx = Fixture::new(activity_config());
    let alice = user("alice");
    let active = fx
        .registry
        .create_new_session_with_activity_checker(&alice, Arc::new(|_: &Session| true))
        .unwrap();
    let idle = fx
        .registry
        .create_new_session_with_activity_checker(&alice, Arc::new(|_: &Session| false))
        .unwrap();
    let plain = fx.registry.create_new_session(&alice).unwrap();
    let idle_expiry = idle.expiry().unwrap();

    assert_eq!(fx.registry.check_sessions_liveness(), 1);
    assert!(active.expiry().unwrap() > Utc::now() + Duration::seconds(50));
    assert_eq!(idle.expiry(), Some(idle_expiry));
    assert!(plain.expiry().unwrap() <= Utc::now() + Duration::seconds(2));
}

#[test]
fn huge_threshold_checks_every_session() {
    let mut config = activity_config();
    config.activity_check.threshold_secs = 1_000_000_000_000_000;
    let fx = Fixture::new(config);
    let session = fx
        .registry
        .create_new_session_with_activity_checker(&user("alice"), Arc::new(|_: &Session| true))
        .unwrap();

    assert_eq!(fx.registry.check_sessions_liveness(), 1);
    assert!(session.expiry().unwrap() > Utc::now() + Duration::seconds(50));
}

#[test]
fn sessions_far_from_expiry_are_left_alone() {
    let fx = Fixture::allow_all();
    let checks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&checks);
    fx.registry
        .create_new_session_with_activity_checker(
            &user("alice"),
            Arc::new(move |_: &Session| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        )
        .unwrap();

    assert_eq!(fx.registry.check_sessions_liveness(), 0);
    assert_eq!(checks.load(Ordering::SeqCst), 0);
}

#[test]
fn disabled_activity_check_starts_no_monitor() {
    let config = SessionManagerConfig {
        activity_check: ActivityCheckConfig {
            interval_secs: 0,
            ..ActivityCheckConfig::default()
        },
        ..allow_all_config()
    };
    let fx = Fixture::new(config);
    assert!(start_activity_monitor(&fx.registry).is_none());
    assert_eq!(fx.registry.check_sessions_liveness(), 0);
}

#[tokio::test]
async fn activity_monitor_keeps_sessions_alive_until_closed() {
    let fx = Fixture::new(activity_config());
    let checks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&checks);
    let session = fx
        .registry
        .create_new_session_with_activity_checker(
            &user("alice"),
            Arc::new(move |_: &Session| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        )
        .unwrap();

    let monitor = start_activity_monitor(&fx.registry).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    assert!(checks.load(Ordering::SeqCst) >= 1);
    assert!(!session.is_expired());

    fx.registry.close();
    tokio::time::timeout(std::time::Duration::from_secs(3), monitor)
        .await
        .unwrap()
        .unwrap();
}
