//! Client activity checks.
//!
//! Sessions created with an [`ActivityChecker`] are kept alive while their
//! client is active: shortly before such a session expires, the registry's
//! monitor asks the checker and extends the session if it answers `true`.
//! Sessions without a checker simply expire.

use crate::{Session, SessionRegistry};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Decides whether the client behind a session is still active.
///
/// Implemented for any `Fn(&Session) -> bool`.
pub trait ActivityChecker: Send + Sync {
    /// Returns `true` if `session` should be extended.
    fn is_active(&self, session: &Session) -> bool;
}

impl<F> ActivityChecker for F
where
    F: Fn(&Session) -> bool + Send + Sync,
{
    fn is_active(&self, session: &Session) -> bool {
        self(session)
    }
}

/// Spawns the periodic liveness sweep of `registry` on the current tokio
/// runtime.
///
/// Returns `None` when the configuration disables activity checks. The
/// task ends once the registry is closed or dropped.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn start_activity_monitor(registry: &Arc<SessionRegistry>) -> Option<JoinHandle<()>> {
    let config = registry.config();
    if !config.activity_check_enabled() {
        debug!("Activity checker disabled");
        return None;
    }
    let period = Duration::from_secs(config.activity_check.interval_secs.unsigned_abs());
    let weak: Weak<SessionRegistry> = Arc::downgrade(registry);

    debug!(
        interval_secs = config.activity_check.interval_secs,
        threshold_secs = config.activity_check.threshold_secs,
        "Starting activity monitor"
    );
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(registry) = weak.upgrade() else {
                break;
            };
            if !registry.is_active() {
                break;
            }
            registry.check_sessions_liveness();
        }
        debug!("Activity monitor stopped");
    }))
}
