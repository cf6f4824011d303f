//! Shared fixtures for gantry-session integration tests.

#![allow(dead_code)]

use gantry_auth::{AuthorizationEngine, Authorizer, PermissionLevel, PreAuth, PreAuthorizer};
use gantry_session::config::SessionManagerConfig;
use gantry_session::SessionRegistry;
use gantry_twin::{
    ContentType, ExecutorError, GatewayThread, InMemoryTwin, ResourceType, TwinCommand,
    TwinExecutor,
};
use gantry_types::{ModelRef, UserInfo};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

pub const MODEL_URI: &str = "https://example.org/models";
pub const MODEL_NAME: &str = "Thermometer";

// =============================================================================
// Twin
// =============================================================================

/// Two sensors, a bare gateway provider and a reset action.
///
/// ```text
/// Sensor1 (model Thermometer)
///   temp/level    = 21.5
///   temp/unit     = "C"
///   control/reset (action)
/// Sensor2 (no model)
///   temp/level    = 18.0
/// Gateway
/// ```
pub fn sample_twin() -> InMemoryTwin {
    let mut twin = InMemoryTwin::new();
    twin.add_provider("Sensor1", Some(MODEL_URI), Some(MODEL_NAME))
        .unwrap();
    twin.add_resource("Sensor1", "temp", "level", ResourceType::Sensor, ContentType::Number)
        .unwrap();
    twin.add_resource("Sensor1", "temp", "unit", ResourceType::Property, ContentType::String)
        .unwrap();
    twin.update_value("Sensor1", "temp", "level", json!(21.5))
        .unwrap();
    twin.update_value("Sensor1", "temp", "unit", json!("C"))
        .unwrap();
    twin.add_action(
        "Sensor1",
        "control",
        "reset",
        vec![("delay".to_string(), "number".to_string())],
        |params| Ok(json!({ "reset": true, "delay": params.get("delay").cloned() })),
    )
    .unwrap();

    twin.add_provider("Sensor2", None, None).unwrap();
    twin.add_resource("Sensor2", "temp", "level", ResourceType::Sensor, ContentType::Number)
        .unwrap();
    twin.update_value("Sensor2", "temp", "level", json!(18.0))
        .unwrap();

    twin.add_provider("Gateway", None, None).unwrap();
    twin
}

// =============================================================================
// Gateway fixture
// =============================================================================

/// A registry wired to a gateway thread whose twin notifications are fed
/// back into the registry.
pub struct Fixture {
    pub registry: Arc<SessionRegistry>,
    pub gateway: Arc<GatewayThread>,
    pub executor: Arc<CountingExecutor>,
}

impl Fixture {
    pub fn new(config: SessionManagerConfig) -> Self {
        Self::with_twin(config, sample_twin())
    }

    pub fn with_twin(config: SessionManagerConfig, mut twin: InMemoryTwin) -> Self {
        let cell: Arc<OnceLock<Weak<SessionRegistry>>> = Arc::new(OnceLock::new());
        let sink = Arc::clone(&cell);
        twin.on_notification(move |event| {
            if let Some(registry) = sink.get().and_then(Weak::upgrade) {
                registry.notify(&event.topic(), event);
            }
        });

        let gateway = Arc::new(GatewayThread::spawn(twin).unwrap());
        let executor = Arc::new(CountingExecutor::new(Arc::clone(&gateway)));
        let registry = SessionRegistry::new(config, Arc::clone(&executor) as Arc<dyn TwinExecutor>);
        let _ = cell.set(Arc::downgrade(&registry));
        Self {
            registry,
            gateway,
            executor,
        }
    }

    pub fn allow_all() -> Self {
        Self::new(allow_all_config())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.registry.close();
        self.gateway.shutdown();
    }
}

pub fn allow_all_config() -> SessionManagerConfig {
    SessionManagerConfig {
        auth_policy: gantry_auth::DefaultAuthPolicy::AllowAll,
        ..SessionManagerConfig::default()
    }
}

pub fn user(name: &str) -> UserInfo {
    UserInfo::new(name)
}

/// Forwards to the gateway thread and counts submitted commands.
pub struct CountingExecutor {
    inner: Arc<GatewayThread>,
    submitted: AtomicUsize,
}

impl CountingExecutor {
    pub fn new(inner: Arc<GatewayThread>) -> Self {
        Self {
            inner,
            submitted: AtomicUsize::new(0),
        }
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl TwinExecutor for CountingExecutor {
    fn submit(&self, command: TwinCommand) -> Result<(), ExecutorError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(command)
    }
}

// =============================================================================
// Scripted authorization
// =============================================================================

/// One recorded authoritative check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub level: PermissionLevel,
    pub path: String,
    pub model_known: bool,
}

/// Table-driven authorizer and pre-authorizer.
///
/// Authoritative checks grant everything except the denied `(level, path)`
/// pairs, where a denied path also covers everything below it.
/// Pre-authorization answers `default_pre` unless an exact path override
/// exists.
#[derive(Clone)]
pub struct Rules {
    denied: Vec<(PermissionLevel, String)>,
    default_pre: PreAuth,
    pre_overrides: HashMap<String, PreAuth>,
    checks: Arc<Mutex<Vec<Check>>>,
    pre_calls: Arc<AtomicUsize>,
}

impl Rules {
    /// Grants everything, deciding nothing up front.
    pub fn undecided() -> Self {
        Self::with_pre(PreAuth::Unknown)
    }

    pub fn with_pre(default_pre: PreAuth) -> Self {
        Self {
            denied: Vec::new(),
            default_pre,
            pre_overrides: HashMap::new(),
            checks: Arc::new(Mutex::new(Vec::new())),
            pre_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn deny(mut self, level: PermissionLevel, path: &str) -> Self {
        self.denied.push((level, path.to_string()));
        self
    }

    pub fn pre(mut self, path: &str, answer: PreAuth) -> Self {
        self.pre_overrides.insert(path.to_string(), answer);
        self
    }

    pub fn checks(&self) -> Vec<Check> {
        self.checks.lock().unwrap().clone()
    }

    pub fn pre_calls(&self) -> usize {
        self.pre_calls.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> Arc<dyn AuthorizationEngine> {
        Arc::new(RulesEngine(self.clone()))
    }

    fn decide(&self, level: PermissionLevel, model: ModelRef<'_>, path: String) -> bool {
        let allowed = !self.denied.iter().any(|(l, denied)| {
            *l == level && (path == *denied || path.starts_with(&format!("{denied}/")))
        });
        self.checks.lock().unwrap().push(Check {
            level,
            path,
            model_known: !model.is_unknown(),
        });
        allowed
    }

    fn pre_auth(&self, path: String) -> PreAuth {
        self.pre_calls.fetch_add(1, Ordering::SeqCst);
        self.pre_overrides
            .get(&path)
            .copied()
            .unwrap_or(self.default_pre)
    }
}

impl Authorizer for Rules {
    fn has_provider_permission(&self, level: PermissionLevel, model: ModelRef<'_>, provider: &str) -> bool {
        self.decide(level, model, provider.to_string())
    }

    fn has_service_permission(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
        service: &str,
    ) -> bool {
        self.decide(level, model, format!("{provider}/{service}"))
    }

    fn has_resource_permission(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> bool {
        self.decide(level, model, format!("{provider}/{service}/{resource}"))
    }
}

impl PreAuthorizer for Rules {
    fn pre_auth_provider(&self, _level: PermissionLevel, provider: &str) -> PreAuth {
        self.pre_auth(provider.to_string())
    }

    fn pre_auth_service(&self, _level: PermissionLevel, provider: &str, service: &str) -> PreAuth {
        self.pre_auth(format!("{provider}/{service}"))
    }

    fn pre_auth_resource(
        &self,
        _level: PermissionLevel,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> PreAuth {
        self.pre_auth(format!("{provider}/{service}/{resource}"))
    }
}

/// Engine handing out the same [`Rules`] to every user.
pub struct RulesEngine(pub Rules);

impl AuthorizationEngine for RulesEngine {
    fn create_authorizer(&self, _user: &UserInfo) -> Arc<dyn Authorizer> {
        Arc::new(self.0.clone())
    }

    fn create_pre_authorizer(&self, _user: &UserInfo) -> Option<Arc<dyn PreAuthorizer>> {
        Some(Arc::new(self.0.clone()))
    }
}

/// Collects the topics delivered to a callback.
#[derive(Clone, Default)]
pub struct Inbox {
    topics: Arc<Mutex<Vec<String>>>,
}

impl Inbox {
    pub fn callback(&self) -> impl Fn(&str, &gantry_event::ResourceNotification) + Send + Sync + 'static {
        let topics = Arc::clone(&self.topics);
        move |topic, _event| topics.lock().unwrap().push(topic.to_string())
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.topics.lock().unwrap().len()
    }
}
