//! Resource and service operations.
//!
//! Each operation runs the two-phase check through
//! [`Session::resource_command`] or [`Session::service_command`]:
//!
//! | Pre-auth | Target exists | Target absent |
//! |----------|---------------|---------------|
//! | `Deny` | `NotPermitted` | `NotPermitted` |
//! | `Allow` | run | `None` |
//! | `Unknown` | check level with model, run | check DESCRIBE, `None` |
//!
//! A DESCRIBE failure on an absent target is reported at the requested
//! level, so the error is the same whether the target exists or not.

use super::Session;
use crate::description::{ResourceDescription, ResourceShortDescription, ServiceDescription};
use crate::SessionError;
use chrono::{DateTime, Utc};
use gantry_auth::{PermissionLevel, PreAuth};
use gantry_twin::{
    execute, DigitalTwin, GetLevel, ProviderIdentity, ResourceInfo, ServiceInfo, TimedValue,
    TwinError,
};
use gantry_types::{ModelRef, TwinPath};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Whether an operation applies to action resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Actions {
    /// Resolve to `None` on actions.
    Skip,
    Include,
}

impl Session {
    /// Runs `work` on an existing resource the caller may access at `level`.
    async fn resource_command<T, F>(
        &self,
        level: PermissionLevel,
        provider: &str,
        service: &str,
        resource: &str,
        actions: Actions,
        work: F,
    ) -> Result<Option<T>, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DigitalTwin, ResourceInfo) -> Result<T, TwinError> + Send + 'static,
    {
        self.ensure_live()?;
        let pre = self
            .pre_authorizer
            .pre_auth_resource(level, provider, service, resource);
        if pre.is_denied() {
            let path = TwinPath::resource(provider, service, resource);
            return Err(self.guard.denied(level, path).into());
        }

        let guard = self.guard.clone();
        let (p, s, r) = (provider.to_owned(), service.to_owned(), resource.to_owned());
        execute(self.executor.as_ref(), move |twin| -> Result<Option<T>, SessionError> {
            let Some(info) = twin.resource(&p, &s, &r) else {
                if pre.needs_authoritative_check() {
                    let owner = twin.provider(&p).map(|info| info.id);
                    let model = owner.as_ref().map_or(ModelRef::UNKNOWN, |id| id.model_ref());
                    // Denied at the requested level, as for an existing target.
                    guard
                        .require_resource(PermissionLevel::Describe, model, &p, &s, &r)
                        .map_err(|_| guard.denied(level, TwinPath::resource(&p, &s, &r)))?;
                }
                return Ok(None);
            };
            if pre.needs_authoritative_check() {
                guard.require_resource(level, info.provider.model_ref(), &p, &s, &r)?;
            }
            if actions == Actions::Skip && info.resource_type.is_action() {
                return Ok(None);
            }
            Ok(Some(work(twin, info)?))
        })
        .await?
    }

    /// Runs `work` on an existing service the caller may access at `level`.
    async fn service_command<T, F>(
        &self,
        level: PermissionLevel,
        provider: &str,
        service: &str,
        work: F,
    ) -> Result<Option<T>, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DigitalTwin, ServiceInfo) -> Result<T, TwinError> + Send + 'static,
    {
        self.ensure_live()?;
        let pre: PreAuth = self.pre_authorizer.pre_auth_service(level, provider, service);
        if pre.is_denied() {
            return Err(self
                .guard
                .denied(level, TwinPath::service(provider, service))
                .into());
        }

        let guard = self.guard.clone();
        let (p, s) = (provider.to_owned(), service.to_owned());
        execute(self.executor.as_ref(), move |twin| -> Result<Option<T>, SessionError> {
            let Some(info) = twin.service(&p, &s) else {
                if pre.needs_authoritative_check() {
                    let owner = twin.provider(&p).map(|info| info.id);
                    let model = owner.as_ref().map_or(ModelRef::UNKNOWN, |id| id.model_ref());
                    guard
                        .require_service(PermissionLevel::Describe, model, &p, &s)
                        .map_err(|_| guard.denied(level, TwinPath::service(&p, &s)))?;
                }
                return Ok(None);
            };
            if pre.needs_authoritative_check() {
                guard.require_service(level, info.provider.model_ref(), &p, &s)?;
            }
            Ok(Some(work(twin, info)?))
        })
        .await?
    }

    // === Values ===

    /// Reads a resource value with its timestamp.
    ///
    /// `Ok(None)` if the resource does not exist or is an action.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without READ access, plus the
    /// errors common to every data-plane call.
    pub async fn get_resource_timed_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        get_level: GetLevel,
    ) -> Result<Option<TimedValue>, SessionError> {
        self.resource_command(
            PermissionLevel::Read,
            provider,
            service,
            resource,
            Actions::Skip,
            move |twin, info| twin.get_value(&info.provider.name, &info.service, &info.name, get_level),
        )
        .await
    }

    /// Reads a resource value, converted to `T`.
    ///
    /// `Ok(None)` if the resource does not exist, is an action or holds no value.
    ///
    /// # Errors
    ///
    /// As [`get_resource_timed_value`](Self::get_resource_timed_value), and
    /// [`TwinError::InvalidValue`] if the value does not convert to `T`.
    pub async fn get_resource_value<T: DeserializeOwned>(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<T>, SessionError> {
        let timed = self
            .get_resource_timed_value(provider, service, resource, GetLevel::Normal)
            .await?;
        let Some(value) = timed.and_then(|t| t.value) else {
            return Ok(None);
        };
        convert(value, provider, service, resource).map(Some)
    }

    /// Reads a multi-valued resource as a list of `T`.
    ///
    /// A scalar value yields a one-element list, an unset value an empty list.
    ///
    /// # Errors
    ///
    /// As [`get_resource_value`](Self::get_resource_value).
    pub async fn get_resource_multi_value<T: DeserializeOwned>(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<Vec<T>>, SessionError> {
        let Some(timed) = self
            .get_resource_timed_value(provider, service, resource, GetLevel::Normal)
            .await?
        else {
            return Ok(None);
        };
        let items = match timed.value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(scalar) => vec![scalar],
        };
        items
            .into_iter()
            .map(|item| convert(item, provider, service, resource))
            .collect::<Result<Vec<T>, _>>()
            .map(Some)
    }

    /// Writes a resource value stamped with the current time.
    ///
    /// Writing to an absent resource or to an action does nothing.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without UPDATE access, or the twin's
    /// rejection of the value.
    pub async fn set_resource_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        self.set_resource_timed_value(provider, service, resource, value, Utc::now())
            .await
    }

    /// Writes a resource value with an explicit timestamp. The twin ignores
    /// updates older than the current value.
    ///
    /// # Errors
    ///
    /// As [`set_resource_value`](Self::set_resource_value).
    pub async fn set_resource_timed_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.resource_command(
            PermissionLevel::Update,
            provider,
            service,
            resource,
            Actions::Skip,
            move |twin, info| {
                twin.set_value(&info.provider.name, &info.service, &info.name, value, timestamp)
            },
        )
        .await
        .map(drop)
    }

    // === Metadata ===

    /// Reads every metadata value of a resource.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without READ access.
    pub async fn get_resource_metadata(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<Map<String, Value>>, SessionError> {
        self.resource_command(
            PermissionLevel::Read,
            provider,
            service,
            resource,
            Actions::Skip,
            |twin, info| twin.metadata(&info.provider.name, &info.service, &info.name),
        )
        .await
    }

    /// Writes several metadata values, all stamped with the current time.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without UPDATE access.
    pub async fn set_resource_metadata(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), SessionError> {
        let now = Utc::now();
        self.resource_command(
            PermissionLevel::Update,
            provider,
            service,
            resource,
            Actions::Skip,
            move |twin, info| {
                metadata.into_iter().try_for_each(|(key, value)| {
                    twin.set_metadata_value(
                        &info.provider.name,
                        &info.service,
                        &info.name,
                        &key,
                        value,
                        now,
                    )
                })
            },
        )
        .await
        .map(drop)
    }

    /// Reads one metadata value. A missing key yields an empty [`TimedValue`].
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without READ access.
    pub async fn get_resource_metadata_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        key: &str,
    ) -> Result<Option<TimedValue>, SessionError> {
        let key = key.to_owned();
        self.resource_command(
            PermissionLevel::Read,
            provider,
            service,
            resource,
            Actions::Skip,
            move |twin, info| {
                twin.metadata_value(&info.provider.name, &info.service, &info.name, &key)
            },
        )
        .await
    }

    /// Writes one metadata value stamped with the current time.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without UPDATE access.
    pub async fn set_resource_metadata_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        let key = key.to_owned();
        let now = Utc::now();
        self.resource_command(
            PermissionLevel::Update,
            provider,
            service,
            resource,
            Actions::Skip,
            move |twin, info| {
                twin.set_metadata_value(&info.provider.name, &info.service, &info.name, &key, value, now)
            },
        )
        .await
        .map(drop)
    }

    // === Actions ===

    /// Invokes an action resource and returns its result.
    ///
    /// `Ok(None)` if the resource does not exist.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without ACT access,
    /// [`TwinError::WrongResourceType`] if the resource is not an action,
    /// [`TwinError::ActionFailed`] if the action reports a failure.
    pub async fn act_on_resource(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        parameters: Map<String, Value>,
    ) -> Result<Option<Value>, SessionError> {
        self.resource_command(
            PermissionLevel::Act,
            provider,
            service,
            resource,
            Actions::Include,
            move |twin, info| twin.act(&info.provider.name, &info.service, &info.name, parameters),
        )
        .await
    }

    // === Descriptions ===

    /// Describes a resource: its shape, cached value and metadata.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access.
    pub async fn describe_resource(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<ResourceDescription>, SessionError> {
        self.resource_command(
            PermissionLevel::Describe,
            provider,
            service,
            resource,
            Actions::Include,
            |twin, info| {
                let (p, s, r) = (&info.provider.name, &info.service, &info.name);
                let value = if info.resource_type.is_action() {
                    TimedValue::default()
                } else {
                    twin.get_value(p, s, r, GetLevel::Weak)?
                };
                let metadata = twin.metadata(p, s, r)?;
                Ok(ResourceDescription::new(info, value, metadata))
            },
        )
        .await
    }

    /// Describes the shape of a resource, without its value.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access.
    pub async fn describe_resource_short(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<ResourceShortDescription>, SessionError> {
        self.resource_command(
            PermissionLevel::Describe,
            provider,
            service,
            resource,
            Actions::Include,
            |_, info| Ok(ResourceShortDescription::from(info)),
        )
        .await
    }

    /// Describes a service and lists its resources.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access.
    pub async fn describe_service(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Option<ServiceDescription>, SessionError> {
        self.service_command(PermissionLevel::Describe, provider, service, |_, info| {
            Ok(ServiceDescription::from(info))
        })
        .await
    }
}

fn convert<T: DeserializeOwned>(
    value: Value,
    provider: &str,
    service: &str,
    resource: &str,
) -> Result<T, SessionError> {
    serde_json::from_value(value).map_err(|e| {
        SessionError::Twin(TwinError::InvalidValue {
            path: TwinPath::resource(provider, service, resource),
            reason: e.to_string(),
        })
    })
}
