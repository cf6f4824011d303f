//! Addressing of twin elements.
//!
//! The digital twin is a three-level hierarchy (provider → service →
//! resource). Every provider is an instance of a model identified by a
//! package URI and a model name; authorization decisions may depend on
//! both the model and the concrete path.

use serde::{Deserialize, Serialize};

/// Borrowed model identifiers of a provider.
///
/// [`ModelRef::UNKNOWN`] is used when the targeted provider does not
/// exist, so that an authorizer is still consulted (and cannot tell the
/// difference from a real lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelRef<'a> {
    /// Model package URI, if known.
    pub package_uri: Option<&'a str>,
    /// Model name, if known.
    pub name: Option<&'a str>,
}

impl<'a> ModelRef<'a> {
    /// Model identifiers of a target that does not exist.
    pub const UNKNOWN: ModelRef<'static> = ModelRef {
        package_uri: None,
        name: None,
    };

    /// Creates a model reference from optional identifiers.
    #[must_use]
    pub fn new(package_uri: Option<&'a str>, name: Option<&'a str>) -> Self {
        Self { package_uri, name }
    }

    /// Returns `true` if neither identifier is known.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.package_uri.is_none() && self.name.is_none()
    }
}

/// Path of a twin element.
///
/// Displayed as `provider[/service[/resource]]`, which is also the shape
/// used in permission error messages.
///
/// # Example
///
/// ```
/// use gantry_types::TwinPath;
///
/// let path = TwinPath::resource("sensor1", "temp", "level");
/// assert_eq!(path.to_string(), "sensor1/temp/level");
/// assert_eq!(path.provider(), "sensor1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TwinPath {
    /// A whole provider.
    Provider(String),
    /// A service of a provider.
    Service(String, String),
    /// A resource of a service.
    Resource(String, String, String),
}

impl TwinPath {
    /// Provider path.
    #[must_use]
    pub fn provider_path(provider: impl Into<String>) -> Self {
        Self::Provider(provider.into())
    }

    /// Service path.
    #[must_use]
    pub fn service(provider: impl Into<String>, service: impl Into<String>) -> Self {
        Self::Service(provider.into(), service.into())
    }

    /// Resource path.
    #[must_use]
    pub fn resource(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::Resource(provider.into(), service.into(), resource.into())
    }

    /// Returns the provider segment.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Provider(p) | Self::Service(p, _) | Self::Resource(p, _, _) => p,
        }
    }

    /// Returns the kind of element addressed ("provider", "service", "resource").
    #[must_use]
    pub fn level_name(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::Service(..) => "service",
            Self::Resource(..) => "resource",
        }
    }
}

impl std::fmt::Display for TwinPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(p) => write!(f, "{p}"),
            Self::Service(p, s) => write!(f, "{p}/{s}"),
            Self::Resource(p, s, r) => write!(f, "{p}/{s}/{r}"),
        }
    }
}
