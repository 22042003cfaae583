//! Identity of the watched Kubernetes object

use crate::error::ResourceError;
use std::fmt;
use std::str::FromStr;

/// Kinds of configuration object that can be watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `v1/Secret`
    Secret,
    /// `v1/ConfigMap`
    ConfigMap,
}

impl ResourceKind {
    /// Lowercase name as accepted in `RESOURCE_TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Secret => "secret",
            ResourceKind::ConfigMap => "configmap",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "secret" | "secrets" => Ok(ResourceKind::Secret),
            "configmap" | "configmaps" => Ok(ResourceKind::ConfigMap),
            _ => Err(ResourceError::UnsupportedKind(s.to_string())),
        }
    }
}

/// The (namespace, kind, name) triple identifying the watched object.
///
/// Set once at construction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedResource {
    namespace: String,
    kind: ResourceKind,
    name: String,
}

impl WatchedResource {
    /// Identifies `name` of the given kind in `namespace`.
    pub fn new(namespace: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }

    /// Namespace the object lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Secret or ConfigMap.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Object name within the namespace.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for WatchedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} in namespace {}", self.kind, self.name, self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_kind() {
        assert_eq!("secret".parse::<ResourceKind>().unwrap(), ResourceKind::Secret);
        assert_eq!("ConfigMap".parse::<ResourceKind>().unwrap(), ResourceKind::ConfigMap);
        assert_eq!(" configmaps ".parse::<ResourceKind>().unwrap(), ResourceKind::ConfigMap);
    }

    #[test]
    fn test_parse_unsupported_kind() {
        let err = "deployment".parse::<ResourceKind>().unwrap_err();
        assert!(matches!(err, ResourceError::UnsupportedKind(ref kind) if kind == "deployment"));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_display() {
        let resource = WatchedResource::new("default", ResourceKind::ConfigMap, "app-config");
        assert_eq!(resource.to_string(), "configmap/app-config in namespace default");
    }
}
