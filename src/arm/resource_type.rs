//! ARM resource types: `Namespace/type[/childType...]`

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{ArmError, ArmResult};

/// Namespace owning subscriptions and resource groups
pub const RESOURCES_NAMESPACE: &str = "Microsoft.Resources";

/// Namespace owned by this resource provider
pub const PROVIDER_NAMESPACE: &str = "Microsoft.RedHatOpenShift";

/// A resource type. Comparison and hashing ignore case.
#[derive(Debug, Clone)]
pub struct ResourceType {
    namespace: String,
    types: Vec<String>,
}

impl ResourceType {
    /// Build a resource type from a namespace and its type segments.
    pub fn new(namespace: impl Into<String>, types: &[&str]) -> Self {
        Self {
            namespace: namespace.into(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Parse `Namespace/type[/childType...]`.
    pub fn parse(s: &str) -> ArmResult<Self> {
        let mut parts = s.split('/');
        let namespace = parts.next().unwrap_or_default();
        let types: Vec<String> = parts.map(str::to_string).collect();

        if namespace.is_empty() || types.is_empty() || types.iter().any(|t| t.is_empty()) {
            return Err(ArmError::InvalidResourceType(s.to_string()));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            types,
        })
    }

    pub fn subscriptions() -> Self {
        Self::new(RESOURCES_NAMESPACE, &["subscriptions"])
    }

    pub fn resource_groups() -> Self {
        Self::new(RESOURCES_NAMESPACE, &["resourceGroups"])
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// The innermost type segment, e.g. `nodePools`.
    pub fn last_type(&self) -> &str {
        self.types.last().map(String::as_str).unwrap_or_default()
    }

    /// A nested type under this one.
    pub fn child(&self, type_name: &str) -> Self {
        let mut types = self.types.clone();
        types.push(type_name.to_string());
        Self {
            namespace: self.namespace.clone(),
            types,
        }
    }

    pub fn is_subscription(&self) -> bool {
        self == &Self::subscriptions()
    }

    pub fn is_resource_group(&self) -> bool {
        self == &Self::resource_groups()
    }

    /// Whether this type lives in the given namespace (case-insensitive).
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.eq_ignore_ascii_case(namespace)
    }

    /// Whether this is a subscription or resource group scope rather than a
    /// provider resource.
    pub fn is_resources_scope(&self) -> bool {
        self.in_namespace(RESOURCES_NAMESPACE)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace)?;
        for t in &self.types {
            write!(f, "/{}", t)?;
        }
        Ok(())
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.namespace.eq_ignore_ascii_case(&other.namespace)
            && self.types.len() == other.types.len()
            && self
                .types
                .iter()
                .zip(&other.types)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().to_ascii_lowercase().hash(state);
    }
}

impl FromStr for ResourceType {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
