//! Hierarchical ARM resource identifiers
//!
//! Accepted forms:
//!
//! ```text
//! /subscriptions/{sub}
//! /subscriptions/{sub}/resourceGroups/{rg}
//! /subscriptions/{sub}[/resourceGroups/{rg}]/providers/{ns}/{type}/{name}[/{childType}/{childName}]*
//! ```
//!
//! Parsing preserves the caller's casing for display. Equality, ordering and
//! hashing ignore case, and every key derived from an ID is lowercase.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{ArmError, ArmResult};
use super::resource_type::ResourceType;

/// A parsed resource identifier. Immutable; derived IDs are new values.
#[derive(Debug, Clone)]
pub struct ResourceId {
    id: String,
    parent: Option<Arc<ResourceId>>,
    subscription_id: String,
    resource_group_name: Option<String>,
    resource_type: ResourceType,
    name: String,
}

impl ResourceId {
    /// Parse a resource path.
    pub fn parse(input: &str) -> ArmResult<Self> {
        let trimmed = input.strip_suffix('/').unwrap_or(input);
        let rest = trimmed
            .strip_prefix('/')
            .ok_or_else(|| ArmError::malformed(input, "must start with '/'"))?;

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ArmError::malformed(input, "empty path segment"));
        }
        if parts.len() < 2 || !parts[0].eq_ignore_ascii_case("subscriptions") {
            return Err(ArmError::malformed(
                input,
                "must begin with /subscriptions/{subscriptionId}",
            ));
        }

        let mut current = Self {
            id: format!("/{}/{}", parts[0], parts[1]),
            parent: None,
            subscription_id: parts[1].to_string(),
            resource_group_name: None,
            resource_type: ResourceType::subscriptions(),
            name: parts[1].to_string(),
        };

        let mut i = 2;
        while i < parts.len() {
            let segment = parts[i];

            if segment.eq_ignore_ascii_case("resourceGroups") {
                if !current.resource_type.is_subscription() {
                    return Err(ArmError::malformed(
                        input,
                        "resourceGroups must directly follow a subscription",
                    ));
                }
                let name = parts
                    .get(i + 1)
                    .ok_or_else(|| ArmError::malformed(input, "resource group name is required"))?;
                current = current.nest(
                    format!("{}/{}", segment, name),
                    ResourceType::resource_groups(),
                    name,
                );
                i += 2;
            } else if segment.eq_ignore_ascii_case("providers") {
                if !current.resource_type.is_resources_scope() {
                    return Err(ArmError::malformed(
                        input,
                        "providers is only valid under a subscription or resource group",
                    ));
                }
                let (namespace, type_name, name) =
                    match (parts.get(i + 1), parts.get(i + 2), parts.get(i + 3)) {
                        (Some(ns), Some(t), Some(n)) => (*ns, *t, *n),
                        _ => {
                            return Err(ArmError::malformed(
                                input,
                                "providers must be followed by a namespace, a type and a name",
                            ))
                        }
                    };
                current = current.nest(
                    format!("{}/{}/{}/{}", segment, namespace, type_name, name),
                    ResourceType::new(namespace, &[type_name]),
                    name,
                );
                i += 4;
            } else {
                if current.resource_type.is_resources_scope() {
                    return Err(ArmError::malformed(
                        input,
                        format!("unexpected segment '{}'", segment),
                    ));
                }
                let name = parts.get(i + 1).ok_or_else(|| {
                    ArmError::malformed(input, format!("resource type '{}' has no name", segment))
                })?;
                let resource_type = current.resource_type.child(segment);
                current = current.nest(format!("{}/{}", segment, name), resource_type, name);
                i += 2;
            }
        }

        Ok(current)
    }

    /// `/subscriptions/{subscription_id}`
    pub fn subscription(subscription_id: &str) -> ArmResult<Self> {
        Self::parse(&format!("/subscriptions/{}", subscription_id))
    }

    /// `/subscriptions/{subscription_id}/resourceGroups/{resource_group}`
    pub fn resource_group(subscription_id: &str, resource_group: &str) -> ArmResult<Self> {
        Self::parse(&format!(
            "/subscriptions/{}/resourceGroups/{}",
            subscription_id, resource_group
        ))
    }

    fn nest(self, suffix: String, resource_type: ResourceType, name: &str) -> Self {
        let resource_group_name = if resource_type.is_resource_group() {
            Some(name.to_string())
        } else {
            self.resource_group_name.clone()
        };
        Self {
            id: format!("{}/{}", self.id, suffix),
            subscription_id: self.subscription_id.clone(),
            resource_group_name,
            resource_type,
            name: name.to_string(),
            parent: Some(Arc::new(self)),
        }
    }

    /// Derive the ID of a resource nested one level below this one.
    ///
    /// A provider-typed scope never switches namespace; subscription and
    /// resource group scopes gain a `providers/{namespace}` segment.
    pub fn child(&self, resource_type: &ResourceType, name: &str) -> ArmResult<Self> {
        if name.is_empty() {
            return Err(ArmError::InvalidArgument("resource name is required".into()));
        }
        if name.contains('/') {
            return Err(ArmError::InvalidArgument(format!(
                "resource name '{}' must not contain '/'",
                name
            )));
        }

        let path = if resource_type.is_resource_group() {
            if !self.resource_type.is_subscription() {
                return Err(ArmError::InvalidArgument(format!(
                    "resource groups can only be nested under a subscription, not '{}'",
                    self.id
                )));
            }
            format!("{}/resourceGroups/{}", self.id, name)
        } else if self.resource_type.is_resources_scope() {
            if resource_type.is_resources_scope() || resource_type.types().len() != 1 {
                return Err(ArmError::InvalidArgument(format!(
                    "'{}' is not a top-level provider type",
                    resource_type
                )));
            }
            format!(
                "{}/providers/{}/{}/{}",
                self.id,
                resource_type.namespace(),
                resource_type.last_type(),
                name
            )
        } else {
            if !resource_type.in_namespace(self.resource_type.namespace()) {
                return Err(ArmError::NamespaceSwitch {
                    from: self.resource_type.namespace().to_string(),
                    to: resource_type.namespace().to_string(),
                });
            }
            if resource_type.types().len() != self.resource_type.types().len() + 1 {
                return Err(ArmError::InvalidArgument(format!(
                    "'{}' is not a direct child type of '{}'",
                    resource_type, self.resource_type
                )));
            }
            format!("{}/{}/{}", self.id, resource_type.last_type(), name)
        };

        Self::parse(&path)
    }

    /// The enclosing resource, or `None` for a subscription.
    pub fn parent(&self) -> Option<&ResourceId> {
        self.parent.as_deref()
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group_name(&self) -> Option<&str> {
        self.resource_group_name.as_deref()
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical path, in the casing it was parsed with.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Number of `/` separators in the path.
    pub fn depth(&self) -> usize {
        self.id.matches('/').count()
    }

    /// Whether `self` sits strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ResourceId) -> bool {
        let own = self.id.to_ascii_lowercase();
        let prefix = format!("{}/", ancestor.id.to_ascii_lowercase());
        own.starts_with(&prefix)
    }

    /// Whether `self` equals `scope` or sits below it.
    pub fn is_within(&self, scope: &ResourceId) -> bool {
        self == scope || self.is_descendant_of(scope)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id)
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.to_ascii_lowercase().hash(state);
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .to_ascii_lowercase()
            .cmp(&other.id.to_ascii_lowercase())
    }
}

impl FromStr for ResourceId {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
