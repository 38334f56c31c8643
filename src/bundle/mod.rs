//! Parsed bundle collaborator.
//!
//! The spec-hint service only needs each entry's resource type and a path
//! presence query. [`JsonBundle`] provides both over `serde_json` trees; other
//! parsers can implement [`ParsedBundle`] directly.

pub mod navigation;

use serde_json::Value;

use crate::error::Result;

/// One typed record of a bundle.
pub trait BundleResource: Send + Sync {
    fn resource_type(&self) -> &str;

    /// True if `path` reaches a present value. Repeating fields are present
    /// when at least one element is. The path may start with the resource
    /// type (`Encounter.status`) or omit it (`status`).
    fn has_value_at(&self, path: &str) -> bool;
}

/// Read-only view of a bundle's entries, in bundle order.
pub trait ParsedBundle: Send + Sync {
    fn resources(&self) -> Vec<&dyn BundleResource>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonResource {
    resource_type: String,
    value: Value,
}

impl JsonResource {
    /// Returns `None` when `value` carries no `resourceType`.
    pub fn from_value(value: Value) -> Option<Self> {
        let resource_type = value.get("resourceType")?.as_str()?.to_string();
        Some(Self {
            resource_type,
            value,
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl BundleResource for JsonResource {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn has_value_at(&self, path: &str) -> bool {
        let relative = match path.strip_prefix(self.resource_type.as_str()) {
            Some("") => return true,
            Some(rest) if rest.starts_with('.') => &rest[1..],
            _ => path,
        };
        navigation::has_value_at(&self.value, relative)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBundle {
    resources: Vec<JsonResource>,
}

impl JsonBundle {
    /// Build from a FHIR `Bundle` (`entry[].resource`) or a single resource,
    /// which is treated as a bundle of one. Entries without a typed resource
    /// are skipped.
    pub fn from_value(value: Value) -> Self {
        let is_bundle = value.get("resourceType").and_then(Value::as_str) == Some("Bundle");
        if !is_bundle {
            return Self {
                resources: JsonResource::from_value(value).into_iter().collect(),
            };
        }

        let Value::Object(mut bundle) = value else {
            return Self::default();
        };
        let entries = match bundle.remove("entry") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        };

        let mut resources = Vec::with_capacity(entries.len());
        for (index, mut entry) in entries.into_iter().enumerate() {
            let resource = entry
                .get_mut("resource")
                .map(Value::take)
                .and_then(JsonResource::from_value);
            match resource {
                Some(resource) => resources.push(resource),
                None => tracing::debug!("Skipping bundle entry {} without a typed resource", index),
            }
        }

        Self { resources }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_value(serde_json::from_str(json)?))
    }

    pub fn push(&mut self, resource: JsonResource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ParsedBundle for JsonBundle {
    fn resources(&self) -> Vec<&dyn BundleResource> {
        self.resources
            .iter()
            .map(|resource| resource as &dyn BundleResource)
            .collect()
    }
}
