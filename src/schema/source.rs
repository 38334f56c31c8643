//! Type-definition sources consumed by the schema resolver.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::node::MaxCardinality;
use crate::error::Result;

/// One element of a type definition.
///
/// `elements` carries inline children for backbone elements that have no
/// named type of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    #[serde(rename = "name")]
    pub element_name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: MaxCardinality,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementDefinition>,
}

impl ElementDefinition {
    pub fn new(
        element_name: impl Into<String>,
        declared_type: impl Into<String>,
        min: u32,
        max: MaxCardinality,
    ) -> Self {
        Self {
            element_name: element_name.into(),
            declared_type: declared_type.into(),
            min,
            max,
            elements: Vec::new(),
        }
    }

    pub fn with_elements(mut self, elements: Vec<ElementDefinition>) -> Self {
        self.elements = elements;
        self
    }
}

/// Backing store of type definitions.
///
/// `Ok(None)` means the type is unknown. Implementations may suspend (network,
/// disk); the resolver drops the lookup future when its timeout elapses.
#[async_trait]
pub trait TypeDefinitionSource: Send + Sync {
    async fn element_definitions(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<Vec<ElementDefinition>>>>;
}

/// Concurrent in-memory definition registry.
#[derive(Debug, Default)]
pub struct InMemoryTypeDefinitionSource {
    definitions: papaya::HashMap<String, Arc<Vec<ElementDefinition>>>,
}

impl InMemoryTypeDefinitionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load definitions from a JSON object mapping type names to element lists.
    ///
    /// ```json
    /// { "HumanName": [ { "name": "family", "type": "string", "max": "1" } ] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: HashMap<String, Vec<ElementDefinition>> = serde_json::from_str(json)?;
        let source = Self::new();
        for (type_name, elements) in parsed {
            source.register(type_name, elements);
        }
        tracing::debug!("Loaded {} type definitions", source.type_count());
        Ok(source)
    }

    /// Add or replace the definition of a type.
    pub fn register(&self, type_name: impl Into<String>, elements: Vec<ElementDefinition>) {
        self.definitions
            .pin()
            .insert(type_name.into(), Arc::new(elements));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.definitions.pin().contains_key(type_name)
    }

    pub fn type_count(&self) -> usize {
        self.definitions.len()
    }
}

#[async_trait]
impl TypeDefinitionSource for InMemoryTypeDefinitionSource {
    async fn element_definitions(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<Vec<ElementDefinition>>>> {
        Ok(self.definitions.pin().get(type_name).cloned())
    }
}
