//! Schema resolver - turns a type name into a field-schema tree.
//!
//! Composite element types are expanded recursively. The chain of types
//! currently being expanded is threaded through the recursion; an element
//! whose declared type is already on that chain is emitted without children
//! and marked [`ExpansionStop::Cycle`]. Root trees are cached per type name.

use std::collections::HashMap;
use std::sync::Arc;

use async_recursion::async_recursion;
use moka::future::Cache;

use super::node::{ExpansionStop, FieldSchemaNode, MaxCardinality};
use super::source::{ElementDefinition, TypeDefinitionSource};
use crate::core::{RulesConfig, SchemaCacheConfig};
use crate::error::{FhirRulesError, Result};

/// FHIR primitive types - never expanded
static PRIMITIVE_TYPES: &[&str] = &[
    "boolean",
    "integer",
    "integer64",
    "string",
    "decimal",
    "uri",
    "url",
    "canonical",
    "base64Binary",
    "instant",
    "date",
    "dateTime",
    "time",
    "code",
    "oid",
    "id",
    "markdown",
    "unsignedInt",
    "positiveInt",
    "uuid",
    "xhtml",
];

pub fn is_primitive_type(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&type_name) || type_name.starts_with("System.")
}

type DefinitionMemo = HashMap<String, Option<Arc<Vec<ElementDefinition>>>>;

/// Per-call expansion state: the ancestor chain and fetched definitions.
struct Expansion {
    ancestors: Vec<String>,
    memo: DefinitionMemo,
}

pub struct SchemaResolver {
    source: Arc<dyn TypeDefinitionSource>,
    cache: Cache<String, Arc<FieldSchemaNode>>,
    config: SchemaCacheConfig,
}

impl SchemaResolver {
    /// Resolver with default cache settings.
    ///
    /// The default 30 second lookup timeout uses `tokio::time`, so
    /// `resolve_schema` must be polled inside a Tokio runtime with the time
    /// driver enabled. Set `lookup_timeout` to `None` to resolve on other
    /// executors.
    pub fn new(source: Arc<dyn TypeDefinitionSource>) -> Self {
        Self::with_config(source, SchemaCacheConfig::default())
    }

    pub fn from_config(source: Arc<dyn TypeDefinitionSource>, config: &RulesConfig) -> Self {
        Self::with_config(source, config.schema_cache.clone())
    }

    pub fn with_config(source: Arc<dyn TypeDefinitionSource>, config: SchemaCacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        Self {
            source,
            cache: builder.build(),
            config,
        }
    }

    /// Resolve the field tree of `type_name`.
    ///
    /// Unknown types, source failures and lookup timeouts all yield `None`;
    /// `None` results are not cached. Concurrent first requests for the same
    /// type share one build.
    pub async fn resolve_schema(&self, type_name: &str) -> Option<Arc<FieldSchemaNode>> {
        if let Some(cached) = self.cache.get(type_name).await {
            tracing::debug!("Schema cache hit for {}", type_name);
            return Some(cached);
        }

        tracing::debug!("Schema cache miss for {}", type_name);
        self.cache
            .optionally_get_with(type_name.to_string(), self.build(type_name))
            .await
    }

    /// Drop the cached tree of one type.
    pub async fn invalidate(&self, type_name: &str) {
        self.cache.invalidate(type_name).await;
    }

    /// Drop every cached tree, e.g. after switching FHIR versions.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub async fn cached_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    async fn build(&self, type_name: &str) -> Option<Arc<FieldSchemaNode>> {
        let mut expansion = Expansion {
            ancestors: vec![type_name.to_string()],
            memo: HashMap::new(),
        };

        match self.build_root(type_name, &mut expansion).await {
            Ok(Some(root)) => {
                tracing::debug!(
                    "Resolved schema for {} with {} nodes ({} types fetched)",
                    type_name,
                    root.node_count(),
                    expansion.memo.len()
                );
                Some(Arc::new(root))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Schema for {} not resolved: {}", type_name, e);
                None
            }
        }
    }

    async fn build_root(
        &self,
        type_name: &str,
        expansion: &mut Expansion,
    ) -> Result<Option<FieldSchemaNode>> {
        let Some(definitions) = self.lookup(type_name, &mut expansion.memo).await? else {
            return Ok(None);
        };
        let children = self
            .expand_elements(type_name, &definitions, expansion, 1)
            .await?;

        Ok(Some(FieldSchemaNode {
            element_name: type_name.to_string(),
            path: type_name.to_string(),
            type_name: type_name.to_string(),
            min: 0,
            max: MaxCardinality::Unbounded,
            children,
            stopped: None,
        }))
    }

    /// Any failed lookup below the root fails the whole build, so a partial
    /// tree never reaches the cache.
    #[async_recursion]
    async fn expand_elements(
        &self,
        parent_path: &str,
        definitions: &[ElementDefinition],
        expansion: &mut Expansion,
        depth: usize,
    ) -> Result<Vec<FieldSchemaNode>> {
        let mut nodes = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let path = format!("{}.{}", parent_path, definition.element_name);
            let mut node = FieldSchemaNode {
                element_name: definition.element_name.clone(),
                path,
                type_name: definition.declared_type.clone(),
                min: definition.min,
                max: definition.max,
                children: Vec::new(),
                stopped: None,
            };

            if !definition.elements.is_empty() {
                // Inline backbone children
                if depth >= self.config.max_depth {
                    node.stopped = Some(ExpansionStop::DepthLimit);
                } else {
                    node.children = self
                        .expand_elements(&node.path, &definition.elements, expansion, depth + 1)
                        .await?;
                }
            } else if !is_primitive_type(&definition.declared_type) {
                self.expand_typed(&mut node, expansion, depth).await?;
            }

            nodes.push(node);
        }

        Ok(nodes)
    }

    async fn expand_typed(
        &self,
        node: &mut FieldSchemaNode,
        expansion: &mut Expansion,
        depth: usize,
    ) -> Result<()> {
        let type_name = node.type_name.clone();

        if expansion.ancestors.iter().any(|ancestor| *ancestor == type_name) {
            tracing::debug!("Cycle at {}: {} is already being expanded", node.path, type_name);
            node.stopped = Some(ExpansionStop::Cycle);
            return Ok(());
        }

        if depth >= self.config.max_depth {
            tracing::debug!("Depth limit {} reached at {}", self.config.max_depth, node.path);
            node.stopped = Some(ExpansionStop::DepthLimit);
            return Ok(());
        }

        // Types the source does not know stay leaves
        let Some(definitions) = self.lookup(&type_name, &mut expansion.memo).await? else {
            return Ok(());
        };

        expansion.ancestors.push(type_name);
        let children = self
            .expand_elements(&node.path, &definitions, expansion, depth + 1)
            .await;
        expansion.ancestors.pop();
        node.children = children?;
        Ok(())
    }

    async fn lookup(
        &self,
        type_name: &str,
        memo: &mut DefinitionMemo,
    ) -> Result<Option<Arc<Vec<ElementDefinition>>>> {
        if let Some(known) = memo.get(type_name) {
            return Ok(known.clone());
        }

        let request = self.source.element_definitions(type_name);
        let definitions = match self.config.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                FhirRulesError::definition_source(
                    type_name.to_string(),
                    format!("lookup timed out after {limit:?}"),
                )
            })??,
            None => request.await?,
        };

        memo.insert(type_name.to_string(), definitions.clone());
        Ok(definitions)
    }
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("cached_entries", &self.cache.entry_count())
            .field("config", &self.config)
            .finish()
    }
}
