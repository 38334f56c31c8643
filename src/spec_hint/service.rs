//! Spec-hint checks over parsed bundles.
//!
//! Every catalogued path that a record leaves empty produces one advisory
//! issue. Issues are always warnings and follow bundle-entry order, then
//! catalog order within an entry.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::catalog::SpecHintCatalog;
use crate::bundle::{BundleResource, ParsedBundle};
use crate::core::{FhirVersion, RulesConfig, SpecHintConfig};
use crate::schema::SchemaResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        }
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory issue for a conventionally expected field that is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecHintIssue {
    pub resource_type: String,
    /// Fully qualified path, e.g. `Encounter.class`
    pub path: String,
    pub severity: IssueSeverity,
    pub reason: String,
    /// Position of the record among the bundle's typed entries
    pub entry_index: usize,
}

pub struct SpecHintService {
    catalog: Arc<SpecHintCatalog>,
    resolver: Option<Arc<SchemaResolver>>,
    config: SpecHintConfig,
    /// Version used by [`check_configured`](Self::check_configured)
    fhir_version: FhirVersion,
}

impl SpecHintService {
    pub fn new(catalog: Arc<SpecHintCatalog>) -> Self {
        Self {
            catalog,
            resolver: None,
            config: SpecHintConfig::default(),
            fhir_version: FhirVersion::default(),
        }
    }

    /// Service whose concurrency and default version come from `config`.
    pub fn from_config(catalog: Arc<SpecHintCatalog>, config: &RulesConfig) -> Self {
        Self {
            fhir_version: config.fhir_version,
            ..Self::new(catalog).with_config(config.spec_hint.clone())
        }
    }

    /// Service over the catalog bundled with the crate.
    pub fn embedded() -> Self {
        Self::new(Arc::new(SpecHintCatalog::embedded()))
    }

    pub fn with_config(mut self, config: SpecHintConfig) -> Self {
        self.config = config;
        self
    }

    /// Use resolved schemas to skip catalog paths a type does not declare.
    pub fn with_schema_resolver(mut self, resolver: Arc<SchemaResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn catalog(&self) -> &SpecHintCatalog {
        &self.catalog
    }

    /// Check every entry of `bundle` against the catalog for `spec_version`.
    ///
    /// Unknown or uncatalogued versions yield no issues.
    pub async fn check(&self, bundle: &dyn ParsedBundle, spec_version: &str) -> Vec<SpecHintIssue> {
        let Some(version) = FhirVersion::parse(spec_version) else {
            tracing::debug!("No spec hints for unrecognised version '{}'", spec_version);
            return Vec::new();
        };
        self.check_version(bundle, version).await
    }

    /// Check against the version this service was configured with.
    pub async fn check_configured(&self, bundle: &dyn ParsedBundle) -> Vec<SpecHintIssue> {
        self.check_version(bundle, self.fhir_version).await
    }

    pub async fn check_version(
        &self,
        bundle: &dyn ParsedBundle,
        version: FhirVersion,
    ) -> Vec<SpecHintIssue> {
        if !self.catalog.supports(version) {
            tracing::debug!("No spec-hint catalog for FHIR {}", version.label());
            return Vec::new();
        }

        let resources = bundle.resources();
        let concurrency = self.config.max_concurrency.max(1);

        // `buffered` yields results in input order
        let per_entry: Vec<Vec<SpecHintIssue>> = stream::iter(resources.into_iter().enumerate())
            .map(|(index, resource)| self.check_resource(index, resource, version))
            .buffered(concurrency)
            .collect()
            .await;

        let issues: Vec<SpecHintIssue> = per_entry.into_iter().flatten().collect();
        if !issues.is_empty() {
            tracing::debug!(
                "Spec hints for FHIR {}: {} issue(s)",
                version.label(),
                issues.len()
            );
        }
        issues
    }

    async fn check_resource(
        &self,
        index: usize,
        resource: &dyn BundleResource,
        version: FhirVersion,
    ) -> Vec<SpecHintIssue> {
        let resource_type = resource.resource_type();
        let entries = self.catalog.entries(version, resource_type);
        if entries.is_empty() {
            return Vec::new();
        }

        let schema = match &self.resolver {
            Some(resolver) if self.config.check_paths_against_schema => {
                resolver.resolve_schema(resource_type).await
            }
            _ => None,
        };

        let mut issues = Vec::new();
        for entry in entries {
            if let Some(schema) = &schema
                && schema.find(&entry.path).is_none()
            {
                tracing::debug!(
                    "Skipping hint {}: not declared by the {} schema",
                    entry.path,
                    resource_type
                );
                continue;
            }

            if !resource.has_value_at(&entry.path) {
                issues.push(SpecHintIssue {
                    resource_type: resource_type.to_string(),
                    path: entry.path.clone(),
                    severity: IssueSeverity::Warning,
                    reason: entry.render_reason(version, resource_type),
                    entry_index: index,
                });
            }
        }
        issues
    }
}

impl std::fmt::Debug for SpecHintService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecHintService")
            .field("catalog_entries", &self.catalog.entry_count())
            .field("has_resolver", &self.resolver.is_some())
            .field("fhir_version", &self.fhir_version)
            .field("config", &self.config)
            .finish()
    }
}
