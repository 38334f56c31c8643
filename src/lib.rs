//! # OctoFHIR FHIR Rules
//!
//! Building blocks for validating FHIR bundles against user-authored rules and
//! version-specific advisory hints.
//!
//! ## Features
//!
//! - **Rule identity**: canonical keys for deduplicating and caching rules
//! - **Instance scopes**: select which occurrences of a repeating field a rule checks
//! - **Schema resolution**: cycle-safe, cached field trees for any type name
//! - **Spec hints**: advisory warnings for fields a FHIR version expects but does not require
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_fhirrules::*;
//!
//! # async fn example() -> Result<()> {
//! let rule = RuleDefinition::new("r1", "Required", "Patient", "name.family")?
//!     .with_scope(InstanceScope::FirstInstance);
//! assert_eq!(RuleIdentity::key(&rule), "Required|name.family|first");
//!
//! let bundle = JsonBundle::from_json(r#"{"resourceType": "Encounter", "status": "finished"}"#)?;
//! let issues = SpecHintService::embedded().check(&bundle, "R5").await;
//! for issue in &issues {
//!     println!("{} {}: {}", issue.severity, issue.path, issue.reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`rules`] - rule definitions, instance scopes and identity
//! - [`schema`] - type-definition sources and the schema resolver
//! - [`bundle`] - parsed-bundle traits and a JSON implementation
//! - [`spec_hint`] - the spec-hint catalog and service
//! - [`core`] - configuration and FHIR versions

pub mod bundle;
pub mod core;
pub mod error;
pub mod rules;
pub mod schema;
pub mod spec_hint;

pub use bundle::{BundleResource, JsonBundle, JsonResource, ParsedBundle};
pub use core::{FhirVersion, RulesConfig, SchemaCacheConfig, SpecHintConfig};
pub use error::{FhirRulesError, Result};
pub use rules::{
    CompiledRuleCache, InstanceCondition, InstanceScope, RuleDefinition, RuleDuplicate,
    RuleIdentity, RuleIdentityParts, RuleSet, instance_scope_equals, select_instances,
};
pub use schema::{
    ElementDefinition, ExpansionStop, FieldSchemaNode, InMemoryTypeDefinitionSource,
    MaxCardinality, SchemaResolver, TypeDefinitionSource, is_primitive_type,
};
pub use spec_hint::{IssueSeverity, SpecHintCatalog, SpecHintEntry, SpecHintIssue, SpecHintService};
