//! Rule model: definitions, instance scopes and identity.
//!
//! - [`scope`] - [`InstanceScope`] variants and occurrence selection
//! - [`definition`] - [`RuleDefinition`]
//! - [`identity`] - [`RuleIdentity`] keys, digests and equality
//! - [`registry`] - [`RuleSet`] deduplication and [`CompiledRuleCache`]

pub mod definition;
pub mod identity;
pub mod registry;
pub mod scope;

pub use definition::RuleDefinition;
pub use identity::{RuleIdentity, RuleIdentityParts};
pub use registry::{CompiledRuleCache, RuleDuplicate, RuleSet};
pub use scope::{InstanceCondition, InstanceScope, instance_scope_equals, select_instances};
