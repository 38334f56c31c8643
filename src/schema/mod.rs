//! Schema resolution.
//!
//! - [`node`] - resolved [`FieldSchemaNode`] trees and cardinality
//! - [`source`] - the [`TypeDefinitionSource`] collaborator and an in-memory implementation
//! - [`resolver`] - [`SchemaResolver`] with cycle protection and per-type caching

pub mod node;
pub mod resolver;
pub mod source;

pub use node::{ExpansionStop, FieldSchemaNode, MaxCardinality};
pub use resolver::{SchemaResolver, is_primitive_type};
pub use source::{ElementDefinition, InMemoryTypeDefinitionSource, TypeDefinitionSource};
