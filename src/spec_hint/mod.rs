//! Version-specific advisory hints.
//!
//! - [`catalog`] - [`SpecHintCatalog`] of expected-but-optional fields per version and resource type
//! - [`service`] - [`SpecHintService`] that checks parsed bundles against the catalog

pub mod catalog;
pub mod service;

pub use catalog::{SpecHintCatalog, SpecHintEntry};
pub use service::{IssueSeverity, SpecHintIssue, SpecHintService};
