pub mod config;

pub use config::{FhirVersion, RulesConfig, SchemaCacheConfig, SpecHintConfig};
