use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{FhirRulesError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesConfig {
    pub fhir_version: FhirVersion,
    #[serde(default)]
    pub schema_cache: SchemaCacheConfig,
    #[serde(default)]
    pub spec_hint: SpecHintConfig,
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum FhirVersion {
    #[default]
    #[serde(rename = "4.0.1")]
    R4,
    #[serde(rename = "4.3.0")]
    R4B,
    #[serde(rename = "5.0.0")]
    R5,
    #[serde(rename = "6.0.0-ballot3")]
    R6,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaCacheConfig {
    /// Upper bound on cached root schemas
    pub max_capacity: u64,
    /// `None` keeps entries for the lifetime of the resolver
    pub time_to_live: Option<Duration>,
    /// Hard cap on expansion depth, checked after the ancestor-path cycle test
    pub max_depth: usize,
    /// Applied to each type-definition lookup; `None` waits indefinitely
    pub lookup_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecHintConfig {
    /// Number of bundle entries checked concurrently
    pub max_concurrency: usize,
    /// Skip catalog paths that the resolved schema does not declare
    pub check_paths_against_schema: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            fhir_version: FhirVersion::default(),
            schema_cache: SchemaCacheConfig::default(),
            spec_hint: SpecHintConfig::default(),
        }
    }
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 500,
            time_to_live: None,
            max_depth: 32,
            lookup_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Default for SpecHintConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get(),
            check_paths_against_schema: true,
        }
    }
}

impl RulesConfig {
    pub fn for_version(version: FhirVersion) -> Self {
        Self {
            fhir_version: version,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON document. Missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&content)
    }

    pub fn with_schema_cache(mut self, schema_cache: SchemaCacheConfig) -> Self {
        self.schema_cache = schema_cache;
        self
    }

    pub fn with_spec_hint(mut self, spec_hint: SpecHintConfig) -> Self {
        self.spec_hint = spec_hint;
        self
    }
}

impl SchemaCacheConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_time_to_live(mut self, ttl: Option<Duration>) -> Self {
        self.time_to_live = ttl;
        self
    }
}

impl SpecHintConfig {
    pub fn sequential() -> Self {
        Self {
            max_concurrency: 1,
            ..Default::default()
        }
    }

    pub fn with_schema_path_check(mut self, enabled: bool) -> Self {
        self.check_paths_against_schema = enabled;
        self
    }
}

impl std::fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.package_version())
    }
}

impl std::str::FromStr for FhirVersion {
    type Err = FhirRulesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| FhirRulesError::invalid_fhir_version(s))
    }
}

impl FhirVersion {
    /// Get all supported FHIR versions
    pub fn all() -> &'static [FhirVersion] {
        &[
            FhirVersion::R4,
            FhirVersion::R4B,
            FhirVersion::R5,
            FhirVersion::R6,
        ]
    }

    /// Accepts "R4"/"r4b", full package versions ("4.0.1") and major.minor prefixes ("4.3").
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::all().iter().copied().find(|version| {
            value.eq_ignore_ascii_case(version.label())
                || value == version.package_version()
                || value == version.major_minor()
        })
    }

    /// Get the package version for this FHIR version
    pub fn package_version(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "4.0.1",
            FhirVersion::R4B => "4.3.0",
            FhirVersion::R5 => "5.0.0",
            FhirVersion::R6 => "6.0.0-ballot3",
        }
    }

    fn major_minor(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "4.0",
            FhirVersion::R4B => "4.3",
            FhirVersion::R5 => "5.0",
            FhirVersion::R6 => "6.0",
        }
    }

    /// Release label used in messages (e.g., "R4", "R4B")
    pub fn label(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "R4",
            FhirVersion::R4B => "R4B",
            FhirVersion::R5 => "R5",
            FhirVersion::R6 => "R6",
        }
    }
}
