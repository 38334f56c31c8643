//! Catalog of fields a FHIR version conventionally expects but does not require.
//!
//! Entries are keyed by (version, resource type). Paths are stored fully
//! qualified (`Encounter.class`); bare paths are qualified on insert.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::core::FhirVersion;
use crate::error::{FhirRulesError, Result};

/// One expected field and the reason shown when it is missing.
///
/// Templates may use `{version}`, `{resourceType}`, `{path}` and `{field}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecHintEntry {
    pub path: String,
    pub reason_template: String,
}

impl SpecHintEntry {
    pub fn new(path: impl Into<String>, reason_template: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason_template: reason_template.into(),
        }
    }

    /// Field path without the resource type prefix
    pub fn field(&self) -> &str {
        self.path
            .split_once('.')
            .map(|(_, field)| field)
            .unwrap_or(&self.path)
    }

    /// Render the reason. The qualified path and the version are appended
    /// when the template does not mention them, so every reason names both.
    pub fn render_reason(&self, version: FhirVersion, resource_type: &str) -> String {
        let template = &self.reason_template;
        let rendered = template
            .replace("{version}", version.label())
            .replace("{resourceType}", resource_type)
            .replace("{path}", &self.path)
            .replace("{field}", self.field());

        let names_field = template.contains("{path}") || template.contains("{field}");
        let names_version = template.contains("{version}");
        match (names_field, names_version) {
            (true, true) => rendered,
            (true, false) => format!("{rendered} (FHIR {})", version.label()),
            (false, true) => format!("{rendered} ({})", self.path),
            (false, false) => format!("{rendered} ({}, FHIR {})", self.path, version.label()),
        }
    }
}

type ResourceHints = HashMap<String, Vec<SpecHintEntry>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecHintCatalog {
    versions: HashMap<FhirVersion, ResourceHints>,
}

/// JSON layout: `{ "R4": { "Patient": [ { "path": ..., "reasonTemplate": ... } ] } }`
type CatalogDocument = HashMap<String, HashMap<String, Vec<SpecHintEntry>>>;

impl SpecHintCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog bundled with the crate (R4, R4B and R5).
    pub fn embedded() -> Self {
        EMBEDDED_CATALOG.clone()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)
            .map_err(|e| FhirRulesError::catalog_load(format!("invalid catalog JSON: {e}")))?;

        let mut catalog = Self::new();
        let mut seen: HashMap<FhirVersion, String> = HashMap::new();
        for (version_key, resources) in document {
            let version = FhirVersion::parse(&version_key).ok_or_else(|| {
                FhirRulesError::catalog_load(format!("unknown FHIR version '{version_key}'"))
            })?;
            // Entries for one version must come from a single key, otherwise
            // their order would depend on map iteration.
            if let Some(previous) = seen.get(&version) {
                let mut keys = [previous.as_str(), version_key.as_str()];
                keys.sort_unstable();
                return Err(FhirRulesError::catalog_load(format!(
                    "FHIR {} appears under more than one key ('{}', '{}')",
                    version.label(),
                    keys[0],
                    keys[1]
                )));
            }
            seen.insert(version, version_key.clone());

            for (resource_type, entries) in resources {
                for entry in entries {
                    catalog.insert(version, &resource_type, entry);
                }
            }
        }

        tracing::info!(
            "Loaded spec-hint catalog with {} entries across {} versions",
            catalog.entry_count(),
            catalog.versions.len()
        );
        Ok(catalog)
    }

    /// Read a catalog file in the [`from_json`](Self::from_json) format.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!("Reading spec-hint catalog from {}", path.display());
        Self::from_json(&content)
    }

    /// Append an entry, replacing any entry with the same qualified path.
    pub fn insert(&mut self, version: FhirVersion, resource_type: &str, entry: SpecHintEntry) {
        let entry = SpecHintEntry {
            path: qualify(resource_type, &entry.path),
            reason_template: entry.reason_template,
        };

        let entries = self
            .versions
            .entry(version)
            .or_default()
            .entry(resource_type.to_string())
            .or_default();
        match entries.iter_mut().find(|existing| existing.path == entry.path) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Overlay `other` on this catalog.
    pub fn merge(mut self, other: SpecHintCatalog) -> Self {
        let mut versions: Vec<_> = other.versions.into_iter().collect();
        versions.sort_by_key(|(version, _)| *version);

        for (version, resources) in versions {
            let mut resources: Vec<_> = resources.into_iter().collect();
            resources.sort_by(|a, b| a.0.cmp(&b.0));
            for (resource_type, entries) in resources {
                for entry in entries {
                    self.insert(version, &resource_type, entry);
                }
            }
        }
        self
    }

    pub fn supports(&self, version: FhirVersion) -> bool {
        self.versions.contains_key(&version)
    }

    /// Entries for a resource type, in catalog order. Unknown combinations are empty.
    pub fn entries(&self, version: FhirVersion, resource_type: &str) -> &[SpecHintEntry] {
        self.versions
            .get(&version)
            .and_then(|resources| resources.get(resource_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn versions(&self) -> Vec<FhirVersion> {
        let mut versions: Vec<_> = self.versions.keys().copied().collect();
        versions.sort();
        versions
    }

    pub fn entry_count(&self) -> usize {
        self.versions
            .values()
            .flat_map(|resources| resources.values())
            .map(Vec::len)
            .sum()
    }
}

fn qualify(resource_type: &str, path: &str) -> String {
    match path.strip_prefix(resource_type) {
        Some(rest) if rest.starts_with('.') => path.to_string(),
        _ => format!("{resource_type}.{path}"),
    }
}

type HintTable = &'static [(&'static str, &'static [(&'static str, &'static str)])];

const EXPECTED: &str =
    "{path} is optional in FHIR {version} but is expected by most exchange partners";
const MATCHING: &str =
    "{path} is optional in FHIR {version}; record matching across systems relies on it";
const STATUS: &str =
    "{path} is optional in FHIR {version}; without it consumers cannot tell whether the record is current";
const TIMING: &str =
    "{path} is optional in FHIR {version}; clinical timelines cannot place the record without it";

#[cfg(feature = "embedded-catalog")]
const R4_HINTS: HintTable = &[
    (
        "Patient",
        &[
            ("identifier", MATCHING),
            ("name", MATCHING),
            ("gender", EXPECTED),
            ("birthDate", MATCHING),
        ],
    ),
    (
        "Encounter",
        &[
            ("subject", EXPECTED),
            ("period", TIMING),
            ("type", EXPECTED),
        ],
    ),
    (
        "Observation",
        &[
            ("category", EXPECTED),
            ("subject", EXPECTED),
            ("effective[x]", TIMING),
            ("performer", EXPECTED),
        ],
    ),
    (
        "Condition",
        &[
            ("clinicalStatus", STATUS),
            ("verificationStatus", STATUS),
            ("code", EXPECTED),
            ("onset[x]", TIMING),
        ],
    ),
    (
        "AllergyIntolerance",
        &[
            ("clinicalStatus", STATUS),
            ("verificationStatus", STATUS),
            ("code", EXPECTED),
        ],
    ),
    (
        "MedicationRequest",
        &[
            ("authoredOn", TIMING),
            ("requester", EXPECTED),
            ("dosageInstruction", EXPECTED),
        ],
    ),
    (
        "Procedure",
        &[("code", EXPECTED), ("performed[x]", TIMING)],
    ),
    (
        "DiagnosticReport",
        &[
            ("effective[x]", TIMING),
            ("issued", TIMING),
            ("performer", EXPECTED),
        ],
    ),
    ("Practitioner", &[("identifier", MATCHING), ("name", EXPECTED)]),
    ("Organization", &[("identifier", MATCHING), ("name", EXPECTED)]),
];

#[cfg(feature = "embedded-catalog")]
const R5_HINTS: HintTable = &[
    (
        "Patient",
        &[
            ("identifier", MATCHING),
            ("name", MATCHING),
            ("gender", EXPECTED),
            ("birthDate", MATCHING),
        ],
    ),
    (
        "Encounter",
        &[
            (
                "class",
                "{path} became 0..* in FHIR {version}; most systems still expect the encounter class",
            ),
            ("subject", EXPECTED),
            ("actualPeriod", TIMING),
            ("type", EXPECTED),
        ],
    ),
    (
        "Observation",
        &[
            ("category", EXPECTED),
            ("subject", EXPECTED),
            ("effective[x]", TIMING),
            ("performer", EXPECTED),
        ],
    ),
    (
        "Condition",
        &[
            ("verificationStatus", STATUS),
            ("code", EXPECTED),
            ("onset[x]", TIMING),
        ],
    ),
    (
        "AllergyIntolerance",
        &[
            ("clinicalStatus", STATUS),
            ("verificationStatus", STATUS),
            ("code", EXPECTED),
        ],
    ),
    (
        "MedicationRequest",
        &[
            ("authoredOn", TIMING),
            ("requester", EXPECTED),
            ("dosageInstruction", EXPECTED),
        ],
    ),
    (
        "Procedure",
        &[("code", EXPECTED), ("occurrence[x]", TIMING)],
    ),
    (
        "DiagnosticReport",
        &[
            ("effective[x]", TIMING),
            ("issued", TIMING),
            ("performer", EXPECTED),
        ],
    ),
    ("Practitioner", &[("identifier", MATCHING), ("name", EXPECTED)]),
    ("Organization", &[("identifier", MATCHING), ("name", EXPECTED)]),
];

// R4B shares the R4 expectations
#[cfg(feature = "embedded-catalog")]
const EMBEDDED_TABLES: &[(FhirVersion, HintTable)] = &[
    (FhirVersion::R4, R4_HINTS),
    (FhirVersion::R4B, R4_HINTS),
    (FhirVersion::R5, R5_HINTS),
];

#[cfg(not(feature = "embedded-catalog"))]
const EMBEDDED_TABLES: &[(FhirVersion, HintTable)] = &[];

static EMBEDDED_CATALOG: Lazy<SpecHintCatalog> = Lazy::new(|| {
    let mut catalog = SpecHintCatalog::new();
    for (version, table) in EMBEDDED_TABLES {
        for (resource_type, hints) in table.iter() {
            for (path, reason) in hints.iter() {
                catalog.insert(*version, resource_type, SpecHintEntry::new(*path, *reason));
            }
        }
    }
    tracing::debug!(
        "Built embedded spec-hint catalog with {} entries",
        catalog.entry_count()
    );
    catalog
});
