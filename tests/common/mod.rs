//! Common test utilities: fixture loading and source helpers.

use async_trait::async_trait;
use octofhir_fhirrules::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Get the fixtures directory path.
fn get_fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("tests").join("fixtures")
}

/// Read a fixture file as a string.
#[allow(dead_code)]
pub fn load_fixture(path: &str) -> String {
    let full_path = get_fixtures_dir().join(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", full_path.display()))
}

/// In-memory source loaded with the fixture type definitions.
#[allow(dead_code)]
pub fn fixture_source() -> Arc<InMemoryTypeDefinitionSource> {
    Arc::new(
        InMemoryTypeDefinitionSource::from_json(&load_fixture("type_definitions.json"))
            .expect("fixture type definitions parse"),
    )
}

#[allow(dead_code)]
pub fn load_bundle(path: &str) -> JsonBundle {
    JsonBundle::from_json(&load_fixture(path)).expect("fixture bundle parses")
}

/// Wraps a source and counts lookups per call.
#[allow(dead_code)]
pub struct CountingSource {
    inner: Arc<dyn TypeDefinitionSource>,
    pub lookups: AtomicUsize,
    pub delay: Option<Duration>,
}

#[allow(dead_code)]
impl CountingSource {
    pub fn new(inner: Arc<dyn TypeDefinitionSource>) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypeDefinitionSource for CountingSource {
    async fn element_definitions(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<Vec<ElementDefinition>>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.element_definitions(type_name).await
    }
}

/// Source that fails every lookup.
#[allow(dead_code)]
pub struct FailingSource;

#[async_trait]
impl TypeDefinitionSource for FailingSource {
    async fn element_definitions(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<Vec<ElementDefinition>>>> {
        Err(FhirRulesError::definition_source(
            type_name,
            "definition store unavailable",
        ))
    }
}

/// Fails lookups of one type a fixed number of times, then delegates.
#[allow(dead_code)]
pub struct FlakySource {
    inner: Arc<dyn TypeDefinitionSource>,
    failing_type: String,
    failures_left: AtomicUsize,
}

#[allow(dead_code)]
impl FlakySource {
    pub fn new(inner: Arc<dyn TypeDefinitionSource>, failing_type: &str, failures: usize) -> Self {
        Self {
            inner,
            failing_type: failing_type.to_string(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl TypeDefinitionSource for FlakySource {
    async fn element_definitions(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<Vec<ElementDefinition>>>> {
        if type_name == self.failing_type
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(FhirRulesError::definition_source(
                type_name,
                "temporarily unavailable",
            ));
        }
        self.inner.element_definitions(type_name).await
    }
}
