//! Identity-based rule deduplication and compiled-rule caching.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use moka::future::Cache;

use super::definition::RuleDefinition;
use super::identity::{RuleIdentity, RuleIdentityParts};
use crate::error::FhirRulesError;

/// Insertion-ordered rule collection that keeps one rule per identity.
///
/// A rule whose identity matches an earlier one is recorded as a duplicate of
/// it instead of being added.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<RuleDefinition>,
    index: HashMap<RuleIdentityParts, usize>,
    duplicates: Vec<RuleDuplicate>,
}

/// A rule merged into an earlier, equivalent rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDuplicate {
    pub identity_key: String,
    /// Id of the rule that was kept
    pub kept_id: String,
    pub duplicate: RuleDefinition,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the rule was new, false if it duplicated a kept rule.
    pub fn insert(&mut self, rule: RuleDefinition) -> bool {
        let parts = RuleIdentity::parts(&rule);
        if let Some(&position) = self.index.get(&parts) {
            let key = parts.key();
            tracing::debug!(
                "Rule '{}' duplicates '{}' ({})",
                rule.id,
                self.rules[position].id,
                key
            );
            self.duplicates.push(RuleDuplicate {
                identity_key: key,
                kept_id: self.rules[position].id.clone(),
                duplicate: rule,
            });
            return false;
        }

        self.index.insert(parts, self.rules.len());
        self.rules.push(rule);
        true
    }

    /// The kept rule equivalent to `rule`, if any.
    pub fn find_equivalent(&self, rule: &RuleDefinition) -> Option<&RuleDefinition> {
        self.index
            .get(&RuleIdentity::parts(rule))
            .map(|&position| &self.rules[position])
    }

    /// First kept rule whose joined identity key is `identity_key`.
    pub fn get(&self, identity_key: &str) -> Option<&RuleDefinition> {
        self.rules
            .iter()
            .find(|rule| RuleIdentity::key(rule) == identity_key)
    }

    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn duplicates(&self) -> &[RuleDuplicate] {
        &self.duplicates
    }

    pub fn for_resource_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a RuleDefinition> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.resource_type == resource_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<RuleDefinition> for RuleSet {
    fn from_iter<I: IntoIterator<Item = RuleDefinition>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

/// Cache of compiled rule artifacts keyed by rule identity components.
///
/// Equivalent rules share a single compiled value. Concurrent requests for the
/// same identity wait on one compilation.
pub struct CompiledRuleCache<T> {
    cache: Cache<RuleIdentityParts, Arc<T>>,
}

impl<T: Send + Sync + 'static> CompiledRuleCache<T> {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::new(max_capacity),
        }
    }

    pub async fn get_or_compile<F, Fut>(&self, rule: &RuleDefinition, compile: F) -> Arc<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = RuleIdentity::parts(rule);
        self.cache
            .get_with(key, async move { Arc::new(compile().await) })
            .await
    }

    /// Like [`get_or_compile`](Self::get_or_compile); failures are not cached.
    pub async fn try_get_or_compile<F, Fut>(
        &self,
        rule: &RuleDefinition,
        compile: F,
    ) -> Result<Arc<T>, Arc<FhirRulesError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let key = RuleIdentity::parts(rule);
        self.cache
            .try_get_with(key, async move { compile().await.map(Arc::new) })
            .await
    }

    pub async fn get(&self, rule: &RuleDefinition) -> Option<Arc<T>> {
        self.cache.get(&RuleIdentity::parts(rule)).await
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl<T: Send + Sync + 'static> Default for CompiledRuleCache<T> {
    fn default() -> Self {
        Self::new(10_000)
    }
}
