//! Canonical rule identity.
//!
//! The identity key is `"{type}|{fieldPath}|{scopeToken}"` where the scope
//! token is `all`, `first`, `filter:{condition}` or `none` for a missing scope.
//! Rule ids and error metadata never contribute to identity.

use sha2::{Digest, Sha256};

use super::definition::RuleDefinition;
use super::scope::{InstanceScope, instance_scope_equals};

const NO_SCOPE_TOKEN: &str = "none";

/// Identity components of a rule, compared field by field.
///
/// Unlike the joined key this stays exact when a type or path contains `|`,
/// so collections index on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleIdentityParts {
    pub rule_type: String,
    pub field_path: String,
    pub instance_scope: Option<InstanceScope>,
}

impl RuleIdentityParts {
    pub fn key(&self) -> String {
        RuleIdentity::key_for(
            &self.rule_type,
            &self.field_path,
            self.instance_scope.as_ref(),
        )
    }
}

/// Stateless identity functions used to deduplicate and cache rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleIdentity;

impl RuleIdentity {
    /// Identity key from the three identity-relevant components.
    pub fn key_for(rule_type: &str, field_path: &str, scope: Option<&InstanceScope>) -> String {
        let scope_token = scope
            .map(InstanceScope::identity_token)
            .unwrap_or_else(|| NO_SCOPE_TOKEN.to_string());
        format!("{rule_type}|{field_path}|{scope_token}")
    }

    pub fn key(rule: &RuleDefinition) -> String {
        Self::key_for(
            &rule.rule_type,
            &rule.field_path,
            rule.instance_scope.as_ref(),
        )
    }

    pub fn parts(rule: &RuleDefinition) -> RuleIdentityParts {
        RuleIdentityParts {
            rule_type: rule.rule_type.clone(),
            field_path: rule.field_path.clone(),
            instance_scope: rule.instance_scope.clone(),
        }
    }

    /// Fixed-width hex SHA-256 of the identity key.
    pub fn digest(rule: &RuleDefinition) -> String {
        let hash = Sha256::digest(Self::key(rule).as_bytes());
        format!("{hash:x}")
    }

    /// Two rules are the same check when type, path and scope agree.
    pub fn are_equal(a: &RuleDefinition, b: &RuleDefinition) -> bool {
        a.rule_type == b.rule_type
            && a.field_path == b.field_path
            && instance_scope_equals(a.instance_scope.as_ref(), b.instance_scope.as_ref())
    }
}
