use serde::{Deserialize, Serialize};

use super::scope::InstanceScope;
use crate::error::{FhirRulesError, Result};

/// A single user-authored validation rule.
///
/// `rule_type` is an open tag ("Required", "ArrayLength", ...). New check kinds
/// need no changes to identity computation. `id`, `error_code` and `message`
/// only affect reporting and never take part in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub resource_type: String,
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_scope: Option<InstanceScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RuleDefinition {
    /// Create a rule with no scope and no reporting metadata.
    ///
    /// Fails on an empty `rule_type` or `field_path`: those are programming
    /// errors in the caller, not data conditions.
    pub fn new(
        id: impl Into<String>,
        rule_type: impl Into<String>,
        resource_type: impl Into<String>,
        field_path: impl Into<String>,
    ) -> Result<Self> {
        let rule = Self {
            id: id.into(),
            rule_type: rule_type.into(),
            resource_type: resource_type.into(),
            field_path: field_path.into(),
            instance_scope: None,
            error_code: None,
            message: None,
        };
        rule.ensure_valid()?;
        Ok(rule)
    }

    pub fn with_scope(mut self, scope: InstanceScope) -> Self {
        self.instance_scope = Some(scope);
        self
    }

    pub fn with_error(mut self, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self.message = Some(message.into());
        self
    }

    /// Parse a JSON array of rules, rejecting any with an empty type or path.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        let rules: Vec<Self> = serde_json::from_str(json)?;
        for rule in &rules {
            rule.ensure_valid()?;
        }
        Ok(rules)
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.rule_type.trim().is_empty() {
            return Err(FhirRulesError::invalid_rule(format!(
                "rule '{}' has an empty type",
                self.id
            )));
        }
        if self.field_path.trim().is_empty() {
            return Err(FhirRulesError::invalid_rule(format!(
                "rule '{}' has an empty field path",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_fields() {
        assert!(RuleDefinition::new("r1", "", "Patient", "name").is_err());
        assert!(RuleDefinition::new("r1", "Required", "Patient", " ").is_err());
        assert!(RuleDefinition::new("r1", "Required", "Patient", "name").is_ok());
    }

    #[test]
    fn test_list_from_json() {
        let rules = RuleDefinition::list_from_json(
            r#"[
                {
                    "id": "r1",
                    "type": "Required",
                    "resourceType": "Patient",
                    "fieldPath": "name.family",
                    "instanceScope": {"kind": "first"},
                    "errorCode": "PAT-001",
                    "message": "Family name is required"
                },
                {
                    "type": "ArrayLength",
                    "resourceType": "Patient",
                    "fieldPath": "identifier"
                }
            ]"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].instance_scope, Some(InstanceScope::FirstInstance));
        assert_eq!(rules[0].error_code.as_deref(), Some("PAT-001"));
        assert_eq!(rules[1].id, "");
        assert_eq!(rules[1].instance_scope, None);
    }

    #[test]
    fn test_list_from_json_rejects_blank_type() {
        let err = RuleDefinition::list_from_json(
            r#"[{"id": "bad", "type": "", "resourceType": "Patient", "fieldPath": "name"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, FhirRulesError::InvalidRule { .. }));
    }
}
